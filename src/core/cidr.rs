//! IPv4 CIDR arithmetic
//!
//! Address roles inside every allocated range:
//!
//! | offset          | role                                    |
//! |-----------------|-----------------------------------------|
//! | `.0`            | network base, unused                    |
//! | `.1`            | gateway (also reported as NTP server)   |
//! | `.2`            | reserved for the NTP role               |
//! | `.3` .. `bc-1`  | usable device addresses                 |
//! | broadcast       | reserved                                |

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Offset of the first address handed to devices
const FIRST_USABLE_OFFSET: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    #[error("expected <address>/<prefix>, got '{0}'")]
    Format(String),

    #[error("invalid IPv4 address '{0}'")]
    Address(String),

    #[error("prefix length {0} out of range (0-30)")]
    Prefix(u8),

    #[error("{0} is not the base address of its /{1} network")]
    Unaligned(Ipv4Addr, u8),
}

/// An aligned IPv4 network, e.g. `10.20.3.0/24`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Build a CIDR, rejecting host bits in the base address
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self, CidrError> {
        if prefix > 30 {
            return Err(CidrError::Prefix(prefix));
        }
        let base = u32::from(network);
        if base & !mask_bits(prefix) != 0 {
            return Err(CidrError::Unaligned(network, prefix));
        }
        Ok(Self { network, prefix })
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask_bits(self.prefix))
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !mask_bits(self.prefix))
    }

    /// Total number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn gateway(&self) -> Ipv4Addr {
        self.offset(1)
    }

    /// The NTP server is always the gateway
    pub fn ntp(&self) -> Ipv4Addr {
        self.gateway()
    }

    pub fn first_usable(&self) -> Ipv4Addr {
        self.offset(FIRST_USABLE_OFFSET)
    }

    pub fn last_usable(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.broadcast()) - 1)
    }

    /// Number of device addresses between first and last usable, inclusive
    pub fn usable_hosts(&self) -> u32 {
        let first = u32::from(self.first_usable());
        let last = u32::from(self.last_usable());
        if last < first {
            0
        } else {
            last - first + 1
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask_bits(self.prefix) == u32::from(self.network)
    }

    /// Whether `addr` may be given to a device
    pub fn is_usable(&self, addr: Ipv4Addr) -> bool {
        let a = u32::from(addr);
        a >= u32::from(self.first_usable()) && a <= u32::from(self.last_usable())
    }

    /// The `index`-th sub-block of length `prefix`, or `None` when it falls outside
    pub fn subnet(&self, index: u32, prefix: u8) -> Option<Ipv4Cidr> {
        if prefix < self.prefix || prefix > 30 {
            return None;
        }
        let count = 1u64 << u32::from(prefix - self.prefix);
        if u64::from(index) >= count {
            return None;
        }
        let step = 1u64 << (32 - u32::from(prefix));
        let base = u64::from(u32::from(self.network)) + u64::from(index) * step;
        let base = u32::try_from(base).ok()?;
        Ipv4Cidr::new(Ipv4Addr::from(base), prefix).ok()
    }

    /// How many `/prefix` blocks fit in this network
    pub fn subnet_count(&self, prefix: u8) -> u64 {
        if prefix < self.prefix || prefix > 30 {
            0
        } else {
            1u64 << u32::from(prefix - self.prefix)
        }
    }

    /// Iterate usable device addresses in ascending order
    pub fn usable_addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        let first = u32::from(self.first_usable());
        let last = u32::from(self.last_usable());
        (first..=last).map(Ipv4Addr::from)
    }

    fn offset(&self, n: u32) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network).wrapping_add(n))
    }
}

fn mask_bits(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| CidrError::Format(s.to_string()))?;
        let network: Ipv4Addr = addr
            .parse()
            .map_err(|_| CidrError::Address(addr.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| CidrError::Format(s.to_string()))?;
        Ipv4Cidr::new(network, prefix)
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Cidr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Ipv4Cidr {
        s.parse().unwrap()
    }

    #[test]
    fn test_slash_24_roles() {
        let net = cidr("10.20.3.0/24");
        assert_eq!(net.network(), Ipv4Addr::new(10, 20, 3, 0));
        assert_eq!(net.netmask(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(net.gateway(), Ipv4Addr::new(10, 20, 3, 1));
        assert_eq!(net.ntp(), net.gateway());
        assert_eq!(net.first_usable(), Ipv4Addr::new(10, 20, 3, 3));
        assert_eq!(net.last_usable(), Ipv4Addr::new(10, 20, 3, 254));
        assert_eq!(net.broadcast(), Ipv4Addr::new(10, 20, 3, 255));
        assert_eq!(net.usable_hosts(), 252);
    }

    #[test]
    fn test_reserved_addresses_not_usable() {
        let net = cidr("192.168.1.0/24");
        for last in [0u8, 1, 2, 255] {
            assert!(!net.is_usable(Ipv4Addr::new(192, 168, 1, last)));
        }
        assert!(net.is_usable(Ipv4Addr::new(192, 168, 1, 3)));
        assert!(net.is_usable(Ipv4Addr::new(192, 168, 1, 254)));
    }

    #[test]
    fn test_subnet_carving() {
        let pool = cidr("10.0.0.0/16");
        assert_eq!(pool.subnet_count(24), 256);
        assert_eq!(pool.subnet(0, 24), Some(cidr("10.0.0.0/24")));
        assert_eq!(pool.subnet(5, 24), Some(cidr("10.0.5.0/24")));
        assert_eq!(pool.subnet(255, 24), Some(cidr("10.0.255.0/24")));
        assert_eq!(pool.subnet(256, 24), None);
    }

    #[test]
    fn test_subnet_of_exact_size() {
        let pool = cidr("172.16.9.0/24");
        assert_eq!(pool.subnet(0, 24), Some(pool));
        assert_eq!(pool.subnet(1, 24), None);
        assert_eq!(pool.subnet(0, 16), None);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!("10.0.0.0".parse::<Ipv4Cidr>(), Err(CidrError::Format(_))));
        assert!(matches!("10.0.0/24".parse::<Ipv4Cidr>(), Err(CidrError::Address(_))));
        assert!(matches!("10.0.0.0/31".parse::<Ipv4Cidr>(), Err(CidrError::Prefix(31))));
        assert!(matches!(
            "10.0.0.7/24".parse::<Ipv4Cidr>(),
            Err(CidrError::Unaligned(_, 24))
        ));
    }

    #[test]
    fn test_contains() {
        let net = cidr("10.1.2.0/24");
        assert!(net.contains(Ipv4Addr::new(10, 1, 2, 77)));
        assert!(!net.contains(Ipv4Addr::new(10, 1, 3, 1)));
    }

    #[test]
    fn test_usable_addresses_iterates_in_order() {
        let net = cidr("10.9.9.0/29");
        let addrs: Vec<_> = net.usable_addresses().map(|a| a.to_string()).collect();
        assert_eq!(addrs, vec!["10.9.9.3", "10.9.9.4", "10.9.9.5", "10.9.9.6"]);
        assert_eq!(net.usable_hosts(), 4);
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(cidr("10.20.0.0/16").to_string(), "10.20.0.0/16");
    }
}
