//! Network pools, allocations and per-device address assignments

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::cidr::Ipv4Cidr;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::bom::DeviceCategory;

/// A priority-ordered address space allocations are carved from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPool {
    pub id: EntityId,

    pub name: String,

    pub cidr: Ipv4Cidr,

    /// Lower value is tried first
    pub priority: i32,

    pub is_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created: DateTime<Utc>,
}

impl NetworkPool {
    pub fn new(name: impl Into<String>, cidr: Ipv4Cidr, priority: i32) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Pool),
            name: name.into(),
            cidr,
            priority,
            is_active: true,
            description: None,
            created: Utc::now(),
        }
    }
}

/// One CIDR range bound to one subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAllocation {
    pub id: EntityId,

    pub subsystem_id: EntityId,

    pub pool_id: EntityId,

    pub cidr: Ipv4Cidr,

    pub gateway: Ipv4Addr,

    pub subnet_mask: Ipv4Addr,

    /// Always the gateway address
    pub ntp_server: Ipv4Addr,

    pub total_hosts: u32,

    pub used_hosts: u32,

    /// Allocation whose range this one reuses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_from: Option<EntityId>,

    pub created: DateTime<Utc>,
}

impl NetworkAllocation {
    /// Fresh allocation over `cidr` with zeroed usage
    pub fn carve(subsystem_id: EntityId, pool_id: EntityId, cidr: Ipv4Cidr) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Net),
            subsystem_id,
            pool_id,
            cidr,
            gateway: cidr.gateway(),
            subnet_mask: cidr.netmask(),
            ntp_server: cidr.ntp(),
            total_hosts: cidr.usable_hosts(),
            used_hosts: 0,
            shared_from: None,
            created: Utc::now(),
        }
    }

    /// Same range as `other`, independent host accounting
    pub fn share(subsystem_id: EntityId, other: &NetworkAllocation) -> Self {
        let mut alloc = Self::carve(subsystem_id, other.pool_id, other.cidr);
        alloc.shared_from = Some(other.shared_from.unwrap_or(other.id));
        alloc
    }

    pub fn first_usable(&self) -> Ipv4Addr {
        self.cidr.first_usable()
    }

    pub fn last_usable(&self) -> Ipv4Addr {
        self.cidr.last_usable()
    }

    pub fn free_hosts(&self) -> u32 {
        self.total_hosts.saturating_sub(self.used_hosts)
    }
}

/// Device assignment status, PLANNED → ASSIGNED → CONFIGURED → VERIFIED → DEPLOYED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    #[default]
    Planned,
    Assigned,
    Configured,
    Verified,
    Deployed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Planned => "PLANNED",
            AssignmentStatus::Assigned => "ASSIGNED",
            AssignmentStatus::Configured => "CONFIGURED",
            AssignmentStatus::Verified => "VERIFIED",
            AssignmentStatus::Deployed => "DEPLOYED",
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLANNED" => Ok(AssignmentStatus::Planned),
            "ASSIGNED" => Ok(AssignmentStatus::Assigned),
            "CONFIGURED" => Ok(AssignmentStatus::Configured),
            "VERIFIED" => Ok(AssignmentStatus::Verified),
            "DEPLOYED" => Ok(AssignmentStatus::Deployed),
            _ => Err(format!("Unknown assignment status: {}", s)),
        }
    }
}

/// One address inside an allocation, bound to a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIpAssignment {
    pub id: EntityId,

    pub allocation_id: EntityId,

    pub ip_address: Ipv4Addr,

    pub category: DeviceCategory,

    pub device_type: String,

    pub hostname: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Globally unique once set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    pub status: AssignmentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,

    pub created: DateTime<Utc>,
}

impl DeviceIpAssignment {
    pub fn new(
        allocation_id: EntityId,
        ip_address: Ipv4Addr,
        category: DeviceCategory,
        device_type: impl Into<String>,
        hostname: impl Into<String>,
        status: AssignmentStatus,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Ip),
            allocation_id,
            ip_address,
            category,
            device_type: device_type.into(),
            hostname: hostname.into(),
            description: None,
            serial_number: None,
            status,
            configured_by: None,
            configured_at: None,
            verified_at: None,
            created: Utc::now(),
        }
    }
}

/// A row of the subsystem IP matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpMatrixRow {
    pub assignment_id: EntityId,
    pub hostname: String,
    pub category: DeviceCategory,
    pub device_type: String,
    pub ip_address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub ntp_server: Ipv4Addr,
    pub serial_number: Option<String>,
    pub status: AssignmentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carve_derives_roles_from_cidr() {
        let cidr: Ipv4Cidr = "10.40.2.0/24".parse().unwrap();
        let alloc = NetworkAllocation::carve(
            EntityId::new(EntityPrefix::Sub),
            EntityId::new(EntityPrefix::Pool),
            cidr,
        );
        assert_eq!(alloc.gateway, Ipv4Addr::new(10, 40, 2, 1));
        assert_eq!(alloc.ntp_server, alloc.gateway);
        assert_eq!(alloc.subnet_mask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(alloc.total_hosts, 252);
        assert_eq!(alloc.used_hosts, 0);
    }

    #[test]
    fn test_share_points_at_origin() {
        let cidr: Ipv4Cidr = "10.40.2.0/24".parse().unwrap();
        let first = NetworkAllocation::carve(
            EntityId::new(EntityPrefix::Sub),
            EntityId::new(EntityPrefix::Pool),
            cidr,
        );
        let second = NetworkAllocation::share(EntityId::new(EntityPrefix::Sub), &first);
        let third = NetworkAllocation::share(EntityId::new(EntityPrefix::Sub), &second);

        assert_eq!(second.cidr, first.cidr);
        assert_eq!(second.shared_from, Some(first.id));
        assert_eq!(third.shared_from, Some(first.id));
        assert_ne!(second.id, first.id);
    }
}
