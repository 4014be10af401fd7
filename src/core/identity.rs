//! Entity identity - prefixed ULIDs (e.g. `SUB-01HQ3K...`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use ulid::Ulid;

/// Entity type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityPrefix {
    /// Contract
    Ctr,
    /// Subsystem
    Sub,
    /// BOM template
    Tpl,
    /// BOM template item
    Tpi,
    /// Generated BOM
    Bom,
    /// Generated BOM item
    Bmi,
    /// Network pool
    Pool,
    /// Network allocation
    Net,
    /// Device IP assignment
    Ip,
    /// Completion order
    Co,
    /// Completion item
    Ci,
    /// Completion scan record
    Scan,
    /// Pallet
    Pal,
    /// Prefabrication task
    Pft,
    /// Prefabrication device
    Pfd,
}

impl EntityPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Ctr => "CTR",
            EntityPrefix::Sub => "SUB",
            EntityPrefix::Tpl => "TPL",
            EntityPrefix::Tpi => "TPI",
            EntityPrefix::Bom => "BOM",
            EntityPrefix::Bmi => "BMI",
            EntityPrefix::Pool => "POOL",
            EntityPrefix::Net => "NET",
            EntityPrefix::Ip => "IP",
            EntityPrefix::Co => "CO",
            EntityPrefix::Ci => "CI",
            EntityPrefix::Scan => "SCAN",
            EntityPrefix::Pal => "PAL",
            EntityPrefix::Pft => "PFT",
            EntityPrefix::Pfd => "PFD",
        }
    }

    pub fn all() -> &'static [EntityPrefix] {
        &[
            EntityPrefix::Ctr,
            EntityPrefix::Sub,
            EntityPrefix::Tpl,
            EntityPrefix::Tpi,
            EntityPrefix::Bom,
            EntityPrefix::Bmi,
            EntityPrefix::Pool,
            EntityPrefix::Net,
            EntityPrefix::Ip,
            EntityPrefix::Co,
            EntityPrefix::Ci,
            EntityPrefix::Scan,
            EntityPrefix::Pal,
            EntityPrefix::Pft,
            EntityPrefix::Pfd,
        ]
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        EntityPrefix::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == upper)
            .ok_or(IdParseError::UnknownPrefix(s.to_string()))
    }
}

/// Errors from parsing an entity ID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("missing '-' separator in entity ID: {0}")]
    MissingSeparator(String),

    #[error("unknown entity prefix: {0}")]
    UnknownPrefix(String),

    #[error("invalid ULID in entity ID: {0}")]
    InvalidUlid(String),
}

/// A unique entity identifier: `<PREFIX>-<ULID>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Generate a fresh ID for the given entity type
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse an ID and require a specific prefix
    pub fn parse_with_prefix(s: &str, expected: EntityPrefix) -> Result<Self, IdParseError> {
        let id: EntityId = s.parse()?;
        if id.prefix != expected {
            return Err(IdParseError::UnknownPrefix(format!(
                "{} (expected {})",
                id.prefix, expected
            )));
        }
        Ok(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, ulid) = s
            .trim()
            .rsplit_once('-')
            .ok_or_else(|| IdParseError::MissingSeparator(s.to_string()))?;
        let prefix: EntityPrefix = prefix.parse()?;
        let ulid = Ulid::from_string(ulid).map_err(|_| IdParseError::InvalidUlid(s.to_string()))?;
        Ok(Self { prefix, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
