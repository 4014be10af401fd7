//! Subsystem entity - one deployable unit of a system type within a contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Lifecycle status; mirrors the furthest-completed provisioning stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubsystemStatus {
    #[default]
    Created,
    BomGenerated,
    IpAllocated,
    InCompletion,
    InPrefabrication,
    ReadyForDeployment,
    Deployed,
    Cancelled,
}

impl SubsystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubsystemStatus::Created => "CREATED",
            SubsystemStatus::BomGenerated => "BOM_GENERATED",
            SubsystemStatus::IpAllocated => "IP_ALLOCATED",
            SubsystemStatus::InCompletion => "IN_COMPLETION",
            SubsystemStatus::InPrefabrication => "IN_PREFABRICATION",
            SubsystemStatus::ReadyForDeployment => "READY_FOR_DEPLOYMENT",
            SubsystemStatus::Deployed => "DEPLOYED",
            SubsystemStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for SubsystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubsystemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CREATED" => Ok(SubsystemStatus::Created),
            "BOM_GENERATED" => Ok(SubsystemStatus::BomGenerated),
            "IP_ALLOCATED" => Ok(SubsystemStatus::IpAllocated),
            "IN_COMPLETION" => Ok(SubsystemStatus::InCompletion),
            "IN_PREFABRICATION" => Ok(SubsystemStatus::InPrefabrication),
            "READY_FOR_DEPLOYMENT" => Ok(SubsystemStatus::ReadyForDeployment),
            "DEPLOYED" => Ok(SubsystemStatus::Deployed),
            "CANCELLED" => Ok(SubsystemStatus::Cancelled),
            _ => Err(format!("Unknown subsystem status: {}", s)),
        }
    }
}

/// One deployable instance of a system type under a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsystem {
    pub id: EntityId,

    pub contract_id: EntityId,

    /// Globally unique subsystem number (e.g. "C-2024-017-VID-01")
    pub subsystem_number: String,

    pub name: String,

    /// System type key used to select BOM templates (e.g. "video", "access")
    pub system_type: String,

    /// Number of identical units; scales every generated BOM quantity
    pub quantity: u32,

    pub status: SubsystemStatus,

    pub created: DateTime<Utc>,

    pub updated: DateTime<Utc>,
}

impl Subsystem {
    pub fn new(
        contract_id: EntityId,
        subsystem_number: impl Into<String>,
        name: impl Into<String>,
        system_type: impl Into<String>,
        quantity: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Sub),
            contract_id,
            subsystem_number: subsystem_number.into(),
            name: name.into(),
            system_type: system_type.into(),
            quantity,
            status: SubsystemStatus::Created,
            created: now,
            updated: now,
        }
    }
}
