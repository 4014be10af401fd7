//! Prefabrication tasks and devices

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::bom::DeviceCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Created,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "CREATED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CREATED" => Ok(TaskStatus::Created),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Device configuration status, PENDING → CONFIGURED → VERIFIED (or FAILED)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    #[default]
    Pending,
    Configured,
    Verified,
    Failed,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Pending => "PENDING",
            DeviceStatus::Configured => "CONFIGURED",
            DeviceStatus::Verified => "VERIFIED",
            DeviceStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(DeviceStatus::Pending),
            "CONFIGURED" => Ok(DeviceStatus::Configured),
            "VERIFIED" => Ok(DeviceStatus::Verified),
            "FAILED" => Ok(DeviceStatus::Failed),
            _ => Err(format!("Unknown device status: {}", s)),
        }
    }
}

/// Created once the completion order closes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabTask {
    pub id: EntityId,

    pub task_number: String,

    pub subsystem_id: EntityId,

    pub order_id: EntityId,

    pub status: TaskStatus,

    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PrefabTask {
    pub fn new(task_number: impl Into<String>, subsystem_id: EntityId, order_id: EntityId) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Pft),
            task_number: task_number.into(),
            subsystem_id,
            order_id,
            status: TaskStatus::Created,
            created: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Wraps one device IP assignment within a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabDevice {
    pub id: EntityId,

    pub task_id: EntityId,

    pub assignment_id: EntityId,

    pub status: DeviceStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    pub updated: DateTime<Utc>,
}

impl PrefabDevice {
    pub fn new(task_id: EntityId, assignment_id: EntityId) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Pfd),
            task_id,
            assignment_id,
            status: DeviceStatus::Pending,
            note: None,
            updated: Utc::now(),
        }
    }
}

/// Joined view of an assignment and its prefabrication state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRow {
    pub assignment_id: EntityId,
    pub device_id: Option<EntityId>,
    pub hostname: String,
    pub device_type: String,
    pub category: DeviceCategory,
    pub serial_number: Option<String>,
    pub ip_address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    /// Always equal to `gateway`
    pub ntp_server: Ipv4Addr,
    pub description: Option<String>,
    pub status: DeviceStatus,
}
