//! Completion (warehouse pick) orders, items, scans and pallets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::bom::DeviceCategory;

/// Completion order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Created,
    InProgress,
    WaitingDecision,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::WaitingDecision => "WAITING_DECISION",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    /// Whether scans are still accepted
    pub fn is_open(&self) -> bool {
        !matches!(self, OrderStatus::Completed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CREATED" => Ok(OrderStatus::Created),
            "IN_PROGRESS" => Ok(OrderStatus::InProgress),
            "WAITING_DECISION" => Ok(OrderStatus::WaitingDecision),
            "COMPLETED" => Ok(OrderStatus::Completed),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

/// Per-item fulfilment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Pending,
    Partial,
    Scanned,
    Missing,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Partial => "PARTIAL",
            ItemStatus::Scanned => "SCANNED",
            ItemStatus::Missing => "MISSING",
        }
    }

    /// Can still receive scans
    pub fn is_eligible(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Partial)
    }

    /// SCANNED or MISSING
    pub fn is_resolved(&self) -> bool {
        matches!(self, ItemStatus::Scanned | ItemStatus::Missing)
    }

    /// Status implied by progress, for items that are not flagged missing
    pub fn from_progress(scanned: u32, expected: u32) -> Self {
        if scanned >= expected {
            ItemStatus::Scanned
        } else if scanned == 0 {
            ItemStatus::Pending
        } else {
            ItemStatus::Partial
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ItemStatus::Pending),
            "PARTIAL" => Ok(ItemStatus::Partial),
            "SCANNED" => Ok(ItemStatus::Scanned),
            "MISSING" => Ok(ItemStatus::Missing),
            _ => Err(format!("Unknown item status: {}", s)),
        }
    }
}

/// Human decision on an incompletely fulfilled order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionDecision {
    /// Ship what is there, close the order now
    ContinuePartial,
    /// Park the order until more stock arrives
    WaitForComplete,
}

impl CompletionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionDecision::ContinuePartial => "CONTINUE_PARTIAL",
            CompletionDecision::WaitForComplete => "WAIT_FOR_COMPLETE",
        }
    }
}

impl std::fmt::Display for CompletionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompletionDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CONTINUE_PARTIAL" => Ok(CompletionDecision::ContinuePartial),
            "WAIT_FOR_COMPLETE" => Ok(CompletionDecision::WaitForComplete),
            _ => Err(format!(
                "Unknown decision: {}. Use CONTINUE_PARTIAL or WAIT_FOR_COMPLETE",
                s
            )),
        }
    }
}

/// One pick order per subsystem, seeded from the generated BOM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOrder {
    pub id: EntityId,

    pub order_number: String,

    pub subsystem_id: EntityId,

    pub bom_id: EntityId,

    pub status: OrderStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<CompletionDecision>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_note: Option<String>,

    /// Closed with missing items
    pub partial: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CompletionItem>,
}

impl CompletionOrder {
    pub fn new(order_number: impl Into<String>, subsystem_id: EntityId, bom_id: EntityId) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Co),
            order_number: order_number.into(),
            subsystem_id,
            bom_id,
            status: OrderStatus::Created,
            decision: None,
            decision_note: None,
            partial: false,
            created_by: None,
            created: Utc::now(),
            started_at: None,
            completed_at: None,
            items: Vec::new(),
        }
    }

    pub fn all_scanned(&self) -> bool {
        self.items.iter().all(|i| i.status == ItemStatus::Scanned)
    }

    pub fn all_resolved(&self) -> bool {
        self.items.iter().all(|i| i.status.is_resolved())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &CompletionItem> {
        self.items.iter().filter(|i| !i.status.is_resolved())
    }
}

/// Expected vs. scanned quantity for one generated BOM line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub id: EntityId,

    pub order_id: EntityId,

    pub bom_item_id: EntityId,

    pub sequence: u32,

    pub name: String,

    pub part_number: String,

    pub category: DeviceCategory,

    pub expected_quantity: u32,

    pub scanned_quantity: u32,

    pub missing_quantity: u32,

    pub status: ItemStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_note: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pallet_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serial_numbers: Vec<String>,
}

/// A persisted barcode scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: EntityId,

    pub item_id: EntityId,

    pub barcode: String,

    /// Quantity reported by the scanner
    pub quantity: u32,

    /// Quantity actually counted after clamping to the expected quantity
    pub accepted: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_by: Option<String>,

    pub scanned_at: DateTime<Utc>,
}

/// Physical grouping of items of one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pallet {
    pub id: EntityId,

    pub order_id: EntityId,

    pub pallet_number: String,

    pub created: DateTime<Utc>,

    /// Number of items currently on the pallet (read-side only)
    #[serde(default)]
    pub item_count: u32,
}
