//! Entity type definitions
//!
//! **Ownership:**
//! - [`Contract`] - the commercial order
//! - [`Subsystem`] - one deployable unit of a system type
//!
//! **Provisioning stages:**
//! - [`BomTemplate`] / [`GeneratedBom`] - parts catalog and its subsystem-scoped expansion
//! - [`NetworkPool`] / [`NetworkAllocation`] / [`DeviceIpAssignment`] - address management
//! - [`CompletionOrder`] / [`CompletionItem`] / [`Pallet`] - warehouse pick reconciliation
//! - [`PrefabTask`] / [`PrefabDevice`] - device configuration before shipment

pub mod bom;
pub mod completion;
pub mod contract;
pub mod network;
pub mod prefab;
pub mod subsystem;

pub use bom::{BomTemplate, BomTemplateItem, DeviceCategory, GeneratedBom, GeneratedBomItem};
pub use completion::{
    CompletionDecision, CompletionItem, CompletionOrder, ItemStatus, OrderStatus, Pallet,
    ScanRecord,
};
pub use contract::Contract;
pub use network::{
    AssignmentStatus, DeviceIpAssignment, IpMatrixRow, NetworkAllocation, NetworkPool,
};
pub use prefab::{DeviceRow, DeviceStatus, PrefabDevice, PrefabTask, TaskStatus};
pub use subsystem::{Subsystem, SubsystemStatus};
