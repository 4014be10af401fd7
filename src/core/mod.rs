//! Core module - fundamental types and the provisioning engines

pub mod bom_engine;
pub mod category;
pub mod cidr;
pub mod completion;
pub mod config;
pub mod error;
pub mod identity;
pub mod label;
pub mod lifecycle;
pub mod network;
pub mod notify;
pub mod prefab;
pub mod project;
pub mod registry;
pub mod store;

pub use bom_engine::{BomEngine, TemplateImport};
pub use category::{CategoryRule, CategoryRuleSpec, CategoryRules, Classification};
pub use cidr::{CidrError, Ipv4Cidr};
pub use completion::{CompletionReconciler, Scan, ScanOutcome};
pub use config::Config;
pub use error::{ErrorKind, ProvisionError, Result};
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use label::{LabelData, LabelRenderer};
pub use network::{DeviceRequest, NetworkAllocator};
pub use notify::{LogNotifier, NoopNotifier, Notifier, NotifyError, ProvisioningEvent};
pub use prefab::PrefabConfigurator;
pub use project::{Project, ProjectError};
pub use registry::{NewSubsystem, Registry};
pub use store::Store;
