//! BOM templates and generated (subsystem-scoped) BOMs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Device category assigned by the name-pattern detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Camera,
    Recorder,
    Switch,
    Router,
    Firewall,
    AccessController,
    CardReader,
    Intercom,
    Server,
    Workstation,
    Ups,
    Sensor,
    Storage,
    Cable,
    Accessory,
    #[default]
    Other,
}

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCategory::Camera => "camera",
            DeviceCategory::Recorder => "recorder",
            DeviceCategory::Switch => "switch",
            DeviceCategory::Router => "router",
            DeviceCategory::Firewall => "firewall",
            DeviceCategory::AccessController => "access_controller",
            DeviceCategory::CardReader => "card_reader",
            DeviceCategory::Intercom => "intercom",
            DeviceCategory::Server => "server",
            DeviceCategory::Workstation => "workstation",
            DeviceCategory::Ups => "ups",
            DeviceCategory::Sensor => "sensor",
            DeviceCategory::Storage => "storage",
            DeviceCategory::Cable => "cable",
            DeviceCategory::Accessory => "accessory",
            DeviceCategory::Other => "other",
        }
    }

    /// Short tag used when deriving hostnames
    pub fn hostname_tag(&self) -> &'static str {
        match self {
            DeviceCategory::Camera => "cam",
            DeviceCategory::Recorder => "nvr",
            DeviceCategory::Switch => "sw",
            DeviceCategory::Router => "rtr",
            DeviceCategory::Firewall => "fw",
            DeviceCategory::AccessController => "acc",
            DeviceCategory::CardReader => "rdr",
            DeviceCategory::Intercom => "icm",
            DeviceCategory::Server => "srv",
            DeviceCategory::Workstation => "ws",
            DeviceCategory::Ups => "ups",
            DeviceCategory::Sensor => "sen",
            DeviceCategory::Storage => "sto",
            DeviceCategory::Cable => "cbl",
            DeviceCategory::Accessory => "acs",
            DeviceCategory::Other => "dev",
        }
    }
}

impl std::fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "camera" => Ok(DeviceCategory::Camera),
            "recorder" => Ok(DeviceCategory::Recorder),
            "switch" => Ok(DeviceCategory::Switch),
            "router" => Ok(DeviceCategory::Router),
            "firewall" => Ok(DeviceCategory::Firewall),
            "access_controller" => Ok(DeviceCategory::AccessController),
            "card_reader" => Ok(DeviceCategory::CardReader),
            "intercom" => Ok(DeviceCategory::Intercom),
            "server" => Ok(DeviceCategory::Server),
            "workstation" => Ok(DeviceCategory::Workstation),
            "ups" => Ok(DeviceCategory::Ups),
            "sensor" => Ok(DeviceCategory::Sensor),
            "storage" => Ok(DeviceCategory::Storage),
            "cable" => Ok(DeviceCategory::Cable),
            "accessory" => Ok(DeviceCategory::Accessory),
            "other" => Ok(DeviceCategory::Other),
            _ => Err(format!("Unknown device category: {}", s)),
        }
    }
}

/// A versioned, system-type-keyed parts catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomTemplate {
    pub id: EntityId,

    /// Unique template code (e.g. "VIDEO-STD")
    pub code: String,

    pub name: String,

    pub system_type: String,

    pub version: u32,

    pub is_active: bool,

    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<BomTemplateItem>,
}

impl BomTemplate {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        system_type: impl Into<String>,
        version: u32,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Tpl),
            code: code.into(),
            name: name.into(),
            system_type: system_type.into(),
            version,
            is_active: true,
            created: Utc::now(),
            items: Vec::new(),
        }
    }
}

/// One line of a BOM template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomTemplateItem {
    pub id: EntityId,

    pub sequence: u32,

    pub name: String,

    /// Barcode/part number the warehouse scans
    pub part_number: String,

    /// Quantity per subsystem unit (may be fractional)
    pub quantity: f64,

    pub multiplier: f64,

    pub category: DeviceCategory,

    pub requires_ip: bool,
}

impl BomTemplateItem {
    /// `ceil(quantity × multiplier × units)`
    pub fn expanded_quantity(&self, units: u32) -> u32 {
        expand_quantity(self.quantity, self.multiplier, units)
    }
}

/// Resolve a template quantity for a subsystem of `units` units
pub fn expand_quantity(quantity: f64, multiplier: f64, units: u32) -> u32 {
    let raw = quantity * multiplier * f64::from(units);
    // Guard against float noise such as 0.1 * 3 * 10 = 3.0000000000000004
    let rounded = (raw * 1e9).round() / 1e9;
    if rounded <= 0.0 {
        0
    } else {
        rounded.ceil() as u32
    }
}

/// The materialized parts list for one subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedBom {
    pub id: EntityId,

    pub subsystem_id: EntityId,

    pub template_id: EntityId,

    pub template_code: String,

    pub template_version: u32,

    pub generated: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<GeneratedBomItem>,
}

/// One quantity-resolved line of a generated BOM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedBomItem {
    pub id: EntityId,

    pub bom_id: EntityId,

    pub sequence: u32,

    pub name: String,

    pub part_number: String,

    pub category: DeviceCategory,

    pub requires_ip: bool,

    pub quantity: u32,

    pub scanned_quantity: u32,

    pub missing_quantity: u32,
}
