//! Device label rendering

use rust_embed::Embed;
use serde::Serialize;
use tera::{Context, Tera};

use crate::core::error::{ProvisionError, Result};

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const LABEL_TEMPLATE: &str = "label.tera";

/// Everything printed on a device label
#[derive(Debug, Clone, Serialize)]
pub struct LabelData {
    pub contract_number: String,
    pub subsystem_number: String,
    pub task_number: String,
    pub hostname: String,
    pub device_type: String,
    pub serial_number: String,
    pub ip_address: String,
    pub subnet_mask: String,
    pub gateway: String,
    pub ntp_server: String,
}

pub struct LabelRenderer {
    tera: Tera,
}

impl LabelRenderer {
    /// Renderer using the embedded label template
    pub fn embedded() -> Result<Self> {
        let file = EmbeddedTemplates::get(LABEL_TEMPLATE)
            .ok_or_else(|| ProvisionError::not_found("Template", LABEL_TEMPLATE))?;
        let text = std::str::from_utf8(&file.data)
            .map_err(|e| ProvisionError::Config(format!("{}: {}", LABEL_TEMPLATE, e)))?;
        Self::from_source(text)
    }

    /// Renderer for a caller-supplied template
    pub fn from_source(source: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(LABEL_TEMPLATE, source)?;
        Ok(Self { tera })
    }

    pub fn render(&self, data: &LabelData) -> Result<String> {
        let context = Context::from_serialize(data)?;
        Ok(self.tera.render(LABEL_TEMPLATE, &context)?)
    }
}
