//! BOM template engine
//!
//! Imports semicolon-delimited parts lists into versioned templates and
//! expands a template into the generated BOM of one subsystem.

use std::io::Read;

use chrono::Utc;
use tracing::{debug, info};

use crate::core::category::CategoryRules;
use crate::core::error::{ProvisionError, Result};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::lifecycle;
use crate::core::store::{self, Store};
use crate::entities::{
    BomTemplate, BomTemplateItem, GeneratedBom, GeneratedBomItem, SubsystemStatus,
};

/// Header data for a template import
#[derive(Debug, Clone)]
pub struct TemplateImport {
    pub code: String,
    pub name: String,
    pub system_type: String,
    pub version: u32,
}

impl TemplateImport {
    pub fn new(code: impl Into<String>, name: impl Into<String>, system_type: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            system_type: system_type.into(),
            version: 1,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

pub struct BomEngine<'a> {
    store: &'a Store,
    rules: &'a CategoryRules,
}

impl<'a> BomEngine<'a> {
    pub fn new(store: &'a Store, rules: &'a CategoryRules) -> Self {
        Self { store, rules }
    }

    /// Parse `sequence;name;quantity[;part_number]` rows, skipping the header
    pub fn parse_items<R: Read>(&self, reader: R) -> Result<Vec<BomTemplateItem>> {
        let mut csv = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut items = Vec::new();
        for record in csv.byte_records() {
            let record = record.map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                row_error(line, &format!("unreadable row ({})", e))
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let fields = record
                .iter()
                .map(std::str::from_utf8)
                .collect::<std::result::Result<Vec<&str>, _>>()
                .map_err(|_| row_error(line, "row is not valid UTF-8"))?;
            if fields.iter().all(|field| field.is_empty()) {
                continue;
            }
            if fields.len() < 3 {
                return Err(row_error(line, "expected sequence;name;quantity"));
            }

            let sequence: u32 = fields[0]
                .parse()
                .map_err(|_| row_error(line, &format!("invalid sequence '{}'", fields[0])))?;
            let name = fields[1].to_string();
            if name.is_empty() {
                return Err(row_error(line, "item name is empty"));
            }
            // Accept decimal commas, common in semicolon-delimited exports
            let quantity: f64 = fields[2]
                .replace(',', ".")
                .parse()
                .map_err(|_| row_error(line, &format!("invalid quantity '{}'", fields[2])))?;
            if !quantity.is_finite() || quantity < 0.0 {
                return Err(row_error(line, "quantity must be zero or positive"));
            }
            let part_number = fields
                .get(3)
                .copied()
                .filter(|p| !p.is_empty())
                .unwrap_or(name.as_str())
                .to_string();

            let class = self.rules.classify(&name);
            items.push(BomTemplateItem {
                id: EntityId::new(EntityPrefix::Tpi),
                sequence,
                name,
                part_number,
                quantity,
                multiplier: 1.0,
                category: class.category,
                requires_ip: class.requires_ip,
            });
        }

        if items.is_empty() {
            return Err(ProvisionError::Validation("the file contains no items".into()));
        }
        Ok(items)
    }

    /// Import a new template; nothing is written if any row is bad or the code exists
    pub fn import_csv<R: Read>(&self, header: &TemplateImport, reader: R) -> Result<BomTemplate> {
        let code = header.code.trim();
        if code.is_empty() {
            return Err(ProvisionError::Validation("template code is empty".into()));
        }
        if header.version < 1 {
            return Err(ProvisionError::Validation("template version must be at least 1".into()));
        }
        let items = self.parse_items(reader)?;

        let mut template = BomTemplate::new(
            code,
            header.name.trim(),
            header.system_type.trim().to_lowercase(),
            header.version,
        );
        template.items = items;

        let tx = self.store.transaction()?;
        if store::templates::get_by_code(&tx, code)?.is_some() {
            return Err(ProvisionError::Conflict(format!(
                "template code {} already exists",
                code
            )));
        }
        store::templates::insert(&tx, &template)?;
        tx.commit()?;

        info!(
            template = %template.code,
            version = template.version,
            items = template.items.len(),
            "BOM template imported"
        );
        Ok(template)
    }

    pub fn list_templates(&self, system_type: Option<&str>) -> Result<Vec<BomTemplate>> {
        let system_type = system_type.map(|s| s.trim().to_lowercase());
        store::templates::list(self.store.conn(), system_type.as_deref())
    }

    /// Template with items, by ID or code
    pub fn get_template(&self, key: &str) -> Result<BomTemplate> {
        store::templates::resolve(self.store.conn(), key)?
            .ok_or_else(|| ProvisionError::not_found("BomTemplate", key))
    }

    pub fn set_template_active(&self, key: &str, active: bool) -> Result<BomTemplate> {
        let tx = self.store.transaction()?;
        let mut template = store::templates::resolve(&tx, key)?
            .ok_or_else(|| ProvisionError::not_found("BomTemplate", key))?;
        store::templates::set_active(&tx, &template.id, active)?;
        tx.commit()?;
        template.is_active = active;
        Ok(template)
    }

    /// Expand a template into the subsystem's generated BOM
    ///
    /// Without `template_code` the highest-version active template of the
    /// subsystem's system type is used.
    pub fn generate(&self, subsystem: &str, template_code: Option<&str>) -> Result<GeneratedBom> {
        let tx = self.store.transaction()?;
        let sub = store::subsystems::resolve(&tx, subsystem)?
            .ok_or_else(|| ProvisionError::not_found("Subsystem", subsystem))?;

        if store::boms::get_for_subsystem(&tx, &sub.id)?.is_some() {
            return Err(ProvisionError::Conflict(format!(
                "subsystem {} already has a generated BOM",
                sub.subsystem_number
            )));
        }
        lifecycle::require_status(&sub, SubsystemStatus::Created, "generate a BOM for")?;

        let template = match template_code {
            Some(code) => store::templates::resolve(&tx, code)?
                .ok_or_else(|| ProvisionError::not_found("BomTemplate", code))?,
            None => store::templates::latest_active(&tx, &sub.system_type)?.ok_or_else(|| {
                ProvisionError::not_found(
                    "BomTemplate",
                    format!("active template for system type '{}'", sub.system_type),
                )
            })?,
        };

        let bom_id = EntityId::new(EntityPrefix::Bom);
        let items = template
            .items
            .iter()
            .map(|item| GeneratedBomItem {
                id: EntityId::new(EntityPrefix::Bmi),
                bom_id,
                sequence: item.sequence,
                name: item.name.clone(),
                part_number: item.part_number.clone(),
                category: item.category,
                requires_ip: item.requires_ip,
                quantity: item.expanded_quantity(sub.quantity),
                scanned_quantity: 0,
                missing_quantity: 0,
            })
            .collect();

        let bom = GeneratedBom {
            id: bom_id,
            subsystem_id: sub.id,
            template_id: template.id,
            template_code: template.code.clone(),
            template_version: template.version,
            generated: Utc::now(),
            items,
        };
        store::boms::insert(&tx, &bom)?;
        lifecycle::advance(
            &tx,
            &sub.id,
            SubsystemStatus::Created,
            SubsystemStatus::BomGenerated,
        )?;
        tx.commit()?;

        debug!(
            subsystem = %sub.subsystem_number,
            template = %bom.template_code,
            items = bom.items.len(),
            "BOM generated"
        );
        Ok(bom)
    }

    pub fn get_generated_bom(&self, subsystem: &str) -> Result<GeneratedBom> {
        let conn = self.store.conn();
        let sub = store::subsystems::resolve(conn, subsystem)?
            .ok_or_else(|| ProvisionError::not_found("Subsystem", subsystem))?;
        store::boms::get_for_subsystem(conn, &sub.id)?
            .ok_or_else(|| ProvisionError::not_found("GeneratedBom", &sub.subsystem_number))
    }

    /// Items of a generated BOM that need a network address
    pub fn network_devices(&self, bom_id: &EntityId) -> Result<Vec<GeneratedBomItem>> {
        let bom = store::boms::get(self.store.conn(), bom_id)?
            .ok_or_else(|| ProvisionError::not_found("GeneratedBom", bom_id))?;
        Ok(bom.items.into_iter().filter(|i| i.requires_ip).collect())
    }
}

fn row_error(line: u64, msg: &str) -> ProvisionError {
    ProvisionError::Validation(format!("line {}: {}", line, msg))
}
