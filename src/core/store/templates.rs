//! BOM template rows and their items

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::entities::{BomTemplate, BomTemplateItem};

const COLUMNS: &str = "id, code, name, system_type, version, is_active, created";

fn from_row(row: &Row<'_>) -> rusqlite::Result<BomTemplate> {
    Ok(BomTemplate {
        id: row.get("id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        system_type: row.get("system_type")?,
        version: row.get("version")?,
        is_active: row.get("is_active")?,
        created: row.get("created")?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<BomTemplateItem> {
    Ok(BomTemplateItem {
        id: row.get("id")?,
        sequence: row.get("sequence")?,
        name: row.get("name")?,
        part_number: row.get("part_number")?,
        quantity: row.get("quantity")?,
        multiplier: row.get("multiplier")?,
        category: row.get("category")?,
        requires_ip: row.get("requires_ip")?,
    })
}

/// Insert a template together with all of its items
pub fn insert(conn: &Connection, template: &BomTemplate) -> Result<()> {
    conn.execute(
        "INSERT INTO bom_templates (id, code, name, system_type, version, is_active, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            template.id,
            template.code,
            template.name,
            template.system_type,
            template.version,
            template.is_active,
            template.created,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || format!("template code {} already exists", template.code))
    })?;

    let mut stmt = conn.prepare(
        "INSERT INTO bom_template_items
         (id, template_id, sequence, name, part_number, quantity, multiplier, category, requires_ip)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for item in &template.items {
        stmt.execute(params![
            item.id,
            template.id,
            item.sequence,
            item.name,
            item.part_number,
            item.quantity,
            item.multiplier,
            item.category,
            item.requires_ip,
        ])?;
    }
    Ok(())
}

fn load_items(conn: &Connection, template: &mut BomTemplate) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT id, sequence, name, part_number, quantity, multiplier, category, requires_ip
         FROM bom_template_items WHERE template_id = ?1 ORDER BY sequence, name",
    )?;
    let rows = stmt.query_map([template.id], item_from_row)?;
    template.items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(())
}

pub fn get(conn: &Connection, id: &EntityId) -> Result<Option<BomTemplate>> {
    let template = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM bom_templates WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    with_items(conn, template)
}

pub fn get_by_code(conn: &Connection, code: &str) -> Result<Option<BomTemplate>> {
    let template = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM bom_templates WHERE code = ?1"),
            [code],
            from_row,
        )
        .optional()?;
    with_items(conn, template)
}

/// Highest-version active template for a system type
pub fn latest_active(conn: &Connection, system_type: &str) -> Result<Option<BomTemplate>> {
    let template = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM bom_templates
                 WHERE system_type = ?1 AND is_active = 1
                 ORDER BY version DESC, created DESC LIMIT 1"
            ),
            [system_type],
            from_row,
        )
        .optional()?;
    with_items(conn, template)
}

fn with_items(conn: &Connection, template: Option<BomTemplate>) -> Result<Option<BomTemplate>> {
    match template {
        Some(mut t) => {
            load_items(conn, &mut t)?;
            Ok(Some(t))
        }
        None => Ok(None),
    }
}

/// Templates without items, optionally restricted to one system type
pub fn list(conn: &Connection, system_type: Option<&str>) -> Result<Vec<BomTemplate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM bom_templates
         WHERE (?1 IS NULL OR system_type = ?1)
         ORDER BY system_type, version DESC, code"
    ))?;
    let rows = stmt.query_map([system_type], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn set_active(conn: &Connection, id: &EntityId, active: bool) -> Result<()> {
    conn.execute(
        "UPDATE bom_templates SET is_active = ?1 WHERE id = ?2",
        params![active, id],
    )?;
    Ok(())
}

pub fn item_count(conn: &Connection, id: &EntityId) -> Result<u32> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM bom_template_items WHERE template_id = ?1",
        [id],
        |row| row.get(0),
    )?)
}

pub fn resolve(conn: &Connection, key: &str) -> Result<Option<BomTemplate>> {
    match key.parse::<EntityId>() {
        Ok(id) => get(conn, &id),
        Err(_) => get_by_code(conn, key),
    }
}
