//! Generated BOM rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::entities::{GeneratedBom, GeneratedBomItem};

const COLUMNS: &str =
    "id, subsystem_id, template_id, template_code, template_version, generated";
const ITEM_COLUMNS: &str = "id, bom_id, sequence, name, part_number, category, requires_ip, \
                            quantity, scanned_quantity, missing_quantity";

fn from_row(row: &Row<'_>) -> rusqlite::Result<GeneratedBom> {
    Ok(GeneratedBom {
        id: row.get("id")?,
        subsystem_id: row.get("subsystem_id")?,
        template_id: row.get("template_id")?,
        template_code: row.get("template_code")?,
        template_version: row.get("template_version")?,
        generated: row.get("generated")?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<GeneratedBomItem> {
    Ok(GeneratedBomItem {
        id: row.get("id")?,
        bom_id: row.get("bom_id")?,
        sequence: row.get("sequence")?,
        name: row.get("name")?,
        part_number: row.get("part_number")?,
        category: row.get("category")?,
        requires_ip: row.get("requires_ip")?,
        quantity: row.get("quantity")?,
        scanned_quantity: row.get("scanned_quantity")?,
        missing_quantity: row.get("missing_quantity")?,
    })
}

pub fn insert(conn: &Connection, bom: &GeneratedBom) -> Result<()> {
    conn.execute(
        "INSERT INTO generated_boms
         (id, subsystem_id, template_id, template_code, template_version, generated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            bom.id,
            bom.subsystem_id,
            bom.template_id,
            bom.template_code,
            bom.template_version,
            bom.generated,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!("a BOM already exists for subsystem {}", bom.subsystem_id)
        })
    })?;

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO generated_bom_items ({ITEM_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    ))?;
    for item in &bom.items {
        stmt.execute(params![
            item.id,
            bom.id,
            item.sequence,
            item.name,
            item.part_number,
            item.category,
            item.requires_ip,
            item.quantity,
            item.scanned_quantity,
            item.missing_quantity,
        ])?;
    }
    Ok(())
}

fn with_items(conn: &Connection, bom: Option<GeneratedBom>) -> Result<Option<GeneratedBom>> {
    match bom {
        Some(mut bom) => {
            bom.items = items(conn, &bom.id)?;
            Ok(Some(bom))
        }
        None => Ok(None),
    }
}

pub fn get(conn: &Connection, id: &EntityId) -> Result<Option<GeneratedBom>> {
    let bom = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM generated_boms WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    with_items(conn, bom)
}

pub fn get_for_subsystem(conn: &Connection, subsystem_id: &EntityId) -> Result<Option<GeneratedBom>> {
    let bom = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM generated_boms WHERE subsystem_id = ?1"),
            [subsystem_id],
            from_row,
        )
        .optional()?;
    with_items(conn, bom)
}

pub fn items(conn: &Connection, bom_id: &EntityId) -> Result<Vec<GeneratedBomItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM generated_bom_items WHERE bom_id = ?1 ORDER BY sequence, name"
    ))?;
    let rows = stmt.query_map([bom_id], item_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Mirror completion progress onto the BOM line
pub fn update_progress(
    conn: &Connection,
    item_id: &EntityId,
    scanned: u32,
    missing: u32,
) -> Result<()> {
    conn.execute(
        "UPDATE generated_bom_items SET scanned_quantity = ?1, missing_quantity = ?2 WHERE id = ?3",
        params![scanned, missing, item_id],
    )?;
    Ok(())
}
