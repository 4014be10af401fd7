//! Completion orders, items and scans

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::entities::{CompletionItem, CompletionOrder, OrderStatus, ScanRecord};

const COLUMNS: &str = "id, order_number, subsystem_id, bom_id, status, decision, decision_note, \
                       partial, created_by, created, started_at, completed_at";
const ITEM_COLUMNS: &str = "id, order_id, bom_item_id, sequence, name, part_number, category, \
                            expected_quantity, scanned_quantity, missing_quantity, status, \
                            missing_note, pallet_id";

fn from_row(row: &Row<'_>) -> rusqlite::Result<CompletionOrder> {
    Ok(CompletionOrder {
        id: row.get("id")?,
        order_number: row.get("order_number")?,
        subsystem_id: row.get("subsystem_id")?,
        bom_id: row.get("bom_id")?,
        status: row.get("status")?,
        decision: row.get("decision")?,
        decision_note: row.get("decision_note")?,
        partial: row.get("partial")?,
        created_by: row.get("created_by")?,
        created: row.get("created")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CompletionItem> {
    Ok(CompletionItem {
        id: row.get("id")?,
        order_id: row.get("order_id")?,
        bom_item_id: row.get("bom_item_id")?,
        sequence: row.get("sequence")?,
        name: row.get("name")?,
        part_number: row.get("part_number")?,
        category: row.get("category")?,
        expected_quantity: row.get("expected_quantity")?,
        scanned_quantity: row.get("scanned_quantity")?,
        missing_quantity: row.get("missing_quantity")?,
        status: row.get("status")?,
        missing_note: row.get("missing_note")?,
        pallet_id: row.get("pallet_id")?,
        serial_numbers: Vec::new(),
    })
}

pub fn insert(conn: &Connection, order: &CompletionOrder) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO completion_orders ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            order.id,
            order.order_number,
            order.subsystem_id,
            order.bom_id,
            order.status,
            order.decision,
            order.decision_note,
            order.partial,
            order.created_by,
            order.created,
            order.started_at,
            order.completed_at,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!("a completion order already exists: {}", order.order_number)
        })
    })?;

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO completion_items ({ITEM_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
    ))?;
    for item in &order.items {
        stmt.execute(params![
            item.id,
            order.id,
            item.bom_item_id,
            item.sequence,
            item.name,
            item.part_number,
            item.category,
            item.expected_quantity,
            item.scanned_quantity,
            item.missing_quantity,
            item.status,
            item.missing_note,
            item.pallet_id,
        ])?;
    }
    Ok(())
}

fn with_items(conn: &Connection, order: Option<CompletionOrder>) -> Result<Option<CompletionOrder>> {
    match order {
        Some(mut order) => {
            order.items = items(conn, &order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

pub fn get(conn: &Connection, id: &EntityId) -> Result<Option<CompletionOrder>> {
    let order = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM completion_orders WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    with_items(conn, order)
}

pub fn get_by_number(conn: &Connection, number: &str) -> Result<Option<CompletionOrder>> {
    let order = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM completion_orders WHERE order_number = ?1"),
            [number],
            from_row,
        )
        .optional()?;
    with_items(conn, order)
}

pub fn get_for_subsystem(
    conn: &Connection,
    subsystem_id: &EntityId,
) -> Result<Option<CompletionOrder>> {
    let order = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM completion_orders WHERE subsystem_id = ?1"),
            [subsystem_id],
            from_row,
        )
        .optional()?;
    with_items(conn, order)
}

/// Orders without items
pub fn list(conn: &Connection, status: Option<OrderStatus>) -> Result<Vec<CompletionOrder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM completion_orders
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created, order_number"
    ))?;
    let rows = stmt.query_map([status], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update(conn: &Connection, order: &CompletionOrder) -> Result<()> {
    conn.execute(
        "UPDATE completion_orders
         SET status = ?1, decision = ?2, decision_note = ?3, partial = ?4,
             started_at = ?5, completed_at = ?6
         WHERE id = ?7",
        params![
            order.status,
            order.decision,
            order.decision_note,
            order.partial,
            order.started_at,
            order.completed_at,
            order.id,
        ],
    )?;
    Ok(())
}

/// Items of an order with the serial numbers scanned against each
pub fn items(conn: &Connection, order_id: &EntityId) -> Result<Vec<CompletionItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM completion_items WHERE order_id = ?1 ORDER BY sequence, name"
    ))?;
    let rows = stmt.query_map([order_id], item_from_row)?;
    let mut items = rows.collect::<rusqlite::Result<Vec<_>>>()?;

    let mut serials = conn.prepare(
        "SELECT serial_number FROM completion_scans
         WHERE item_id = ?1 AND serial_number IS NOT NULL ORDER BY scanned_at, id",
    )?;
    for item in &mut items {
        let rows = serials.query_map([item.id], |row| row.get::<_, String>(0))?;
        item.serial_numbers = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    }
    Ok(items)
}

/// First PENDING/PARTIAL item of the order carrying `part_number`
pub fn find_eligible_item(
    conn: &Connection,
    order_id: &EntityId,
    part_number: &str,
) -> Result<Option<CompletionItem>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {ITEM_COLUMNS} FROM completion_items
                 WHERE order_id = ?1 AND part_number = ?2 AND status IN ('PENDING', 'PARTIAL')
                 ORDER BY sequence, name LIMIT 1"
            ),
            params![order_id, part_number],
            item_from_row,
        )
        .optional()?)
}

pub fn update_item(conn: &Connection, item: &CompletionItem) -> Result<()> {
    conn.execute(
        "UPDATE completion_items
         SET scanned_quantity = ?1, missing_quantity = ?2, status = ?3, missing_note = ?4,
             pallet_id = ?5
         WHERE id = ?6",
        params![
            item.scanned_quantity,
            item.missing_quantity,
            item.status,
            item.missing_note,
            item.pallet_id,
            item.id,
        ],
    )?;
    Ok(())
}

pub fn insert_scan(conn: &Connection, scan: &ScanRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO completion_scans
         (id, item_id, barcode, quantity, accepted, serial_number, scanned_by, scanned_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            scan.id,
            scan.item_id,
            scan.barcode,
            scan.quantity,
            scan.accepted,
            scan.serial_number,
            scan.scanned_by,
            scan.scanned_at,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!(
                "serial number {} was already scanned",
                scan.serial_number.as_deref().unwrap_or_default()
            )
        })
    })?;
    Ok(())
}

pub fn scans(conn: &Connection, order_id: &EntityId) -> Result<Vec<ScanRecord>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.item_id, s.barcode, s.quantity, s.accepted, s.serial_number,
                s.scanned_by, s.scanned_at
         FROM completion_scans s
         JOIN completion_items i ON i.id = s.item_id
         WHERE i.order_id = ?1
         ORDER BY s.scanned_at, s.id",
    )?;
    let rows = stmt.query_map([order_id], |row| {
        Ok(ScanRecord {
            id: row.get(0)?,
            item_id: row.get(1)?,
            barcode: row.get(2)?,
            quantity: row.get(3)?,
            accepted: row.get(4)?,
            serial_number: row.get(5)?,
            scanned_by: row.get(6)?,
            scanned_at: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn resolve(conn: &Connection, key: &str) -> Result<Option<CompletionOrder>> {
    match key.parse::<EntityId>() {
        Ok(id) => get(conn, &id),
        Err(_) => get_by_number(conn, key),
    }
}
