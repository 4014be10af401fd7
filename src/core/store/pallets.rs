//! Pallet rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::Result;
use crate::core::identity::EntityId;
use crate::entities::Pallet;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Pallet> {
    Ok(Pallet {
        id: row.get("id")?,
        order_id: row.get("order_id")?,
        pallet_number: row.get("pallet_number")?,
        created: row.get("created")?,
        item_count: row.get("item_count")?,
    })
}

const SELECT: &str = "SELECT p.id AS id, p.order_id AS order_id, p.pallet_number AS pallet_number,
                             p.created AS created,
                             (SELECT COUNT(*) FROM completion_items i WHERE i.pallet_id = p.id)
                                 AS item_count
                      FROM pallets p";

pub fn find(conn: &Connection, order_id: &EntityId, pallet_number: &str) -> Result<Option<Pallet>> {
    Ok(conn
        .query_row(
            &format!("{SELECT} WHERE p.order_id = ?1 AND p.pallet_number = ?2"),
            params![order_id, pallet_number],
            from_row,
        )
        .optional()?)
}

/// Insert unless (order, number) exists; returns the stored pallet either way
pub fn get_or_insert(conn: &Connection, pallet: &Pallet) -> Result<Pallet> {
    conn.execute(
        "INSERT INTO pallets (id, order_id, pallet_number, created) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (order_id, pallet_number) DO NOTHING",
        params![pallet.id, pallet.order_id, pallet.pallet_number, pallet.created],
    )?;
    find(conn, &pallet.order_id, &pallet.pallet_number)?
        .ok_or_else(|| crate::core::error::ProvisionError::not_found("Pallet", &pallet.pallet_number))
}

pub fn list(conn: &Connection, order_id: &EntityId) -> Result<Vec<Pallet>> {
    let mut stmt = conn.prepare(&format!("{SELECT} WHERE p.order_id = ?1 ORDER BY p.pallet_number"))?;
    let rows = stmt.query_map([order_id], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
