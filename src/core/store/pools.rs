//! Network pool rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::entities::NetworkPool;

const COLUMNS: &str = "id, name, cidr, priority, is_active, description, created";

fn from_row(row: &Row<'_>) -> rusqlite::Result<NetworkPool> {
    Ok(NetworkPool {
        id: row.get("id")?,
        name: row.get("name")?,
        cidr: row.get("cidr")?,
        priority: row.get("priority")?,
        is_active: row.get("is_active")?,
        description: row.get("description")?,
        created: row.get("created")?,
    })
}

pub fn insert(conn: &Connection, pool: &NetworkPool) -> Result<()> {
    conn.execute(
        "INSERT INTO network_pools (id, name, cidr, priority, is_active, description, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            pool.id,
            pool.name,
            pool.cidr,
            pool.priority,
            pool.is_active,
            pool.description,
            pool.created,
        ],
    )
    .map_err(|e| ProvisionError::from_insert(e, || format!("pool {} already exists", pool.name)))?;
    Ok(())
}

pub fn get(conn: &Connection, id: &EntityId) -> Result<Option<NetworkPool>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM network_pools WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<NetworkPool>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM network_pools WHERE name = ?1"),
            [name],
            from_row,
        )
        .optional()?)
}

/// All pools in selection order: ascending priority, then name
pub fn list(conn: &Connection) -> Result<Vec<NetworkPool>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM network_pools ORDER BY priority, name"
    ))?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// The pool a brand-new range is carved from
pub fn first_active(conn: &Connection) -> Result<Option<NetworkPool>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM network_pools WHERE is_active = 1
                 ORDER BY priority, name LIMIT 1"
            ),
            [],
            from_row,
        )
        .optional()?)
}

pub fn set_active(conn: &Connection, id: &EntityId, active: bool) -> Result<()> {
    conn.execute(
        "UPDATE network_pools SET is_active = ?1 WHERE id = ?2",
        params![active, id],
    )?;
    Ok(())
}

pub fn resolve(conn: &Connection, key: &str) -> Result<Option<NetworkPool>> {
    match key.parse::<EntityId>() {
        Ok(id) => get(conn, &id),
        Err(_) => get_by_name(conn, key),
    }
}
