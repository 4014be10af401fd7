//! Subsystem rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::entities::{Subsystem, SubsystemStatus};

const COLUMNS: &str =
    "id, contract_id, subsystem_number, name, system_type, quantity, status, created, updated";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Subsystem> {
    Ok(Subsystem {
        id: row.get("id")?,
        contract_id: row.get("contract_id")?,
        subsystem_number: row.get("subsystem_number")?,
        name: row.get("name")?,
        system_type: row.get("system_type")?,
        quantity: row.get("quantity")?,
        status: row.get("status")?,
        created: row.get("created")?,
        updated: row.get("updated")?,
    })
}

/// Filters for [`list`]
#[derive(Debug, Default, Clone)]
pub struct SubsystemFilter {
    pub contract_id: Option<EntityId>,
    pub status: Option<SubsystemStatus>,
    pub system_type: Option<String>,
}

pub fn insert(conn: &Connection, subsystem: &Subsystem) -> Result<()> {
    conn.execute(
        "INSERT INTO subsystems
         (id, contract_id, subsystem_number, name, system_type, quantity, status, created, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            subsystem.id,
            subsystem.contract_id,
            subsystem.subsystem_number,
            subsystem.name,
            subsystem.system_type,
            subsystem.quantity,
            subsystem.status,
            subsystem.created,
            subsystem.updated,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!("subsystem number {} already exists", subsystem.subsystem_number)
        })
    })?;
    Ok(())
}

pub fn get(conn: &Connection, id: &EntityId) -> Result<Option<Subsystem>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM subsystems WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

pub fn get_by_number(conn: &Connection, number: &str) -> Result<Option<Subsystem>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM subsystems WHERE subsystem_number = ?1"),
            [number],
            from_row,
        )
        .optional()?)
}

pub fn list(conn: &Connection, filter: &SubsystemFilter) -> Result<Vec<Subsystem>> {
    let mut sql = format!("SELECT {COLUMNS} FROM subsystems WHERE 1=1");
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(contract) = filter.contract_id {
        args.push(Box::new(contract));
        sql.push_str(&format!(" AND contract_id = ?{}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(Box::new(status));
        sql.push_str(&format!(" AND status = ?{}", args.len()));
    }
    if let Some(system_type) = &filter.system_type {
        args.push(Box::new(system_type.clone()));
        sql.push_str(&format!(" AND system_type = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY subsystem_number");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update_status(conn: &Connection, subsystem: &Subsystem) -> Result<()> {
    conn.execute(
        "UPDATE subsystems SET status = ?1, updated = ?2 WHERE id = ?3",
        params![subsystem.status, subsystem.updated, subsystem.id],
    )?;
    Ok(())
}

/// Look up by ID when `key` parses as one, otherwise by subsystem number
pub fn resolve(conn: &Connection, key: &str) -> Result<Option<Subsystem>> {
    match key.parse::<EntityId>() {
        Ok(id) => get(conn, &id),
        Err(_) => get_by_number(conn, key),
    }
}
