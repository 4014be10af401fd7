//! Contract rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::entities::Contract;

const COLUMNS: &str = "id, contract_number, name, project_manager, created";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Contract> {
    Ok(Contract {
        id: row.get("id")?,
        contract_number: row.get("contract_number")?,
        name: row.get("name")?,
        project_manager: row.get("project_manager")?,
        created: row.get("created")?,
    })
}

pub fn insert(conn: &Connection, contract: &Contract) -> Result<()> {
    conn.execute(
        "INSERT INTO contracts (id, contract_number, name, project_manager, created)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            contract.id,
            contract.contract_number,
            contract.name,
            contract.project_manager,
            contract.created,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!("contract number {} already exists", contract.contract_number)
        })
    })?;
    Ok(())
}

pub fn get(conn: &Connection, id: &EntityId) -> Result<Option<Contract>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM contracts WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

pub fn get_by_number(conn: &Connection, number: &str) -> Result<Option<Contract>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM contracts WHERE contract_number = ?1"),
            [number],
            from_row,
        )
        .optional()?)
}

pub fn list(conn: &Connection) -> Result<Vec<Contract>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM contracts ORDER BY contract_number"
    ))?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Look up by ID when `key` parses as one, otherwise by contract number
pub fn resolve(conn: &Connection, key: &str) -> Result<Option<Contract>> {
    match key.parse::<EntityId>() {
        Ok(id) => get(conn, &id),
        Err(_) => get_by_number(conn, key),
    }
}
