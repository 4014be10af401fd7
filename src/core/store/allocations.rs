//! Network allocation rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::core::store::serialize::ip_column;
use crate::entities::NetworkAllocation;

const COLUMNS: &str = "a.id AS id, a.subsystem_id AS subsystem_id, a.pool_id AS pool_id, \
                       a.cidr AS cidr, a.gateway AS gateway, a.subnet_mask AS subnet_mask, \
                       a.ntp_server AS ntp_server, a.total_hosts AS total_hosts, \
                       a.used_hosts AS used_hosts, a.shared_from AS shared_from, \
                       a.created AS created";

fn from_row(row: &Row<'_>) -> rusqlite::Result<NetworkAllocation> {
    Ok(NetworkAllocation {
        id: row.get("id")?,
        subsystem_id: row.get("subsystem_id")?,
        pool_id: row.get("pool_id")?,
        cidr: row.get("cidr")?,
        gateway: ip_column(row, "gateway")?,
        subnet_mask: ip_column(row, "subnet_mask")?,
        ntp_server: ip_column(row, "ntp_server")?,
        total_hosts: row.get("total_hosts")?,
        used_hosts: row.get("used_hosts")?,
        shared_from: row.get("shared_from")?,
        created: row.get("created")?,
    })
}

pub fn insert(conn: &Connection, alloc: &NetworkAllocation) -> Result<()> {
    conn.execute(
        "INSERT INTO network_allocations
         (id, subsystem_id, pool_id, cidr, gateway, subnet_mask, ntp_server,
          total_hosts, used_hosts, shared_from, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            alloc.id,
            alloc.subsystem_id,
            alloc.pool_id,
            alloc.cidr,
            alloc.gateway.to_string(),
            alloc.subnet_mask.to_string(),
            alloc.ntp_server.to_string(),
            alloc.total_hosts,
            alloc.used_hosts,
            alloc.shared_from,
            alloc.created,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!("subsystem {} already has a network allocation", alloc.subsystem_id)
        })
    })?;
    Ok(())
}

pub fn get(conn: &Connection, id: &EntityId) -> Result<Option<NetworkAllocation>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM network_allocations a WHERE a.id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

pub fn get_for_subsystem(
    conn: &Connection,
    subsystem_id: &EntityId,
) -> Result<Option<NetworkAllocation>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM network_allocations a WHERE a.subsystem_id = ?1"),
            [subsystem_id],
            from_row,
        )
        .optional()?)
}

/// Earliest allocation held by another subsystem of the same contract and system type
pub fn find_shareable(
    conn: &Connection,
    contract_id: &EntityId,
    system_type: &str,
    exclude_subsystem: &EntityId,
) -> Result<Option<NetworkAllocation>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM network_allocations a
                 JOIN subsystems s ON s.id = a.subsystem_id
                 WHERE s.contract_id = ?1 AND s.system_type = ?2 AND s.id != ?3
                 ORDER BY a.created, a.id LIMIT 1"
            ),
            params![contract_id, system_type, exclude_subsystem],
            from_row,
        )
        .optional()?)
}

/// Number of ranges carved from a pool; shared allocations reuse a range
pub fn carved_count(conn: &Connection, pool_id: &EntityId) -> Result<u32> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM network_allocations WHERE pool_id = ?1 AND shared_from IS NULL",
        [pool_id],
        |row| row.get(0),
    )?)
}

pub fn list(conn: &Connection, pool_id: Option<&EntityId>) -> Result<Vec<NetworkAllocation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM network_allocations a
         WHERE (?1 IS NULL OR a.pool_id = ?1)
         ORDER BY a.created, a.id"
    ))?;
    let rows = stmt.query_map([pool_id], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn set_used_hosts(conn: &Connection, id: &EntityId, used: u32) -> Result<()> {
    conn.execute(
        "UPDATE network_allocations SET used_hosts = ?1 WHERE id = ?2",
        params![used, id],
    )?;
    Ok(())
}
