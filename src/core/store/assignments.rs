//! Device IP assignment rows

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::core::store::serialize::ip_column;
use crate::entities::{AssignmentStatus, DeviceIpAssignment};

const COLUMNS: &str = "id, allocation_id, ip_address, category, device_type, hostname, \
                       description, serial_number, status, configured_by, configured_at, \
                       verified_at, created";

fn from_row(row: &Row<'_>) -> rusqlite::Result<DeviceIpAssignment> {
    Ok(DeviceIpAssignment {
        id: row.get("id")?,
        allocation_id: row.get("allocation_id")?,
        ip_address: ip_column(row, "ip_address")?,
        category: row.get("category")?,
        device_type: row.get("device_type")?,
        hostname: row.get("hostname")?,
        description: row.get("description")?,
        serial_number: row.get("serial_number")?,
        status: row.get("status")?,
        configured_by: row.get("configured_by")?,
        configured_at: row.get("configured_at")?,
        verified_at: row.get("verified_at")?,
        created: row.get("created")?,
    })
}

/// Insert an assignment into the physical segment `segment_id`
pub fn insert(conn: &Connection, assignment: &DeviceIpAssignment, segment_id: &EntityId) -> Result<()> {
    conn.execute(
        "INSERT INTO ip_assignments
         (id, allocation_id, segment_id, ip_address, category, device_type, hostname,
          description, serial_number, status, configured_by, configured_at, verified_at, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            assignment.id,
            assignment.allocation_id,
            segment_id,
            assignment.ip_address.to_string(),
            assignment.category,
            assignment.device_type,
            assignment.hostname,
            assignment.description,
            assignment.serial_number,
            assignment.status,
            assignment.configured_by,
            assignment.configured_at,
            assignment.verified_at,
            assignment.created,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!("address {} is already assigned", assignment.ip_address)
        })
    })?;
    Ok(())
}

pub fn get(conn: &Connection, id: &EntityId) -> Result<Option<DeviceIpAssignment>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM ip_assignments WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

/// Assignments of one allocation, in address order
pub fn list_for_allocation(
    conn: &Connection,
    allocation_id: &EntityId,
) -> Result<Vec<DeviceIpAssignment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM ip_assignments WHERE allocation_id = ?1 ORDER BY created, id"
    ))?;
    let rows = stmt.query_map([allocation_id], from_row)?;
    let mut list = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    list.sort_by_key(|a| a.ip_address);
    Ok(list)
}

/// Every address taken anywhere in a physical segment
pub fn used_in_segment(conn: &Connection, segment_id: &EntityId) -> Result<BTreeSet<Ipv4Addr>> {
    let mut stmt = conn.prepare("SELECT ip_address FROM ip_assignments WHERE segment_id = ?1")?;
    let rows = stmt.query_map([segment_id], |row| ip_column(row, "ip_address"))?;
    Ok(rows.collect::<rusqlite::Result<BTreeSet<_>>>()?)
}

/// Persist serial, status and stamps of an existing assignment
pub fn update(conn: &Connection, assignment: &DeviceIpAssignment) -> Result<()> {
    conn.execute(
        "UPDATE ip_assignments
         SET serial_number = ?1, status = ?2, configured_by = ?3, configured_at = ?4,
             verified_at = ?5, description = ?6
         WHERE id = ?7",
        params![
            assignment.serial_number,
            assignment.status,
            assignment.configured_by,
            assignment.configured_at,
            assignment.verified_at,
            assignment.description,
            assignment.id,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!(
                "serial number {} is already in use",
                assignment.serial_number.as_deref().unwrap_or_default()
            )
        })
    })?;
    Ok(())
}

pub fn set_status_for_allocation(
    conn: &Connection,
    allocation_id: &EntityId,
    status: AssignmentStatus,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE ip_assignments SET status = ?1 WHERE allocation_id = ?2",
        params![status, allocation_id],
    )?)
}
