//! Prefabrication tasks and devices

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::core::store::serialize::ip_column;
use crate::entities::{DeviceRow, DeviceStatus, PrefabDevice, PrefabTask, TaskStatus};

const COLUMNS: &str =
    "id, task_number, subsystem_id, order_id, status, created, started_at, completed_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<PrefabTask> {
    Ok(PrefabTask {
        id: row.get("id")?,
        task_number: row.get("task_number")?,
        subsystem_id: row.get("subsystem_id")?,
        order_id: row.get("order_id")?,
        status: row.get("status")?,
        created: row.get("created")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
    })
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<PrefabDevice> {
    Ok(PrefabDevice {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        assignment_id: row.get("assignment_id")?,
        status: row.get("status")?,
        note: row.get("note")?,
        updated: row.get("updated")?,
    })
}

pub fn insert_task(conn: &Connection, task: &PrefabTask) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO prefab_tasks ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            task.id,
            task.task_number,
            task.subsystem_id,
            task.order_id,
            task.status,
            task.created,
            task.started_at,
            task.completed_at,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!("a prefabrication task already exists: {}", task.task_number)
        })
    })?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: &EntityId) -> Result<Option<PrefabTask>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM prefab_tasks WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

pub fn get_task_by_number(conn: &Connection, number: &str) -> Result<Option<PrefabTask>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM prefab_tasks WHERE task_number = ?1"),
            [number],
            from_row,
        )
        .optional()?)
}

pub fn get_task_for_subsystem(
    conn: &Connection,
    subsystem_id: &EntityId,
) -> Result<Option<PrefabTask>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM prefab_tasks WHERE subsystem_id = ?1"),
            [subsystem_id],
            from_row,
        )
        .optional()?)
}

pub fn update_task(conn: &Connection, task: &PrefabTask) -> Result<()> {
    conn.execute(
        "UPDATE prefab_tasks SET status = ?1, started_at = ?2, completed_at = ?3 WHERE id = ?4",
        params![task.status, task.started_at, task.completed_at, task.id],
    )?;
    Ok(())
}

pub fn insert_device(conn: &Connection, device: &PrefabDevice) -> Result<()> {
    conn.execute(
        "INSERT INTO prefab_devices (id, task_id, assignment_id, status, note, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            device.id,
            device.task_id,
            device.assignment_id,
            device.status,
            device.note,
            device.updated,
        ],
    )
    .map_err(|e| {
        ProvisionError::from_insert(e, || {
            format!("assignment {} is already part of the task", device.assignment_id)
        })
    })?;
    Ok(())
}

pub fn find_device(
    conn: &Connection,
    task_id: &EntityId,
    assignment_id: &EntityId,
) -> Result<Option<PrefabDevice>> {
    Ok(conn
        .query_row(
            "SELECT id, task_id, assignment_id, status, note, updated
             FROM prefab_devices WHERE task_id = ?1 AND assignment_id = ?2",
            params![task_id, assignment_id],
            device_from_row,
        )
        .optional()?)
}

pub fn update_device(conn: &Connection, device: &PrefabDevice) -> Result<()> {
    conn.execute(
        "UPDATE prefab_devices SET status = ?1, note = ?2, updated = ?3 WHERE id = ?4",
        params![device.status, device.note, device.updated, device.id],
    )?;
    Ok(())
}

/// Follow a verification done through the network endpoint: CONFIGURED rows of
/// open tasks for `assignment_id` become VERIFIED
pub fn mark_assignment_verified(
    conn: &Connection,
    assignment_id: &EntityId,
    at: DateTime<Utc>,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE prefab_devices SET status = ?1, updated = ?2
         WHERE assignment_id = ?3 AND status = ?4
           AND task_id IN (SELECT id FROM prefab_tasks WHERE status != ?5)",
        params![
            DeviceStatus::Verified,
            at,
            assignment_id,
            DeviceStatus::Configured,
            TaskStatus::Completed,
        ],
    )?)
}

/// Assignments of an allocation left-joined with their device in `task_id`
///
/// Network identity comes from the allocation row; NTP is always the gateway.
pub fn device_rows(
    conn: &Connection,
    task_id: &EntityId,
    allocation_id: &EntityId,
) -> Result<Vec<DeviceRow>> {
    let mut stmt = conn.prepare(
        "SELECT a.id AS assignment_id, d.id AS device_id, a.hostname AS hostname,
                a.device_type AS device_type, a.category AS category,
                a.serial_number AS serial_number, a.ip_address AS ip_address,
                n.subnet_mask AS subnet_mask, n.gateway AS gateway,
                a.description AS description, d.status AS status
         FROM ip_assignments a
         JOIN network_allocations n ON n.id = a.allocation_id
         LEFT JOIN prefab_devices d ON d.assignment_id = a.id AND d.task_id = ?1
         WHERE a.allocation_id = ?2",
    )?;
    let rows = stmt.query_map(params![task_id, allocation_id], |row| {
        let gateway = ip_column(row, "gateway")?;
        Ok(DeviceRow {
            assignment_id: row.get("assignment_id")?,
            device_id: row.get("device_id")?,
            hostname: row.get("hostname")?,
            device_type: row.get("device_type")?,
            category: row.get("category")?,
            serial_number: row.get("serial_number")?,
            ip_address: ip_column(row, "ip_address")?,
            subnet_mask: ip_column(row, "subnet_mask")?,
            gateway,
            ntp_server: gateway,
            description: row.get("description")?,
            status: row
                .get::<_, Option<DeviceStatus>>("status")?
                .unwrap_or_default(),
        })
    })?;
    let mut list = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    list.sort_by_key(|r| r.ip_address);
    Ok(list)
}

pub fn resolve_task(conn: &Connection, key: &str) -> Result<Option<PrefabTask>> {
    match key.parse::<EntityId>() {
        Ok(id) => get_task(conn, &id),
        Err(_) => get_task_by_number(conn, key),
    }
}
