//! SQLite-backed persistence for the provisioning core
//!
//! Every engine operation runs inside one IMMEDIATE transaction obtained from
//! [`Store::transaction`], which takes the database write lock up front.
//! Read-then-write sequences (next free address, scan accumulation) are
//! therefore serialized, and the UNIQUE constraints below reject any writer
//! that still loses a race.

use std::fs;
use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::core::error::Result;

pub mod allocations;
pub mod assignments;
pub mod boms;
pub mod contracts;
pub mod orders;
pub mod pallets;
pub mod pools;
pub mod prefab;
pub mod serialize;
pub mod subsystems;
pub mod templates;

#[cfg(test)]
mod tests;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS contracts (
    id TEXT PRIMARY KEY,
    contract_number TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    project_manager TEXT,
    created TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subsystems (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id),
    subsystem_number TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    system_type TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 1),
    status TEXT NOT NULL,
    created TEXT NOT NULL,
    updated TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_subsystems_contract ON subsystems(contract_id, system_type);
CREATE INDEX IF NOT EXISTS idx_subsystems_status ON subsystems(status);

CREATE TABLE IF NOT EXISTS bom_templates (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    system_type TEXT NOT NULL,
    version INTEGER NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bom_templates_type ON bom_templates(system_type, version);

CREATE TABLE IF NOT EXISTS bom_template_items (
    id TEXT PRIMARY KEY,
    template_id TEXT NOT NULL REFERENCES bom_templates(id),
    sequence INTEGER NOT NULL,
    name TEXT NOT NULL,
    part_number TEXT NOT NULL,
    quantity REAL NOT NULL CHECK (quantity >= 0),
    multiplier REAL NOT NULL DEFAULT 1,
    category TEXT NOT NULL,
    requires_ip INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bom_template_items_template ON bom_template_items(template_id);

CREATE TABLE IF NOT EXISTS generated_boms (
    id TEXT PRIMARY KEY,
    subsystem_id TEXT NOT NULL UNIQUE REFERENCES subsystems(id),
    template_id TEXT NOT NULL REFERENCES bom_templates(id),
    template_code TEXT NOT NULL,
    template_version INTEGER NOT NULL,
    generated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS generated_bom_items (
    id TEXT PRIMARY KEY,
    bom_id TEXT NOT NULL REFERENCES generated_boms(id),
    sequence INTEGER NOT NULL,
    name TEXT NOT NULL,
    part_number TEXT NOT NULL,
    category TEXT NOT NULL,
    requires_ip INTEGER NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    scanned_quantity INTEGER NOT NULL DEFAULT 0,
    missing_quantity INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_generated_bom_items_bom ON generated_bom_items(bom_id);

CREATE TABLE IF NOT EXISTS network_pools (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    cidr TEXT NOT NULL,
    priority INTEGER NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    description TEXT,
    created TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS network_allocations (
    id TEXT PRIMARY KEY,
    subsystem_id TEXT NOT NULL UNIQUE REFERENCES subsystems(id),
    pool_id TEXT NOT NULL REFERENCES network_pools(id),
    cidr TEXT NOT NULL,
    gateway TEXT NOT NULL,
    subnet_mask TEXT NOT NULL,
    ntp_server TEXT NOT NULL,
    total_hosts INTEGER NOT NULL,
    used_hosts INTEGER NOT NULL DEFAULT 0,
    shared_from TEXT REFERENCES network_allocations(id),
    created TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_network_allocations_pool ON network_allocations(pool_id);

-- segment_id: the allocation that originally carved the range, shared by
-- every allocation reusing it
CREATE TABLE IF NOT EXISTS ip_assignments (
    id TEXT PRIMARY KEY,
    allocation_id TEXT NOT NULL REFERENCES network_allocations(id),
    segment_id TEXT NOT NULL,
    ip_address TEXT NOT NULL,
    category TEXT NOT NULL,
    device_type TEXT NOT NULL,
    hostname TEXT NOT NULL,
    description TEXT,
    serial_number TEXT UNIQUE,
    status TEXT NOT NULL,
    configured_by TEXT,
    configured_at TEXT,
    verified_at TEXT,
    created TEXT NOT NULL,
    UNIQUE (allocation_id, ip_address),
    UNIQUE (segment_id, ip_address)
);
CREATE INDEX IF NOT EXISTS idx_ip_assignments_allocation ON ip_assignments(allocation_id);

CREATE TABLE IF NOT EXISTS completion_orders (
    id TEXT PRIMARY KEY,
    order_number TEXT NOT NULL UNIQUE,
    subsystem_id TEXT NOT NULL UNIQUE REFERENCES subsystems(id),
    bom_id TEXT NOT NULL REFERENCES generated_boms(id),
    status TEXT NOT NULL,
    decision TEXT,
    decision_note TEXT,
    partial INTEGER NOT NULL DEFAULT 0,
    created_by TEXT,
    created TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS completion_items (
    id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES completion_orders(id),
    bom_item_id TEXT NOT NULL REFERENCES generated_bom_items(id),
    sequence INTEGER NOT NULL,
    name TEXT NOT NULL,
    part_number TEXT NOT NULL,
    category TEXT NOT NULL,
    expected_quantity INTEGER NOT NULL,
    scanned_quantity INTEGER NOT NULL DEFAULT 0 CHECK (scanned_quantity <= expected_quantity),
    missing_quantity INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    missing_note TEXT,
    pallet_id TEXT REFERENCES pallets(id)
);
CREATE INDEX IF NOT EXISTS idx_completion_items_part ON completion_items(order_id, part_number);

CREATE TABLE IF NOT EXISTS completion_scans (
    id TEXT PRIMARY KEY,
    item_id TEXT NOT NULL REFERENCES completion_items(id),
    barcode TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    accepted INTEGER NOT NULL,
    serial_number TEXT UNIQUE,
    scanned_by TEXT,
    scanned_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_completion_scans_item ON completion_scans(item_id);

CREATE TABLE IF NOT EXISTS pallets (
    id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES completion_orders(id),
    pallet_number TEXT NOT NULL,
    created TEXT NOT NULL,
    UNIQUE (order_id, pallet_number)
);

CREATE TABLE IF NOT EXISTS prefab_tasks (
    id TEXT PRIMARY KEY,
    task_number TEXT NOT NULL UNIQUE,
    subsystem_id TEXT NOT NULL UNIQUE REFERENCES subsystems(id),
    order_id TEXT NOT NULL UNIQUE REFERENCES completion_orders(id),
    status TEXT NOT NULL,
    created TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS prefab_devices (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES prefab_tasks(id),
    assignment_id TEXT NOT NULL REFERENCES ip_assignments(id),
    status TEXT NOT NULL,
    note TEXT,
    updated TEXT NOT NULL,
    UNIQUE (task_id, assignment_id)
);
"#;

/// Handle to the provisioning database
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    /// Fresh in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        let version: Option<i32> = self
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        if version.is_none() {
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
            debug!(version = SCHEMA_VERSION, "initialized provisioning schema");
        }
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i32> {
        Ok(self
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?)
    }

    /// Read-only access outside a transaction
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin an IMMEDIATE transaction (takes the write lock now)
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}
