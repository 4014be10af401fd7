//! sysprov: subsystem provisioning toolkit
//!
//! Tracks a security/telecom subsystem from contract intake to deployment:
//! BOM generation from templates, IP allocation out of shared pools,
//! warehouse pick reconciliation and device prefabrication, all persisted in
//! a per-project SQLite database.

pub mod cli;
pub mod core;
pub mod entities;
