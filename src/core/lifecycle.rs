//! Subsystem lifecycle state machine
//!
//! Stages move strictly forward, one at a time, as side effects of the
//! engines succeeding. CANCELLED is reachable only from CREATED.

use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::core::store;
use crate::entities::{Subsystem, SubsystemStatus};

impl SubsystemStatus {
    /// The single forward successor, if any
    pub fn next(&self) -> Option<SubsystemStatus> {
        match self {
            SubsystemStatus::Created => Some(SubsystemStatus::BomGenerated),
            SubsystemStatus::BomGenerated => Some(SubsystemStatus::IpAllocated),
            SubsystemStatus::IpAllocated => Some(SubsystemStatus::InCompletion),
            SubsystemStatus::InCompletion => Some(SubsystemStatus::InPrefabrication),
            SubsystemStatus::InPrefabrication => Some(SubsystemStatus::ReadyForDeployment),
            SubsystemStatus::ReadyForDeployment => Some(SubsystemStatus::Deployed),
            SubsystemStatus::Deployed | SubsystemStatus::Cancelled => None,
        }
    }

    pub fn allowed_transitions(&self) -> Vec<SubsystemStatus> {
        let mut allowed: Vec<_> = self.next().into_iter().collect();
        if *self == SubsystemStatus::Created {
            allowed.push(SubsystemStatus::Cancelled);
        }
        allowed
    }

    pub fn can_transition_to(&self, to: SubsystemStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubsystemStatus::Deployed | SubsystemStatus::Cancelled)
    }
}

/// Fail unless the subsystem is currently in `expected`
pub fn require_status(subsystem: &Subsystem, expected: SubsystemStatus, action: &str) -> Result<()> {
    if subsystem.status != expected {
        return Err(ProvisionError::StateViolation(format!(
            "cannot {} subsystem {}: status is {}, requires {}",
            action, subsystem.subsystem_number, subsystem.status, expected
        )));
    }
    Ok(())
}

/// Move a subsystem from `from` to `to`, re-reading the persisted status
///
/// Must be called inside the transaction of the operation that caused it.
pub fn advance(
    conn: &Connection,
    subsystem_id: &EntityId,
    from: SubsystemStatus,
    to: SubsystemStatus,
) -> Result<Subsystem> {
    let mut subsystem = store::subsystems::get(conn, subsystem_id)?
        .ok_or_else(|| ProvisionError::not_found("Subsystem", subsystem_id))?;

    if subsystem.status != from || !from.can_transition_to(to) {
        return Err(ProvisionError::StateViolation(format!(
            "invalid transition for subsystem {}: {} → {} (current: {})",
            subsystem.subsystem_number, from, to, subsystem.status
        )));
    }

    subsystem.status = to;
    subsystem.updated = Utc::now();
    store::subsystems::update_status(conn, &subsystem)?;

    info!(
        subsystem = %subsystem.subsystem_number,
        from = %from,
        to = %to,
        "subsystem transitioned"
    );
    Ok(subsystem)
}
