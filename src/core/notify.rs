//! Notification collaborator
//!
//! Engines publish events after their transaction commits. Delivery is
//! fire-and-forget: a failing notifier is logged and never affects the
//! business operation that triggered it.

use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Events the provisioning core emits
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvisioningEvent {
    CompletionTaskCreated {
        order_number: String,
        subsystem_number: String,
        items: usize,
    },
    MaterialShortage {
        order_number: String,
        subsystem_number: String,
        /// (part number, missing quantity)
        shortages: Vec<(String, u32)>,
        note: Option<String>,
    },
    CompletionFinished {
        order_number: String,
        subsystem_number: String,
        partial: bool,
    },
    PrefabricationTaskCreated {
        task_number: String,
        subsystem_number: String,
        devices: usize,
    },
    PrefabricationCompleted {
        task_number: String,
        subsystem_number: String,
    },
}

impl ProvisioningEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProvisioningEvent::CompletionTaskCreated { .. } => "completion_task_created",
            ProvisioningEvent::MaterialShortage { .. } => "material_shortage",
            ProvisioningEvent::CompletionFinished { .. } => "completion_finished",
            ProvisioningEvent::PrefabricationTaskCreated { .. } => "prefabrication_task_created",
            ProvisioningEvent::PrefabricationCompleted { .. } => "prefabrication_completed",
        }
    }
}

pub trait Notifier {
    fn notify(&self, event: &ProvisioningEvent) -> Result<(), NotifyError>;
}

/// Deliver an event, swallowing failures
pub fn dispatch(notifier: &dyn Notifier, event: ProvisioningEvent) {
    if let Err(e) = notifier.notify(&event) {
        warn!(event = event.name(), error = %e, "notification dropped");
    }
}

/// Writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &ProvisioningEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(event).map_err(|e| NotifyError(e.to_string()))?;
        info!(target: "sysprov::notify", event = event.name(), %payload, "notification");
        Ok(())
    }
}

/// Drops everything (notifications disabled)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &ProvisioningEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ProvisioningEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProvisioningEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &ProvisioningEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|e| NotifyError(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}
