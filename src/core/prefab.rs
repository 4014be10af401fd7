//! Prefabrication configurator
//!
//! Devices of a completed order get their serial numbers and are verified
//! against the address plan before the subsystem is released for deployment.

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::core::error::{ProvisionError, Result};
use crate::core::identity::EntityId;
use crate::core::label::{LabelData, LabelRenderer};
use crate::core::lifecycle;
use crate::core::network::{configure_in, verify_in};
use crate::core::notify::{dispatch, Notifier, ProvisioningEvent};
use crate::core::store::{self, Store};
use crate::entities::{
    DeviceRow, DeviceStatus, NetworkAllocation, OrderStatus, PrefabDevice, PrefabTask,
    SubsystemStatus, TaskStatus,
};

pub struct PrefabConfigurator<'a> {
    store: &'a Store,
    notifier: &'a dyn Notifier,
    operator: Option<&'a str>,
    label_template: Option<&'a str>,
}

impl<'a> PrefabConfigurator<'a> {
    pub fn new(store: &'a Store, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            notifier,
            operator: None,
            label_template: None,
        }
    }

    pub fn with_operator(mut self, operator: &'a str) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Tera source replacing the embedded label template
    pub fn with_label_template(mut self, source: &'a str) -> Self {
        self.label_template = Some(source);
        self
    }

    /// Open the task for a completed order, one PENDING device per assignment
    pub fn create_task(&self, order_key: &str) -> Result<PrefabTask> {
        let tx = self.store.transaction()?;
        let order = store::orders::resolve(&tx, order_key)?
            .ok_or_else(|| ProvisionError::not_found("CompletionOrder", order_key))?;
        let sub = store::subsystems::get(&tx, &order.subsystem_id)?
            .ok_or_else(|| ProvisionError::not_found("Subsystem", order.subsystem_id))?;

        if let Some(existing) = store::prefab::get_task_for_subsystem(&tx, &sub.id)? {
            return Err(ProvisionError::Conflict(format!(
                "subsystem {} already has prefabrication task {}",
                sub.subsystem_number, existing.task_number
            )));
        }
        if order.status != OrderStatus::Completed {
            return Err(ProvisionError::StateViolation(format!(
                "order {} is {}, it must be COMPLETED first",
                order.order_number, order.status
            )));
        }
        lifecycle::require_status(&sub, SubsystemStatus::InPrefabrication, "prefabricate")?;
        let alloc = allocation_of(&tx, &sub.id, &sub.subsystem_number)?;

        let task = PrefabTask::new(format!("PF-{}", sub.subsystem_number), sub.id, order.id);
        store::prefab::insert_task(&tx, &task)?;
        let assignments = store::assignments::list_for_allocation(&tx, &alloc.id)?;
        for assignment in &assignments {
            store::prefab::insert_device(&tx, &PrefabDevice::new(task.id, assignment.id))?;
        }
        tx.commit()?;

        info!(task = %task.task_number, devices = assignments.len(), "prefabrication task created");
        dispatch(
            self.notifier,
            ProvisioningEvent::PrefabricationTaskCreated {
                task_number: task.task_number.clone(),
                subsystem_number: sub.subsystem_number,
                devices: assignments.len(),
            },
        );
        Ok(task)
    }

    /// Task by ID or task number
    pub fn get_task(&self, key: &str) -> Result<PrefabTask> {
        load_task(self.store.conn(), key)
    }

    /// Per-device configuration sheet of a task
    pub fn device_table(&self, task_key: &str) -> Result<Vec<DeviceRow>> {
        let conn = self.store.conn();
        let task = load_task(conn, task_key)?;
        let alloc = allocation_of(conn, &task.subsystem_id, &task.task_number)?;
        store::prefab::device_rows(conn, &task.id, &alloc.id)
    }

    /// Set the serial number and mark the device CONFIGURED
    ///
    /// Reconfiguring a VERIFIED or FAILED device resets it to CONFIGURED.
    pub fn configure_device(
        &self,
        task_key: &str,
        assignment_id: &EntityId,
        serial: &str,
    ) -> Result<PrefabDevice> {
        let tx = self.store.transaction()?;
        let mut task = load_task(&tx, task_key)?;
        require_editable(&task)?;
        let mut device = device_in_task(&tx, &task, assignment_id)?;

        configure_in(&tx, assignment_id, serial, self.operator)?;
        device.status = DeviceStatus::Configured;
        device.note = None;
        device.updated = Utc::now();
        store::prefab::update_device(&tx, &device)?;

        if task.status == TaskStatus::Created {
            task.status = TaskStatus::InProgress;
            task.started_at = Some(device.updated);
            store::prefab::update_task(&tx, &task)?;
        }
        tx.commit()?;

        debug!(task = %task.task_number, assignment = %assignment_id, "prefab device configured");
        Ok(device)
    }

    /// Record a check result: pass → VERIFIED, fail → FAILED with `note`
    pub fn verify_device(
        &self,
        task_key: &str,
        assignment_id: &EntityId,
        passed: bool,
        note: Option<&str>,
    ) -> Result<PrefabDevice> {
        let tx = self.store.transaction()?;
        let task = load_task(&tx, task_key)?;
        require_editable(&task)?;
        let mut device = device_in_task(&tx, &task, assignment_id)?;

        if device.status != DeviceStatus::Configured {
            return Err(ProvisionError::StateViolation(format!(
                "device {} must be CONFIGURED before verification (is {})",
                assignment_id, device.status
            )));
        }

        if passed {
            verify_in(&tx, assignment_id)?;
            device.status = DeviceStatus::Verified;
            device.note = note.map(str::to_string);
        } else {
            device.status = DeviceStatus::Failed;
            device.note = Some(note.unwrap_or("verification failed").to_string());
        }
        device.updated = Utc::now();
        store::prefab::update_device(&tx, &device)?;
        tx.commit()?;

        debug!(task = %task.task_number, assignment = %assignment_id, status = %device.status, "prefab device checked");
        Ok(device)
    }

    /// Close the task once every device is VERIFIED
    pub fn complete_task(&self, task_key: &str) -> Result<PrefabTask> {
        let tx = self.store.transaction()?;
        let mut task = load_task(&tx, task_key)?;
        require_editable(&task)?;
        let alloc = allocation_of(&tx, &task.subsystem_id, &task.task_number)?;

        let rows = store::prefab::device_rows(&tx, &task.id, &alloc.id)?;
        let pending: Vec<&str> = rows
            .iter()
            .filter(|r| r.status != DeviceStatus::Verified)
            .map(|r| r.hostname.as_str())
            .collect();
        if !pending.is_empty() {
            return Err(ProvisionError::StateViolation(format!(
                "{} device(s) not verified: {}",
                pending.len(),
                pending.join(", ")
            )));
        }

        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        store::prefab::update_task(&tx, &task)?;
        let sub = lifecycle::advance(
            &tx,
            &task.subsystem_id,
            SubsystemStatus::InPrefabrication,
            SubsystemStatus::ReadyForDeployment,
        )?;
        tx.commit()?;

        info!(task = %task.task_number, "prefabrication completed");
        dispatch(
            self.notifier,
            ProvisioningEvent::PrefabricationCompleted {
                task_number: task.task_number.clone(),
                subsystem_number: sub.subsystem_number,
            },
        );
        Ok(task)
    }

    /// Render the label of a configured device
    pub fn render_label(&self, task_key: &str, assignment_id: &EntityId) -> Result<String> {
        let conn = self.store.conn();
        let task = load_task(conn, task_key)?;
        let alloc = allocation_of(conn, &task.subsystem_id, &task.task_number)?;
        let row = store::prefab::device_rows(conn, &task.id, &alloc.id)?
            .into_iter()
            .find(|r| r.assignment_id == *assignment_id)
            .ok_or_else(|| ProvisionError::not_found("PrefabDevice", assignment_id))?;

        let serial = match (&row.serial_number, row.status) {
            (Some(serial), DeviceStatus::Configured | DeviceStatus::Verified) => serial.clone(),
            _ => {
                return Err(ProvisionError::StateViolation(format!(
                    "device {} is not configured",
                    row.hostname
                )))
            }
        };

        let sub = store::subsystems::get(conn, &task.subsystem_id)?
            .ok_or_else(|| ProvisionError::not_found("Subsystem", task.subsystem_id))?;
        let contract = store::contracts::get(conn, &sub.contract_id)?
            .ok_or_else(|| ProvisionError::not_found("Contract", sub.contract_id))?;

        let renderer = match self.label_template {
            Some(source) => LabelRenderer::from_source(source)?,
            None => LabelRenderer::embedded()?,
        };
        renderer.render(&LabelData {
            contract_number: contract.contract_number,
            subsystem_number: sub.subsystem_number,
            task_number: task.task_number,
            hostname: row.hostname,
            device_type: row.device_type,
            serial_number: serial,
            ip_address: row.ip_address.to_string(),
            subnet_mask: row.subnet_mask.to_string(),
            gateway: row.gateway.to_string(),
            ntp_server: row.ntp_server.to_string(),
        })
    }
}

fn load_task(conn: &Connection, key: &str) -> Result<PrefabTask> {
    store::prefab::resolve_task(conn, key)?.ok_or_else(|| ProvisionError::not_found("PrefabTask", key))
}

fn allocation_of(conn: &Connection, subsystem_id: &EntityId, label: &str) -> Result<NetworkAllocation> {
    store::allocations::get_for_subsystem(conn, subsystem_id)?
        .ok_or_else(|| ProvisionError::not_found("NetworkAllocation", label))
}

fn require_editable(task: &PrefabTask) -> Result<()> {
    if task.status == TaskStatus::Completed {
        return Err(ProvisionError::StateViolation(format!(
            "task {} is already completed",
            task.task_number
        )));
    }
    Ok(())
}

/// The task's device for an assignment, created if the assignment was added later
fn device_in_task(conn: &Connection, task: &PrefabTask, assignment_id: &EntityId) -> Result<PrefabDevice> {
    if let Some(device) = store::prefab::find_device(conn, &task.id, assignment_id)? {
        return Ok(device);
    }
    let assignment = store::assignments::get(conn, assignment_id)?
        .ok_or_else(|| ProvisionError::not_found("DeviceIpAssignment", assignment_id))?;
    let alloc = allocation_of(conn, &task.subsystem_id, &task.task_number)?;
    if assignment.allocation_id != alloc.id {
        return Err(ProvisionError::not_found(
            "DeviceIpAssignment",
            format!("{} in task {}", assignment_id, task.task_number),
        ));
    }
    let device = PrefabDevice::new(task.id, assignment.id);
    store::prefab::insert_device(conn, &device)?;
    Ok(device)
}
