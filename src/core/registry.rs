//! Contracts and subsystems: creation, lookup, cancellation and deployment

use tracing::info;

use crate::core::error::{ProvisionError, Result};
use crate::core::lifecycle;
use crate::core::store::subsystems::SubsystemFilter;
use crate::core::store::{self, Store};
use crate::entities::{AssignmentStatus, Contract, Subsystem, SubsystemStatus};

/// Input for [`Registry::create_subsystem`]
#[derive(Debug, Clone)]
pub struct NewSubsystem {
    pub contract: String,
    pub subsystem_number: String,
    pub name: String,
    pub system_type: String,
    pub quantity: u32,
}

pub struct Registry<'a> {
    store: &'a Store,
}

impl<'a> Registry<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create_contract(
        &self,
        contract_number: &str,
        name: &str,
        project_manager: Option<&str>,
    ) -> Result<Contract> {
        let number = contract_number.trim();
        if number.is_empty() {
            return Err(ProvisionError::Validation("contract number is empty".into()));
        }
        let mut contract = Contract::new(number, name.trim());
        contract.project_manager = project_manager.map(str::to_string);

        let tx = self.store.transaction()?;
        store::contracts::insert(&tx, &contract)?;
        tx.commit()?;

        info!(contract = %contract.contract_number, "contract created");
        Ok(contract)
    }

    pub fn get_contract(&self, key: &str) -> Result<Contract> {
        store::contracts::resolve(self.store.conn(), key)?
            .ok_or_else(|| ProvisionError::not_found("Contract", key))
    }

    pub fn list_contracts(&self) -> Result<Vec<Contract>> {
        store::contracts::list(self.store.conn())
    }

    pub fn create_subsystem(&self, input: &NewSubsystem) -> Result<Subsystem> {
        if input.quantity < 1 {
            return Err(ProvisionError::Validation(
                "subsystem quantity must be at least 1".into(),
            ));
        }
        let number = input.subsystem_number.trim();
        if number.is_empty() {
            return Err(ProvisionError::Validation("subsystem number is empty".into()));
        }
        let system_type = input.system_type.trim().to_lowercase();
        if system_type.is_empty() {
            return Err(ProvisionError::Validation("system type is empty".into()));
        }

        let tx = self.store.transaction()?;
        let contract = store::contracts::resolve(&tx, &input.contract)?
            .ok_or_else(|| ProvisionError::not_found("Contract", &input.contract))?;
        let subsystem = Subsystem::new(
            contract.id,
            number,
            input.name.trim(),
            system_type,
            input.quantity,
        );
        store::subsystems::insert(&tx, &subsystem)?;
        tx.commit()?;

        info!(
            subsystem = %subsystem.subsystem_number,
            contract = %contract.contract_number,
            "subsystem created"
        );
        Ok(subsystem)
    }

    pub fn get_subsystem(&self, key: &str) -> Result<Subsystem> {
        store::subsystems::resolve(self.store.conn(), key)?
            .ok_or_else(|| ProvisionError::not_found("Subsystem", key))
    }

    /// List subsystems; `contract` may be an ID or contract number
    pub fn list_subsystems(
        &self,
        contract: Option<&str>,
        status: Option<SubsystemStatus>,
    ) -> Result<Vec<Subsystem>> {
        let contract_id = match contract {
            Some(key) => Some(self.get_contract(key)?.id),
            None => None,
        };
        let filter = SubsystemFilter {
            contract_id,
            status,
            system_type: None,
        };
        store::subsystems::list(self.store.conn(), &filter)
    }

    /// CREATED → CANCELLED
    pub fn cancel_subsystem(&self, key: &str) -> Result<Subsystem> {
        let tx = self.store.transaction()?;
        let subsystem = store::subsystems::resolve(&tx, key)?
            .ok_or_else(|| ProvisionError::not_found("Subsystem", key))?;
        lifecycle::require_status(&subsystem, SubsystemStatus::Created, "cancel")?;
        let subsystem = lifecycle::advance(
            &tx,
            &subsystem.id,
            SubsystemStatus::Created,
            SubsystemStatus::Cancelled,
        )?;
        tx.commit()?;
        Ok(subsystem)
    }

    /// READY_FOR_DEPLOYMENT → DEPLOYED, marking every device assignment deployed
    pub fn mark_deployed(&self, key: &str) -> Result<Subsystem> {
        let tx = self.store.transaction()?;
        let subsystem = store::subsystems::resolve(&tx, key)?
            .ok_or_else(|| ProvisionError::not_found("Subsystem", key))?;
        lifecycle::require_status(&subsystem, SubsystemStatus::ReadyForDeployment, "deploy")?;

        if let Some(alloc) = store::allocations::get_for_subsystem(&tx, &subsystem.id)? {
            store::assignments::set_status_for_allocation(&tx, &alloc.id, AssignmentStatus::Deployed)?;
        }
        let subsystem = lifecycle::advance(
            &tx,
            &subsystem.id,
            SubsystemStatus::ReadyForDeployment,
            SubsystemStatus::Deployed,
        )?;
        tx.commit()?;
        Ok(subsystem)
    }
}
