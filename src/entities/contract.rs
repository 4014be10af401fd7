//! Contract entity - the commercial order that owns subsystems

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// A commercial order; the contract number is immutable once assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: EntityId,

    /// Globally unique contract number (e.g. "C-2024-017")
    pub contract_number: String,

    pub name: String,

    /// Responsible project manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_manager: Option<String>,

    pub created: DateTime<Utc>,
}

impl Contract {
    pub fn new(contract_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Ctr),
            contract_number: contract_number.into(),
            name: name.into(),
            project_manager: None,
            created: Utc::now(),
        }
    }
}
