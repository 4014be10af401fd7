//! Error taxonomy shared by all provisioning engines

use miette::Diagnostic;
use thiserror::Error;

use crate::core::cidr::CidrError;

/// Coarse classification used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    StateViolation,
    Capacity,
    Internal,
}

/// Errors raised by the provisioning core
#[derive(Debug, Error, Diagnostic)]
pub enum ProvisionError {
    #[error("{entity} not found: {key}")]
    #[diagnostic(code(sysprov::not_found))]
    NotFound { entity: &'static str, key: String },

    #[error("Conflict: {0}")]
    #[diagnostic(code(sysprov::conflict))]
    Conflict(String),

    #[error("Invalid input: {0}")]
    #[diagnostic(code(sysprov::validation))]
    Validation(String),

    #[error("Not allowed in current state: {0}")]
    #[diagnostic(code(sysprov::state))]
    StateViolation(String),

    #[error("Capacity exhausted: {0}")]
    #[diagnostic(
        code(sysprov::capacity),
        help("add or enable another network pool, or widen the exhausted range")
    )]
    Capacity(String),

    #[error("Database error: {0}")]
    #[diagnostic(code(sysprov::database))]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(sysprov::io))]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    #[diagnostic(code(sysprov::validation))]
    Cidr(#[from] CidrError),

    #[error("Template error: {0}")]
    #[diagnostic(code(sysprov::template))]
    Template(#[from] tera::Error),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(sysprov::config))]
    Config(String),
}

impl ProvisionError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        ProvisionError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::NotFound { .. } => ErrorKind::NotFound,
            ProvisionError::Conflict(_) => ErrorKind::Conflict,
            ProvisionError::Validation(_) | ProvisionError::Cidr(_) => ErrorKind::Validation,
            ProvisionError::StateViolation(_) => ErrorKind::StateViolation,
            ProvisionError::Capacity(_) => ErrorKind::Capacity,
            ProvisionError::Database(_)
            | ProvisionError::Io(_)
            | ProvisionError::Template(_)
            | ProvisionError::Config(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-equivalent status for callers that expose the core over HTTP
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict | ErrorKind::StateViolation => 409,
            ErrorKind::Validation => 400,
            ErrorKind::Capacity => 507,
            ErrorKind::Internal => 500,
        }
    }

    /// Map a SQLite UNIQUE/PRIMARY KEY violation to a conflict, pass anything else through
    pub(crate) fn from_insert(err: rusqlite::Error, what: impl FnOnce() -> String) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && matches!(
                        e.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
            {
                ProvisionError::Conflict(what())
            }
            _ => ProvisionError::Database(err),
        }
    }
}

pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ProvisionError::not_found("Subsystem", "SUB-1").http_status(), 404);
        assert_eq!(ProvisionError::Conflict("x".into()).http_status(), 409);
        assert_eq!(ProvisionError::Validation("x".into()).http_status(), 400);
        assert_eq!(ProvisionError::StateViolation("x".into()).http_status(), 409);
        assert_eq!(ProvisionError::Capacity("x".into()).http_status(), 507);
    }

    #[test]
    fn test_bad_cidr_is_validation() {
        let err: ProvisionError = "10.0.0.7/24"
            .parse::<crate::core::cidr::Ipv4Cidr>()
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.http_status(), 400);
        assert!(err.to_string().starts_with("Invalid input:"), "{}", err);
    }

    #[test]
    fn test_not_found_message() {
        let err = ProvisionError::not_found("Contract", "C-100");
        assert_eq!(err.to_string(), "Contract not found: C-100");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err();
        let mapped = ProvisionError::from_insert(err, || "duplicate key a".to_string());
        assert_eq!(mapped.kind(), ErrorKind::Conflict);
    }
}
