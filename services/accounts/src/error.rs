//! Error types for the accounts service

use common::error::DatabaseError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Custom error type for account operations
///
/// Permission denials and credential mismatches are not errors: they are
/// reported as `false` or an empty set by the authorization and credential
/// APIs.
#[derive(Error, Debug)]
pub enum AccountsError {
    /// A field constraint was violated
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A lookup by key found nothing
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// A unique constraint rejected the record
    #[error("Duplicate {field}: {value}")]
    UniquenessViolation { field: &'static str, value: String },

    /// The password hasher failed to produce a hash
    #[error("Password hashing error: {0}")]
    Hashing(String),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The mail collaborator failed
    #[error("Mail error: {0}")]
    Mail(String),

    /// The storage collaborator failed
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl AccountsError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        AccountsError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn duplicate(field: &'static str, value: impl Into<String>) -> Self {
        AccountsError::UniquenessViolation {
            field,
            value: value.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccountsError::NotFound { .. })
    }
}

impl From<config::ConfigError> for AccountsError {
    fn from(err: config::ConfigError) -> Self {
        AccountsError::Configuration(err.to_string())
    }
}

/// Type alias for Result with AccountsError
pub type AccountsResult<T> = Result<T, AccountsError>;
