//! Custom error types for the common library
//!
//! This module defines the storage error type shared by every crate that
//! talks to PostgreSQL.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// A unique index rejected the write
    #[error("Unique constraint violated: {}", constraint.as_deref().unwrap_or("<unnamed>"))]
    UniqueViolation {
        /// Name of the violated constraint, when the server reports one
        constraint: Option<String>,
    },

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Classify a query failure, singling out unique-index violations so
    /// callers can report them as domain conflicts.
    pub fn from_query(err: SqlxError) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return DatabaseError::UniqueViolation {
                    constraint: db_err.constraint().map(str::to_string),
                };
            }
        }
        DatabaseError::Query(err)
    }

    /// Constraint name of a unique violation, if this is one
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            DatabaseError::UniqueViolation { constraint } => constraint.as_deref(),
            _ => None,
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_stay_query_errors() {
        let err = DatabaseError::from_query(SqlxError::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
        assert_eq!(err.violated_constraint(), None);
    }

    #[test]
    fn unique_violation_reports_constraint() {
        let err = DatabaseError::UniqueViolation {
            constraint: Some("users_username_key".to_string()),
        };
        assert_eq!(err.violated_constraint(), Some("users_username_key"));
        assert_eq!(
            err.to_string(),
            "Unique constraint violated: users_username_key"
        );
    }
}
