//! Custom error types for the common library
//!
//! This module defines the storage error taxonomy shared by every service
//! that talks to PostgreSQL.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// SQLSTATE raised by PostgreSQL on a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred while acquiring a connection or opening a transaction
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// The operation did not finish within its time budget
    #[error("Database operation `{operation}` timed out")]
    Timeout {
        /// Name of the operation that was abandoned
        operation: &'static str,
    },

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Name of the violated unique constraint, if this error is one.
    pub fn unique_violation(&self) -> Option<&str> {
        let DatabaseError::Query(SqlxError::Database(db_err)) = self else {
            return None;
        };

        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            Some(db_err.constraint().unwrap_or_default())
        } else {
            None
        }
    }

    /// Whether the error came from the time budget rather than the driver.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DatabaseError::Timeout { .. })
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
