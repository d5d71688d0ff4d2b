//! Error types for the CRUD engine.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for engine operations
pub type CrudResult<T> = Result<T, CrudError>;

/// Everything an engine call can fail with.
#[derive(Debug, Error)]
pub enum CrudError {
    // ==================
    // Identifier Errors
    // ==================
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    // ==================
    // Input Errors
    // ==================
    #[error("Invalid input: {0}")]
    Validation(String),

    // ==================
    // Business Rule Errors
    // ==================
    #[error("{table} {key} = {id} is out of stock")]
    OutOfStock { table: String, key: String, id: String },

    #[error("No {table} row with {key} = {id}")]
    UnknownReference { table: String, key: String, id: String },

    #[error("Record not found in '{table}' where {column} = {value}")]
    RecordNotFound {
        table: String,
        column: String,
        value: String,
    },

    // ==================
    // Store Errors
    // ==================
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database is busy: {0}")]
    Busy(String),

    #[error("Database unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Store(#[source] rusqlite::Error),
}

impl CrudError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CrudError::UnknownTable(_)
            | CrudError::UnknownColumn { .. }
            | CrudError::Validation(_)
            | CrudError::OutOfStock { .. }
            | CrudError::UnknownReference { .. }
            | CrudError::ConstraintViolation(_) => 400,
            CrudError::RecordNotFound { .. } => 404,
            CrudError::Busy(_) | CrudError::StoreUnavailable(_) => 503,
            CrudError::Store(_) => 500,
        }
    }

    /// True when the caller sent something the engine refused before or
    /// during execution, as opposed to a store-side fault.
    pub fn is_rejection(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<rusqlite::Error> for CrudError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => failure.code,
            _ => return CrudError::Store(err),
        };
        match code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => CrudError::Busy(err.to_string()),
            ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch => {
                CrudError::ConstraintViolation(err.to_string())
            }
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::PermissionDenied
            | ErrorCode::AuthorizationForStatementDenied => {
                CrudError::StoreUnavailable(err.to_string())
            }
            _ => CrudError::Store(err),
        }
    }
}
