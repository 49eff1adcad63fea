//! Service error taxonomy

use crate::auth::password::PasswordError;
use crate::store::StoreError;
use thiserror::Error;
use validator::ValidationErrors;

/// Result alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the services
///
/// Cache failures never appear here; they are logged where they happen.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    /// Malformed request argument; `fields` holds per-field failures when
    /// the payload failed validation
    #[error("{message}")]
    InvalidArgument {
        message: String,
        fields: Option<ValidationErrors>,
    },

    #[error("{0}")]
    PermissionDenied(String),

    /// Duplicate username, email or tag name
    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: &str, id: i64) -> Self {
        ServiceError::NotFound(format!("{what} {id} not found"))
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::InvalidArgument {
            message: "Request validation failed".to_string(),
            fields: Some(errors),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RowNotFound => ServiceError::NotFound("Record not found".to_string()),
            StoreError::UniqueViolation(index) => ServiceError::Conflict(conflict_message(&index)),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

fn conflict_message(index: &str) -> String {
    if index.contains("username") {
        "Username already exists".to_string()
    } else if index.contains("email") {
        "Email already exists".to_string()
    } else if index.contains("tags_name") {
        "Tag name already exists".to_string()
    } else {
        format!("Duplicate value violates {index}")
    }
}
