//! Error handling for the API server
//!
//! Every handler returns `ApiResult<T>`; `ApiError` renders as a JSON body of
//! the form `{"error": code, "message": msg, "details"?: [...]}` with the
//! matching status code.
//!
//! # Example
//!
//! ```no_run
//! use axum::{extract::State, Json};
//! use taskdesk_api::{app::AppState, error::ApiResult};
//! use taskdesk_shared::models::Tag;
//!
//! async fn handler(State(state): State<AppState>) -> ApiResult<Json<Vec<Tag>>> {
//!     Ok(Json(state.tags.list_tags().await?))
//! }
//! ```

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use taskdesk_shared::services::ServiceError;
use thiserror::Error;
use validator::ValidationErrors;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing acting user
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Acting user does not own the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate username, email or tag name
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid argument (400); field failures are rendered as `details`
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        details: Vec<ValidationErrorDetail>,
    },

    /// Logged in full; clients only see a generic message
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code placed in the `error` field
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::InvalidArgument { .. } => "invalid_argument",
            ApiError::InternalError(_) => "internal_error",
        }
    }
}

/// One failed field of a request payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.error_code().to_string();

        let body = match self {
            ApiError::InvalidArgument { message, details } => ErrorResponse {
                error,
                message,
                details: (!details.is_empty()).then_some(details),
            },
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ErrorResponse {
                    error,
                    message: "An internal error occurred".to_string(),
                    details: None,
                }
            }
            ApiError::BadRequest(message)
            | ApiError::Unauthorized(message)
            | ApiError::Forbidden(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message) => ErrorResponse {
                error,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::InvalidArgument { message, fields } => ApiError::InvalidArgument {
                message,
                details: fields.as_ref().map(validation_details).unwrap_or_default(),
            },
            ServiceError::PermissionDenied(msg) => ApiError::Forbidden(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Flattens `validator` field errors into response details, sorted by field
pub fn validation_details(errors: &ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::ValidationError;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("task 7 not found".to_string());
        assert_eq!(err.to_string(), "Not found: task 7 not found");
    }

    #[test]
    fn test_service_error_status_codes() {
        let cases = [
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ServiceError::InvalidArgument {
                    message: "x".into(),
                    fields: None,
                },
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::PermissionDenied("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_validation_details() {
        let mut errors = ValidationErrors::new();
        errors.add(
            "title",
            ValidationError::new("length").with_message("Title must be 1-200 characters".into()),
        );
        errors.add("color", ValidationError::new("color"));

        let err = ApiError::from(ServiceError::from(errors));
        let ApiError::InvalidArgument { details, .. } = &err else {
            panic!("expected invalid argument, got {err:?}");
        };
        assert_eq!(err.to_string(), "Invalid argument: Request validation failed");
        assert_eq!(details[0].field, "color");
        assert_eq!(details[0].message, "Validation failed");
        assert_eq!(details[1].message, "Title must be 1-200 characters");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_plain_invalid_argument_has_no_details() {
        let err = ApiError::from(ServiceError::InvalidArgument {
            message: "bad due_date".into(),
            fields: None,
        });
        assert!(matches!(&err, ApiError::InvalidArgument { details, .. } if details.is_empty()));
        assert_eq!(err.error_code(), "invalid_argument");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
