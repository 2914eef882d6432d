// Error handling module for the bookings core
// Provides the domain error taxonomy and its HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Main error type for every booking, recurrence, group and waitlist operation
///
/// Each variant maps to one class of failure the caller can react to.
/// Secondary side effects never produce one of these for the caller; they are
/// logged by the post-commit runner instead.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Referenced entity does not exist
    #[error("{resource} with id {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// Actor is not the party required for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested transition is not legal from the current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Capacity exceeded or duplicate membership
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input or an expired offer
    #[error("Validation error: {0}")]
    Validation(String),

    /// No acting user could be identified for the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Machine-readable code used in the JSON error envelope
    pub fn error_code(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::Forbidden(_) => "FORBIDDEN",
            DomainError::InvalidState(_) => "INVALID_STATE",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::Unauthenticated(_) => "UNAUTHENTICATED",
            DomainError::Database(_) => "DATABASE_ERROR",
            DomainError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::InvalidState(_) => StatusCode::CONFLICT,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            DomainError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert the error into a status code and the client-facing envelope
    ///
    /// Expected client errors are logged at debug, suspicious ones at warn,
    /// and infrastructure failures at error with their details withheld from
    /// the response body.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        let message = match self {
            DomainError::NotFound { .. } | DomainError::Validation(_) | DomainError::InvalidState(_) => {
                debug!("{}", self);
                self.to_string()
            }
            DomainError::Forbidden(_) | DomainError::Conflict(_) | DomainError::Unauthenticated(_) => {
                warn!("{}", self);
                self.to_string()
            }
            DomainError::Database(db_error) => {
                error!("Database error: {:?}", db_error);
                "A database error occurred".to_string()
            }
            DomainError::Internal(internal_msg) => {
                error!("Internal error: {}", internal_msg);
                "An internal server error occurred".to_string()
            }
        };

        (
            self.status_code(),
            ErrorResponse {
                error_code: self.error_code().to_string(),
                message,
                details: None,
                timestamp: Utc::now().to_rfc3339(),
            },
        )
    }
}

/// Consistent error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "CONFLICT", "NOT_FOUND")
    pub error_code: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// ISO 8601 timestamp of when the error occurred
    pub timestamp: String,
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let (status, mut body) = self.to_error_response();
        if let DomainError::Validation(ref detail) = self {
            body.details = Some(serde_json::json!({ "reason": detail }));
        }
        (status, Json(body)).into_response()
    }
}

/// Convert validator errors to DomainError
impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::Validation(errors.to_string())
    }
}
