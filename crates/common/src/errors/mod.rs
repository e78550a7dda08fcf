//! Error types for PaperShelf services
//!
//! Provides the domain error taxonomy with:
//! - One variant per failure kind a caller can observe
//! - HTTP status code mapping
//! - Structured error responses
//! - Translation of backend faults into domain errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, RuntimeErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request errors (1xxx)
    ValidationError,
    InvalidIdentifier,
    InvalidFilter,

    // Resource errors (4xxx)
    NotFound,

    // Store errors (7xxx)
    ConstraintViolation,
    StoreUnavailable,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidIdentifier => 1002,
            ErrorCode::InvalidFilter => 1003,

            ErrorCode::NotFound => 4001,

            ErrorCode::ConstraintViolation => 7001,
            ErrorCode::StoreUnavailable => 7002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// One or more field-level findings; nothing was persisted.
    #[error("Validation Error")]
    Validation { messages: Vec<String> },

    #[error("Invalid ID format")]
    InvalidIdentifier { raw: String },

    #[error("Paper not found")]
    NotFound { id: i64 },

    #[error("Invalid query parameter format: {message}")]
    InvalidFilter { message: String },

    /// The backend rejected a row that pre-validation should have caught.
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::InvalidFilter { .. } => ErrorCode::InvalidFilter,
            AppError::ConstraintViolation { .. } => ErrorCode::ConstraintViolation,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidIdentifier { .. }
            | AppError::InvalidFilter { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 422 Unprocessable Entity
            AppError::ConstraintViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 503 Service Unavailable
            AppError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            AppError::Configuration { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Field-level messages carried by a validation failure
    pub fn messages(&self) -> Option<&[String]> {
        match self {
            AppError::Validation { messages } => Some(messages),
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let messages = match self {
            AppError::Validation { messages } => Some(messages),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                messages,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        let message = err.to_string();

        if is_constraint_violation(&err) {
            return AppError::ConstraintViolation { message };
        }

        match err {
            // The backend answered but the row could not be mapped
            DbErr::Type(_)
            | DbErr::Json(_)
            | DbErr::AttrNotSet(_)
            | DbErr::UnpackInsertId
            | DbErr::RecordNotInserted
            | DbErr::Custom(_) => AppError::Internal { message },
            _ => AppError::StoreUnavailable { message },
        }
    }
}

/// Whether the backend refused the statement because of a declared constraint
fn is_constraint_violation(err: &DbErr) -> bool {
    use sqlx::error::ErrorKind;

    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) => runtime,
        _ => return false,
    };

    let RuntimeErr::SqlxError(sqlx_err) = runtime else {
        return false;
    };

    match sqlx_err.as_database_error().map(|db_err| db_err.kind()) {
        Some(ErrorKind::CheckViolation)
        | Some(ErrorKind::NotNullViolation)
        | Some(ErrorKind::UniqueViolation) => true,
        _ => false,
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
