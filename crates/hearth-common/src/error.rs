//! Centralized error types for Hearth.
//!
//! Uses `thiserror` for ergonomic error definitions and provides HTTP-friendly
//! error variants that can be directly converted to API responses.
//!
//! Authorization failures are never collapsed into one another: "you lack a
//! permission" (403), "you are not in this server" (403) and "this server's data
//! is broken" (400) each keep their own variant and error code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::permissions::Permission;

/// Core application error type used across all Hearth services.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    // === Auth errors ===
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid token")]
    InvalidToken,

    // === Authorization errors ===
    #[error("You are not a member of this server")]
    NotAMember,

    #[error("Missing permission: {permission}")]
    PermissionDenied { permission: Permission },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Server configuration error: {reason}")]
    ServerMisconfigured { server_id: Uuid, reason: String },

    // === Resource errors ===
    #[error("Channel not found")]
    ChannelNotFound,

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{message}")]
    Conflict { message: String },

    // === Request errors ===
    #[error("{message}")]
    BadRequest { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Limit reached: {message}")]
    LimitReached { message: String },

    // === Infrastructure errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
}

impl HearthError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::NotAMember | Self::PermissionDenied { .. } | Self::Forbidden { .. } => {
                StatusCode::FORBIDDEN
            }
            Self::LimitReached { .. } => StatusCode::FORBIDDEN,
            Self::ChannelNotFound | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ServerMisconfigured { .. }
            | Self::BadRequest { .. }
            | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NotAMember => "NOT_A_MEMBER",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::ServerMisconfigured { .. } => "SERVER_MISCONFIGURED",
            Self::ChannelNotFound => "CHANNEL_NOT_FOUND",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::LimitReached { .. } => "LIMIT_REACHED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for HearthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match &self {
            HearthError::Database(e) => {
                tracing::error!("Database error: {e}");
                "An internal error occurred".to_string()
            }
            HearthError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.error_code().to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using HearthError.
pub type HearthResult<T> = Result<T, HearthError>;
