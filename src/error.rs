//! Error types for Frontdesk server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing authorization header")]
    MissingToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Insufficient permissions: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Visitor {0} not found")]
    VisitorNotFound(i64),

    #[error("Visitor {0} is already checked out")]
    AlreadyCheckedOut(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for programmatic handling by frontends
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::MissingToken => "AUTH_REQUIRED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::AccountDisabled => "ACCOUNT_DISABLED",
            AppError::Authorization(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::VisitorNotFound(_) => "VISITOR_NOT_FOUND",
            AppError::AlreadyCheckedOut(_) => "ALREADY_CHECKED_OUT",
            AppError::Database(e) if is_unavailable(e) => "STORAGE_UNAVAILABLE",
            AppError::Database(_) => "STORAGE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut parts: Vec<String> = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                match &error.message {
                    Some(message) => parts.push(message.to_string()),
                    None => parts.push(format!("{} is invalid", field)),
                }
            }
        }
        // Field iteration order is unspecified; sort for a stable message
        parts.sort();
        AppError::Validation(parts.join("; "))
    }
}

/// The pool being gone is reported as 503, distinct from a failed query
fn is_unavailable(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MissingToken | AppError::TokenExpired | AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::AccountDisabled => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::VisitorNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::AlreadyCheckedOut(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                if is_unavailable(e) {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Database unavailable".to_string(),
                    )
                } else {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Database error".to_string(),
                    )
                }
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AppError::InvalidCredentials.code(), "INVALID_CREDENTIALS");
        assert_eq!(AppError::AccountDisabled.code(), "ACCOUNT_DISABLED");
        assert_eq!(AppError::VisitorNotFound(7).code(), "VISITOR_NOT_FOUND");
        assert_eq!(AppError::AlreadyCheckedOut(7).code(), "ALREADY_CHECKED_OUT");
        assert_eq!(
            AppError::Validation("x".into()).code(),
            "VALIDATION_ERROR"
        );
    }

    #[test]
    fn pool_loss_maps_to_storage_unavailable() {
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut).code(),
            "STORAGE_UNAVAILABLE"
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).code(),
            "STORAGE_ERROR"
        );
    }
}
