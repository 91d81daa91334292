//! Service-level error taxonomy.
//!
//! Errors are classified by what the caller can do about them:
//! - NotConfigured: missing credentials or paths, fix the deployment
//! - InvalidInput: reject the request, nothing to retry
//! - NotFound: the referenced lead/conversation does not exist
//! - Storage / Upstream / InvalidResponse: operational failures
//!
//! Transport status codes are derived only at the HTTP boundary via
//! [`AppError::status_code`]; everything below that speaks this enum.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The upstream responded 2xx but the body was not the JSON we asked
    /// for. Carries the raw text so the caller can inspect it.
    #[error("Invalid upstream response: {message}")]
    InvalidResponse { message: String, raw: String },
}

impl AppError {
    /// HTTP status code for this error. Used only at the transport boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidInput(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::NotConfigured(_)
            | AppError::Storage(_)
            | AppError::Upstream { .. }
            | AppError::InvalidResponse { .. } => 500,
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        AppError::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}
