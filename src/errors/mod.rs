//! Error handling module for the notification feed backend.
//!
//! Provides the store-level error types and their mapping to HTTP status codes and response envelopes.

use std::fmt;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const REMOTE_WRITE_ERROR: &str = "REMOTE_WRITE_ERROR";
    pub const REMOTE_WRITE_TIMEOUT: &str = "REMOTE_WRITE_TIMEOUT";
    pub const INVALID_PATH: &str = "INVALID_PATH";
    pub const SUBSCRIPTION_ERROR: &str = "SUBSCRIPTION_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// A write against the notification store was rejected, timed out, or never reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWriteError {
    /// The store refused the write
    Rejected(String),
    /// A path or id that the store cannot address
    InvalidPath(String),
    /// No acknowledgment within the configured bound
    Timeout(Duration),
    /// The store is closed or unreachable
    Unavailable,
}

impl fmt::Display for RemoteWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteWriteError::Rejected(msg) => write!(f, "write rejected: {}", msg),
            RemoteWriteError::InvalidPath(msg) => write!(f, "invalid path: {}", msg),
            RemoteWriteError::Timeout(after) => {
                write!(f, "write not acknowledged after {} ms", after.as_millis())
            }
            RemoteWriteError::Unavailable => write!(f, "store unavailable"),
        }
    }
}

impl std::error::Error for RemoteWriteError {}

impl From<sqlx::Error> for RemoteWriteError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Store write failed: {:?}", err);
        match err {
            sqlx::Error::PoolClosed => RemoteWriteError::Unavailable,
            other => RemoteWriteError::Rejected(other.to_string()),
        }
    }
}

/// The store could not establish a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    Rejected(String),
    InvalidPath(String),
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::Rejected(msg) => write!(f, "subscription rejected: {}", msg),
            SubscriptionError::InvalidPath(msg) => write!(f, "invalid path: {}", msg),
        }
    }
}

impl std::error::Error for SubscriptionError {}

impl From<sqlx::Error> for SubscriptionError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Store read failed: {:?}", err);
        SubscriptionError::Rejected(err.to_string())
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// A store write failed
    RemoteWrite(RemoteWriteError),
    /// The feed subscription could not be established
    Subscription(SubscriptionError),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RemoteWrite(RemoteWriteError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            AppError::RemoteWrite(RemoteWriteError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::RemoteWrite(_) => StatusCode::BAD_GATEWAY,
            AppError::Subscription(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::RemoteWrite(RemoteWriteError::InvalidPath(_)) => codes::INVALID_PATH,
            AppError::RemoteWrite(RemoteWriteError::Timeout(_)) => codes::REMOTE_WRITE_TIMEOUT,
            AppError::RemoteWrite(_) => codes::REMOTE_WRITE_ERROR,
            AppError::Subscription(_) => codes::SUBSCRIPTION_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::RemoteWrite(err) => err.to_string(),
            AppError::Subscription(err) => err.to_string(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<RemoteWriteError> for AppError {
    fn from(err: RemoteWriteError) -> Self {
        AppError::RemoteWrite(err)
    }
}

impl From<SubscriptionError> for AppError {
    fn from(err: SubscriptionError) -> Self {
        AppError::Subscription(err)
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub revision_id: i64,
}

impl ErrorResponse {
    pub fn new(error: &AppError, revision_id: i64) -> Self {
        let details = match error {
            AppError::RemoteWrite(RemoteWriteError::Timeout(after)) => {
                Some(serde_json::json!({ "timeoutMs": after.as_millis() as u64 }))
            }
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
            revision_id,
        }
    }
}

/// Wrapper type for errors that carry revision_id context.
pub struct AppErrorWithRevision {
    pub error: AppError,
    pub revision_id: i64,
}

impl IntoResponse for AppErrorWithRevision {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorResponse::new(&self.error, self.revision_id);
        (status, Json(body)).into_response()
    }
}
