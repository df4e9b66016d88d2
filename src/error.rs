//! Error types for lfs-fetchd
//!
//! This module provides error handling for the daemon, including:
//! - The crate-wide [`Error`] enum and [`Result`] alias
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for lfs-fetchd operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lfs-fetchd
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "working_dir")
        key: Option<String>,
    },

    /// Request body could not be decoded or is missing required fields
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The pull tool ran but exited with a nonzero status
    #[error("pull tool exited with code {exit_code}")]
    FetchToolFailure {
        /// Exit code reported by the process (-1 when killed by a signal)
        exit_code: i32,
    },

    /// The pull tool could not be started at all
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that was being executed
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Working directory does not exist or is not a directory
    #[error("working directory {0} is not a directory")]
    WorkingDirectory(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new fetches
    #[error("shutdown in progress: not accepting new fetches")]
    ShuttingDown,
}

/// API error response format
///
/// Returned by API endpoints when a request cannot be served.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "malformed_request",
///     "message": "malformed request: resources must not be empty"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "malformed_request")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "malformed request" error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new("malformed_request", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::MalformedRequest(_) => 400,

            // 500 Internal Server Error - Server-side issues
            Error::Config { .. } => 500,
            Error::FetchToolFailure { .. } => 500,
            Error::Spawn { .. } => 500,
            Error::WorkingDirectory(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::MalformedRequest(_) => "malformed_request",
            Error::FetchToolFailure { .. } => "fetch_tool_failure",
            Error::Spawn { .. } => "spawn_failed",
            Error::WorkingDirectory(_) => "working_directory",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::FetchToolFailure { exit_code } => Some(serde_json::json!({
                "exit_code": exit_code,
            })),
            Error::Spawn { program, .. } => Some(serde_json::json!({
                "program": program,
            })),
            Error::WorkingDirectory(path) => Some(serde_json::json!({
                "path": path,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
