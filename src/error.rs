//! Error types for daybook
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, invalid profile name)
//! - 4: Operation failed (storage, remote, export)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the daybook CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for daybook operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid profile name '{name}': {reason}")]
    InvalidProfileName { name: String, reason: String },

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Cannot {action} a task that is {from}")]
    InvalidTransition { from: String, action: String },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Remote lookup failed: {0}")]
    Remote(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::InvalidProfileName { .. }
            | Error::InvalidDate(_)
            | Error::TaskNotFound(_)
            | Error::ProfileNotFound(_)
            | Error::InvalidTransition { .. } => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::Remote(_)
            | Error::Export(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::InvalidProfileName { name, reason } => Some(serde_json::json!({
                "name": name,
                "reason": reason,
            })),
            Error::InvalidTransition { from, action } => Some(serde_json::json!({
                "from": from,
                "action": action,
            })),
            Error::TaskNotFound(id) => Some(serde_json::json!({ "id": id })),
            Error::ProfileNotFound(name) => Some(serde_json::json!({ "profile": name })),
            Error::InvalidConfig(message) => Some(serde_json::json!({ "message": message })),
            Error::LockFailed(path) => Some(serde_json::json!({
                "path": path.to_string_lossy(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for daybook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
