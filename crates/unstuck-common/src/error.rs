//! Error types for unstuck.
//!
//! Every error carries:
//! - A stable code for machine parsing
//! - A category for grouping
//! - A short headline and remediation hint for humans
//!
//! Errors serialize to structured JSON through [`StructuredError`]:
//! ```json
//! {
//!   "code": 30,
//!   "category": "cluster",
//!   "message": "namespace \"cert-manager\" not found",
//!   "remediation": "Check the target name and namespace, then retry."
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which part of a run failed. Drives the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad caller input (arguments, flags, missing diagnosis).
    Input,
    Config,
    /// Reading or writing cluster state.
    Cluster,
    /// Executing or verifying a remediation action.
    Action,
    /// Reading reports or config from disk, or decoding them.
    Io,
}

#[derive(Error, Debug)]
pub enum Error {
    // Input errors (10-19)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported target: {0}")]
    UnsupportedTarget(String),

    // Configuration errors (20-29)
    #[error("configuration error: {0}")]
    Config(String),

    // Cluster errors (30-39)
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("cluster request failed: {0}")]
    Cluster(String),

    #[error("failed to resolve resource type for {0}")]
    Resolution(String),

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    // Action errors (40-49)
    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("verification failed: {0}")]
    Verification(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a not-found error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// True when the error reports a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Stable numeric code; the tens digit follows the category
    /// (1x input, 2x config, 3x cluster, 4x action, 6x I/O).
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidInput(_) => 10,
            Error::UnsupportedTarget(_) => 11,
            Error::Config(_) => 20,
            Error::NotFound { .. } => 30,
            Error::Cluster(_) => 31,
            Error::Resolution(_) => 32,
            Error::Timeout { .. } => 33,
            Error::ActionFailed(_) => 40,
            Error::Verification(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidInput(_) | Error::UnsupportedTarget(_) => ErrorCategory::Input,
            Error::Config(_) => ErrorCategory::Config,
            Error::NotFound { .. }
            | Error::Cluster(_)
            | Error::Resolution(_)
            | Error::Timeout { .. } => ErrorCategory::Cluster,
            Error::ActionFailed(_) | Error::Verification(_) => ErrorCategory::Action,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Title-cased label printed before the message in text mode.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "Invalid Input",
            Error::UnsupportedTarget(_) => "Unsupported Target",
            Error::Config(_) => "Configuration Error",
            Error::NotFound { .. } => "Not Found",
            Error::Cluster(_) => "Cluster Request Failed",
            Error::Resolution(_) => "Resource Type Unresolved",
            Error::Timeout { .. } => "Timeout",
            Error::ActionFailed(_) => "Action Failed",
            Error::Verification(_) => "Verification Failed",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }

    /// One-line hint printed after the message.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "Check the command arguments with 'unstuck --help'.",
            Error::UnsupportedTarget(_) => {
                "This operation only applies to namespaces. Re-run against a namespace target."
            }
            Error::Config(_) => "Fix the configuration file or remove it to use defaults.",
            Error::NotFound { .. } => "Check the target name and namespace, then retry.",
            Error::Cluster(_) => {
                "Check cluster connectivity, kubeconfig/context, and RBAC permissions."
            }
            Error::Resolution(_) => {
                "The resource type could not be mapped to an API resource. Check the kind and apiVersion."
            }
            Error::Timeout { .. } => "Retry with a larger '--timeout'.",
            Error::ActionFailed(_) => {
                "Inspect the error. Admission webhooks and RBAC are the usual causes."
            }
            Error::Verification(_) => "Re-run 'unstuck diagnose' to see the current state.",
            Error::Io(_) => "Check file paths and permissions, then retry.",
            Error::Json(_) => "Check the file contents with 'jq .' or regenerate it.",
        }
    }
}

/// Error body printed on stdout in json/yaml mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: u32,

    pub category: ErrorCategory,

    pub message: String,

    /// What the operator can do about it.
    pub remediation: String,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            remediation: err.remediation().to_string(),
        }
    }
}

impl StructuredError {
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
