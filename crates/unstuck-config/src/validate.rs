//! Configuration validation errors and semantic validation.

use thiserror::Error;
use unstuck_common::EscalationLevel;

use crate::settings::UnstuckConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
        }
    }
}

/// Validate the effective configuration (file values plus CLI overrides).
pub fn validate_config(config: &UnstuckConfig) -> ValidationResult<()> {
    let level = EscalationLevel::from_u8(config.plan.max_escalation).ok_or_else(|| {
        ValidationError::InvalidValue {
            field: "plan.max_escalation".to_string(),
            message: "max-escalation must be between 0 and 4".to_string(),
        }
    })?;

    if level.requires_force() && !config.plan.allow_force {
        return Err(ValidationError::SemanticError(format!(
            "--allow-force is required for escalation level {} or higher",
            EscalationLevel::Crd.as_u8()
        )));
    }

    validate_timeout("cluster.request_timeout", config.cluster.request_timeout)?;
    validate_timeout("cluster.overall_timeout", config.cluster.overall_timeout)?;

    if config.cluster.kubectl.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "cluster.kubectl".to_string(),
            message: "Must not be empty".to_string(),
        });
    }

    if let Some(format) = config.logging.format.as_deref() {
        if !matches!(format, "human" | "jsonl") {
            return Err(ValidationError::InvalidValue {
                field: "logging.format".to_string(),
                message: format!("Must be 'human' or 'jsonl', got '{}'", format),
            });
        }
    }

    Ok(())
}

fn validate_timeout(field: &str, seconds: u64) -> ValidationResult<()> {
    if seconds == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: "Must be positive".to_string(),
        });
    }
    Ok(())
}
