//! Shared types for unstuck.
//!
//! This crate holds the data model that flows between the detectors, the
//! planner, and the applier:
//! - Resource references and blockers
//! - Diagnosis reports
//! - Escalation and risk levels
//! - Actions, plans, and apply results
//! - The unified error type

pub mod action;
pub mod diagnosis;
pub mod error;
pub mod escalation;
pub mod output;
pub mod resource;

pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, StateSnapshot};
pub use diagnosis::{
    format_duration, ConditionSummary, ControllerStatus, DiagnosisReport, DiscoveryFailure,
    TargetType, WebhookInfo,
};
pub use error::{Error, ErrorCategory, Result};
pub use escalation::{EscalationLevel, RiskLevel};
pub use output::OutputFormat;
pub use resource::{Blocker, OwnerReference, ResourceRef};

/// Schema version stamped into machine-readable output.
pub const SCHEMA_VERSION: &str = "1.0.0";
