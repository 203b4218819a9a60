//! Event vocabulary: stages, stable event names, and the JSONL record.
//!
//! Every event carries the run id, the resource being remediated, the kube
//! context, and the stage it was emitted from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity as written to the JSONL stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::TRACE => Level::Trace,
        }
    }
}

/// Where in a run an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Diagnose,
    Plan,
    /// Waiting on the operator for a force action.
    Confirm,
    Apply,
    Verify,
    Report,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Diagnose => "diagnose",
            Stage::Plan => "plan",
            Stage::Confirm => "confirm",
            Stage::Apply => "apply",
            Stage::Verify => "verify",
            Stage::Report => "report",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable event names, used as the tracing target.
pub mod event_names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    pub const KUBECTL_CALL: &str = "kubectl.call";

    pub const DIAGNOSE_STARTED: &str = "diagnose.started";
    pub const DIAGNOSE_PARTIAL_DISCOVERY: &str = "diagnose.partial_discovery";
    pub const DIAGNOSE_FINISHED: &str = "diagnose.finished";

    pub const PLAN_GENERATED: &str = "plan.generated";

    pub const CONFIRM_REQUESTED: &str = "confirm.requested";
    pub const CONFIRM_ANSWER: &str = "confirm.answer";

    pub const APPLY_STARTED: &str = "apply.started";
    pub const APPLY_ACTION_ATTEMPTED: &str = "apply.action_attempted";
    pub const APPLY_ACTION_RESULT: &str = "apply.action_result";
    pub const APPLY_SKIPPED: &str = "apply.skipped";
    pub const APPLY_AUDIT: &str = "apply.audit";
    pub const APPLY_DEADLINE_EXCEEDED: &str = "apply.deadline_exceeded";
    pub const APPLY_FINISHED: &str = "apply.finished";

    pub const VERIFY_RESULT: &str = "verify.result";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// One line of JSONL output.
///
/// Correlation fields sit at the top level; everything else the call site
/// attached goes under `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name, e.g. `plan.generated`.
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// `kind/namespace/name` of the object being remediated, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Kube context name, or `default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: Level, event: impl Into<String>) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: None,
            resource: None,
            cluster: None,
            stage: None,
            message: None,
            fields: BTreeMap::new(),
        }
    }

    /// Single JSON line, without the trailing newline.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"event":{:?},"error":"unserializable"}}"#, self.event))
    }
}

/// Correlation data shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub resource: Option<String>,
    pub cluster: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, cluster: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            resource: None,
            cluster: cluster.into(),
        }
    }

    /// Set the object being remediated.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Resource as a display string, empty when unset.
    pub fn resource_str(&self) -> &str {
        self.resource.as_deref().unwrap_or("")
    }
}

impl Default for LogContext {
    fn default() -> Self {
        LogContext::new(super::generate_run_id(), "default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_correlation_fields_are_omitted() {
        let mut event = LogEvent::new(Level::Info, event_names::PLAN_GENERATED);
        event.run_id = Some("run-12345".into());
        event.stage = Some(Stage::Plan.to_string());
        event.fields.insert("risk".into(), "medium".into());

        let json = event.to_jsonl();
        assert!(json.contains(r#""event":"plan.generated""#));
        assert!(json.contains(r#""level":"info""#));
        assert!(json.contains(r#""stage":"plan""#));
        assert!(json.contains(r#""fields":{"risk":"medium"}"#));
        assert!(!json.contains("\"resource\""));
        assert!(!json.contains("\"cluster\""));
    }

    #[test]
    fn context_resource() {
        let ctx = LogContext::new("run-abc", "prod");
        assert_eq!(ctx.resource_str(), "");
        let ctx = ctx.with_resource("Namespace/shop");
        assert_eq!(ctx.resource_str(), "Namespace/shop");
        assert_eq!(ctx.run_id, "run-abc");
    }

    #[test]
    fn stage_serializes_like_display() {
        for stage in [Stage::Diagnose, Stage::Confirm, Stage::Verify] {
            assert_eq!(
                serde_json::to_string(&stage).unwrap(),
                format!("\"{}\"", stage)
            );
        }
    }
}
