//! Diagnosis reports produced by the detectors.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::resource::{Blocker, ResourceRef};

/// What kind of object was diagnosed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Namespace,
    Crd,
    Resource,
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetType::Namespace => write!(f, "namespace"),
            TargetType::Crd => write!(f, "crd"),
            TargetType::Resource => write!(f, "resource"),
        }
    }
}

/// An API group/version (optionally a single resource) that could not be enumerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryFailure {
    pub group_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    pub error: String,
}

/// Availability of a controller or operator that could finish cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub available: bool,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Condition copied from the target's status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSummary {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// An admission webhook that matches the target's resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookInfo {
    /// Name of the webhook configuration object.
    pub name: String,
    /// Name of the individual webhook inside the configuration.
    pub webhook_name: String,
    /// `validating` or `mutating`.
    #[serde(rename = "type")]
    pub webhook_type: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// `namespace/name` of the backing service, empty for URL webhooks.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_policy: String,
}

/// Snapshot of a stuck (or healthy) object, consumed once by the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisReport {
    pub target: ResourceRef,
    pub target_type: TargetType,

    /// `Active`, `Terminating`, `Bound`, or any other phase string.
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub terminating_for: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_cause: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<Blocker>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discovery_failures: Vec<DiscoveryFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhook_issues: Vec<WebhookInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controllers: Vec<ControllerStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ConditionSummary>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub instance_count: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instances_by_namespace: BTreeMap<String, usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,

    #[serde(default = "Utc::now")]
    pub diagnosed_at: DateTime<Utc>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl DiagnosisReport {
    /// Start a report for `target` with the current time as `diagnosed_at`.
    pub fn new(target: ResourceRef, target_type: TargetType) -> Self {
        DiagnosisReport {
            target,
            target_type,
            diagnosed_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Not stuck: `Active`, `Bound`, or no status at all.
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "Active" | "Bound" | "")
    }

    pub fn is_terminating(&self) -> bool {
        self.status == "Terminating"
    }

    pub fn has_blockers(&self) -> bool {
        !self.blockers.is_empty()
    }

    pub fn has_discovery_failures(&self) -> bool {
        !self.discovery_failures.is_empty()
    }

    pub fn has_webhook_issues(&self) -> bool {
        self.webhook_issues.iter().any(|w| !w.healthy)
    }

    pub fn total_blocker_count(&self) -> usize {
        self.blockers.len()
    }

    /// True if any controller could still finish cleanup on its own.
    pub fn has_ready_controller(&self) -> bool {
        self.controllers.iter().any(|c| c.available && c.ready)
    }

    /// Record the deletion timestamp and the derived `terminating_for` text.
    pub fn mark_terminating(&mut self, deleted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.status = "Terminating".to_string();
        if let Some(ts) = deleted_at {
            self.deletion_timestamp = Some(ts);
            self.terminating_for = format_duration(now.signed_duration_since(ts));
        }
    }
}

/// Compact age: `40s`, `12m`, `5h`, `3d`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}
