//! Remediation actions, plans, and execution records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::escalation::{EscalationLevel, RiskLevel};
use crate::resource::ResourceRef;

/// Operation class of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Inspect,
    List,
    Patch,
    Delete,
    Finalize,
    Wait,
}

impl ActionType {
    /// Read-only or no-op types never touch cluster state.
    pub fn is_read_only(self) -> bool {
        matches!(self, ActionType::Inspect | ActionType::List | ActionType::Wait)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Inspect => "inspect",
            ActionType::List => "list",
            ActionType::Patch => "patch",
            ActionType::Delete => "delete",
            ActionType::Finalize => "finalize",
            ActionType::Wait => "wait",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single proposed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// `action-NNN`, assigned after ordering.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub escalation_level: EscalationLevel,
    pub description: String,
    pub target: ResourceRef,
    /// Short machine tag, e.g. `remove-finalizers`.
    pub operation: String,
    /// CLI-equivalent command; empty for read-only actions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    pub risk: RiskLevel,
    pub requires_force: bool,
    #[serde(default)]
    pub expected_result: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Seconds.
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Action {
    /// Create an action with no id, command, or dependencies.
    pub fn new(
        action_type: ActionType,
        escalation_level: EscalationLevel,
        target: ResourceRef,
        operation: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Action {
            id: String::new(),
            action_type,
            escalation_level,
            description: description.into(),
            target,
            operation: operation.into(),
            command: String::new(),
            risk: RiskLevel::None,
            requires_force: false,
            expected_result: String::new(),
            depends_on: Vec::new(),
            timeout_secs: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_force(mut self, requires_force: bool) -> Self {
        self.requires_force = requires_force;
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected_result = expected.into();
        self
    }
}

/// Ordered remediation steps for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub target: ResourceRef,
    pub risk_level: RiskLevel,
    pub max_escalation: EscalationLevel,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub commands: Vec<String>,
}

impl Plan {
    /// A plan with no actions, e.g. for a healthy target.
    pub fn empty(target: ResourceRef, max_escalation: EscalationLevel) -> Self {
        Plan {
            target,
            risk_level: RiskLevel::None,
            max_escalation,
            actions: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Opaque before/after state captured for audit display.
pub type StateSnapshot = BTreeMap<String, serde_json::Value>;

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action: Action,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<StateSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<StateSnapshot>,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ActionResult {
    /// Start a record for `action` at the current time; not yet successful.
    pub fn started(action: Action) -> Self {
        ActionResult {
            action,
            success: false,
            error: String::new(),
            before: None,
            after: None,
            executed_at: Utc::now(),
            duration_ms: 0,
        }
    }
}

/// Aggregate outcome of a whole apply run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_actions: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(default)]
    pub actions: Vec<ActionResult>,
    pub exit_code: i32,
    /// The overall deadline stopped the loop before every action ran.
    #[serde(default)]
    pub deadline_exceeded: bool,
}

impl ApplyResult {
    /// Empty result anchored at `start`.
    pub fn begin(start: DateTime<Utc>, total_actions: usize) -> Self {
        ApplyResult {
            start_time: start,
            end_time: start,
            total_actions,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            actions: Vec::new(),
            exit_code: 0,
            deadline_exceeded: false,
        }
    }

    /// 0 when nothing failed or was skipped, 1 when nothing succeeded, 2 otherwise.
    pub fn compute_exit_code(succeeded: usize, failed: usize, skipped: usize) -> i32 {
        if failed == 0 && skipped == 0 {
            0
        } else if succeeded == 0 {
            1
        } else {
            2
        }
    }

    /// Stamp the end time and derive the exit code from the counters.
    pub fn finish(&mut self, end: DateTime<Utc>) {
        self.end_time = end;
        self.exit_code = Self::compute_exit_code(self.succeeded, self.failed, self.skipped);
    }

    /// Results that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &ActionResult> {
        self.actions.iter().filter(|r| !r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch_action() -> Action {
        Action::new(
            ActionType::Patch,
            EscalationLevel::Finalizer,
            ResourceRef::new("Pod", "v1", "web-0").in_namespace("shop"),
            "remove-finalizers",
            "Remove finalizers from Pod/shop/web-0",
        )
        .with_risk(RiskLevel::Medium)
        .with_command("kubectl patch pod web-0 -n shop")
    }

    #[test]
    fn exit_code_law() {
        assert_eq!(ApplyResult::compute_exit_code(3, 0, 0), 0);
        assert_eq!(ApplyResult::compute_exit_code(0, 0, 0), 0);
        assert_eq!(ApplyResult::compute_exit_code(0, 2, 0), 1);
        assert_eq!(ApplyResult::compute_exit_code(0, 0, 1), 1);
        assert_eq!(ApplyResult::compute_exit_code(1, 2, 0), 2);
        assert_eq!(ApplyResult::compute_exit_code(1, 0, 2), 2);
    }

    #[test]
    fn finish_sets_exit_code() {
        let start = Utc::now();
        let mut result = ApplyResult::begin(start, 3);
        result.succeeded = 1;
        result.skipped = 2;
        result.finish(start);
        assert_eq!(result.exit_code, 2);
    }

    #[test]
    fn action_serializes_camel_case() {
        let json = serde_json::to_value(patch_action()).unwrap();
        assert_eq!(json["type"], "patch");
        assert_eq!(json["escalationLevel"], 2);
        assert_eq!(json["risk"], "medium");
        assert_eq!(json["requiresForce"], false);
        assert!(json.get("timeout").is_none());
    }

    #[test]
    fn read_only_types() {
        assert!(ActionType::Inspect.is_read_only());
        assert!(ActionType::Wait.is_read_only());
        assert!(!ActionType::Finalize.is_read_only());
    }

    #[test]
    fn plan_round_trips_through_json() {
        let mut plan = Plan::empty(
            ResourceRef::new("Namespace", "v1", "shop"),
            EscalationLevel::Finalizer,
        );
        plan.actions.push(patch_action());
        plan.commands.push(plan.actions[0].command.clone());
        plan.risk_level = RiskLevel::Medium;

        let json = serde_json::to_string(&plan).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
        assert_eq!(back.len(), 1);
    }
}
