//! JSON Schema generation for machine-readable output.
//!
//! ```bash
//! unstuck schema --list
//! unstuck schema DiagnosisReport
//! unstuck schema --all
//! ```

use std::collections::BTreeMap;

use schemars::schema_for;
use serde_json::Value;

pub use unstuck_common::{
    Action, ActionResult, ActionType, ApplyResult, Blocker, ConditionSummary, ControllerStatus,
    DiagnosisReport, DiscoveryFailure, EscalationLevel, OwnerReference, Plan, ResourceRef,
    RiskLevel, TargetType, WebhookInfo,
};

/// Available schema types with their descriptions.
pub fn available_schemas() -> Vec<(&'static str, &'static str)> {
    vec![
        // Diagnosis
        ("DiagnosisReport", "Complete diagnosis of one target"),
        ("ResourceRef", "Reference to a Kubernetes object"),
        ("Blocker", "Object whose finalizers keep the target alive"),
        ("OwnerReference", "Owner back-reference used for ordering"),
        ("DiscoveryFailure", "API group/version that could not be enumerated"),
        ("ConditionSummary", "Status condition copied from the target"),
        ("ControllerStatus", "Controller that could finish cleanup"),
        ("WebhookInfo", "Admission webhook matching the target type"),
        ("TargetType", "namespace, crd, or resource"),
        // Plan
        ("Plan", "Ordered remediation plan"),
        ("Action", "Single remediation step"),
        ("ActionType", "inspect, list, patch, delete, finalize, wait"),
        ("EscalationLevel", "Escalation level 0-4"),
        ("RiskLevel", "none, low, medium, high, critical"),
        // Apply
        ("ApplyResult", "Outcome of an apply run"),
        ("ActionResult", "Outcome of one action"),
    ]
}

/// Generate JSON Schema for a type by name, `None` if unknown.
pub fn generate_schema(type_name: &str) -> Option<Value> {
    let schema = match type_name {
        "DiagnosisReport" => schema_for!(DiagnosisReport),
        "ResourceRef" => schema_for!(ResourceRef),
        "Blocker" => schema_for!(Blocker),
        "OwnerReference" => schema_for!(OwnerReference),
        "DiscoveryFailure" => schema_for!(DiscoveryFailure),
        "ConditionSummary" => schema_for!(ConditionSummary),
        "ControllerStatus" => schema_for!(ControllerStatus),
        "WebhookInfo" => schema_for!(WebhookInfo),
        "TargetType" => schema_for!(TargetType),
        "Plan" => schema_for!(Plan),
        "Action" => schema_for!(Action),
        "ActionType" => schema_for!(ActionType),
        "EscalationLevel" => schema_for!(EscalationLevel),
        "RiskLevel" => schema_for!(RiskLevel),
        "ApplyResult" => schema_for!(ApplyResult),
        "ActionResult" => schema_for!(ActionResult),
        _ => return None,
    };
    serde_json::to_value(schema).ok()
}

/// Every schema keyed by type name.
pub fn generate_all_schemas() -> BTreeMap<String, Value> {
    available_schemas()
        .into_iter()
        .filter_map(|(name, _)| generate_schema(name).map(|s| (name.to_string(), s)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Json,
    JsonCompact,
}

pub fn format_schema(schema: &Value, format: SchemaFormat) -> serde_json::Result<String> {
    match format {
        SchemaFormat::Json => serde_json::to_string_pretty(schema),
        SchemaFormat::JsonCompact => serde_json::to_string(schema),
    }
}
