//! Escalation and risk levels.
//!
//! Both enums are totally ordered. The escalation order gates which actions
//! the planner may emit, sorts the plan, and decides which actions need
//! confirmation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ordinal risk tier bounding which remediation actions may be proposed.
///
/// Serialized as its integer value (0-4).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum EscalationLevel {
    /// Read-only inspection.
    Info = 0,
    /// Let the owning controller finish cleanup.
    Clean = 1,
    /// Remove finalizers from blocking resources.
    #[default]
    Finalizer = 2,
    /// Remove the cleanup finalizer from a CRD.
    Crd = 3,
    /// Force-finalize a namespace.
    Force = 4,
}

impl EscalationLevel {
    pub const ALL: [EscalationLevel; 5] = [
        EscalationLevel::Info,
        EscalationLevel::Clean,
        EscalationLevel::Finalizer,
        EscalationLevel::Crd,
        EscalationLevel::Force,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Convert a raw level, rejecting anything outside 0-4.
    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Levels 3 and 4 need explicit force permission.
    pub fn requires_force(self) -> bool {
        self >= EscalationLevel::Crd
    }

    /// Human label, e.g. `L2 (Finalizer Removal)`.
    pub fn label(self) -> &'static str {
        match self {
            EscalationLevel::Info => "L0 (Informational)",
            EscalationLevel::Clean => "L1 (Clean Deletion)",
            EscalationLevel::Finalizer => "L2 (Finalizer Removal)",
            EscalationLevel::Crd => "L3 (CRD Finalizer)",
            EscalationLevel::Force => "L4 (Force Finalize)",
        }
    }

    /// Short tag, e.g. `L2`.
    pub fn short(self) -> String {
        format!("L{}", self.as_u8())
    }
}

impl From<EscalationLevel> for u8 {
    fn from(level: EscalationLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for EscalationLevel {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        EscalationLevel::from_u8(raw)
            .ok_or_else(|| format!("escalation level must be between 0 and 4, got {}", raw))
    }
}

impl std::fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl JsonSchema for EscalationLevel {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "EscalationLevel".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "integer",
            "minimum": 0,
            "maximum": 4,
            "description": "0=info, 1=clean, 2=finalizer, 3=crd, 4=force"
        })
    }
}

/// Risk of an action or a whole plan.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Rank used for comparisons (None=0 ... Critical=4).
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
