//! Risk classification over escalation levels and action sets.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use unstuck_common::{Action, EscalationLevel, RiskLevel};

/// Fixed table: Info→None, Clean→Low, Finalizer→Medium, Crd→High, Force→Critical.
pub fn risk_level_from_escalation(level: EscalationLevel) -> RiskLevel {
    match level {
        EscalationLevel::Info => RiskLevel::None,
        EscalationLevel::Clean => RiskLevel::Low,
        EscalationLevel::Finalizer => RiskLevel::Medium,
        EscalationLevel::Crd => RiskLevel::High,
        EscalationLevel::Force => RiskLevel::Critical,
    }
}

/// Same table for an unchecked integer level; anything outside 0-4 is `None`.
pub fn risk_level_for_raw(level: u8) -> RiskLevel {
    EscalationLevel::from_u8(level)
        .map(risk_level_from_escalation)
        .unwrap_or(RiskLevel::None)
}

pub fn compare_risk(a: RiskLevel, b: RiskLevel) -> Ordering {
    a.rank().cmp(&b.rank())
}

/// Highest risk across `actions`, `None` when empty.
pub fn calculate_risk_level(actions: &[Action]) -> RiskLevel {
    actions
        .iter()
        .map(|a| a.risk)
        .max_by(|a, b| compare_risk(*a, *b))
        .unwrap_or(RiskLevel::None)
}

/// Keep actions at or below `max`, preserving order.
pub fn filter_actions_by_max_level(actions: Vec<Action>, max: EscalationLevel) -> Vec<Action> {
    actions
        .into_iter()
        .filter(|a| a.escalation_level <= max)
        .collect()
}

pub fn has_force_actions(actions: &[Action]) -> bool {
    actions.iter().any(|a| a.requires_force)
}

pub fn summary_by_risk(actions: &[Action]) -> BTreeMap<RiskLevel, usize> {
    let mut out = BTreeMap::new();
    for action in actions {
        *out.entry(action.risk).or_insert(0) += 1;
    }
    out
}

pub fn count_actions_by_level(actions: &[Action]) -> BTreeMap<EscalationLevel, usize> {
    let mut out = BTreeMap::new();
    for action in actions {
        *out.entry(action.escalation_level).or_insert(0) += 1;
    }
    out
}
