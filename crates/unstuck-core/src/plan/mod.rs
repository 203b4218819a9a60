//! Remediation plan generation.
//!
//! Turns a [`DiagnosisReport`] into an ordered, risk-graded [`Plan`].
//! Escalation levels are additive: every level up to the configured
//! ceiling is evaluated on its own conditions, and levels 3 and 4 also
//! need `allow_force`. A healthy target always yields an empty plan.

pub mod commands;
pub mod ordering;
pub mod risk;

use unstuck_common::{
    Action, ActionType, DiagnosisReport, EscalationLevel, Error, Plan, ResourceRef, Result,
    TargetType,
};
use unstuck_config::PlanSettings;

pub use ordering::{
    assign_ids, order_actions, order_by_priority, order_topological, resource_priority, OwnerEdges,
};
pub use risk::{
    calculate_risk_level, compare_risk, count_actions_by_level, filter_actions_by_max_level,
    has_force_actions, risk_level_for_raw, risk_level_from_escalation, summary_by_risk,
};

/// Planner ceiling and force permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerConfig {
    pub max_escalation: EscalationLevel,
    /// Required for any level 3 or 4 action, whatever `max_escalation` says.
    pub allow_force: bool,
}

impl PlannerConfig {
    pub fn new(max_escalation: EscalationLevel, allow_force: bool) -> Self {
        PlannerConfig {
            max_escalation,
            allow_force,
        }
    }

    /// From validated settings.
    pub fn from_settings(settings: &PlanSettings) -> Result<Self> {
        let level = EscalationLevel::try_from(settings.max_escalation).map_err(Error::InvalidInput)?;
        Ok(PlannerConfig::new(level, settings.allow_force))
    }

    fn allows(&self, level: EscalationLevel) -> bool {
        self.max_escalation >= level && (!level.requires_force() || self.allow_force)
    }
}

/// Builds plans from diagnoses.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
    owners: Option<OwnerEdges>,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Planner {
            config,
            owners: None,
        }
    }

    /// Order with an explicit child → owners key map instead of kind priority.
    pub fn with_owner_edges(mut self, owners: OwnerEdges) -> Self {
        self.owners = Some(owners);
        self
    }

    pub fn config(&self) -> PlannerConfig {
        self.config
    }

    /// Generate the plan for `diagnosis`.
    ///
    /// Fails only when the diagnosis has no target.
    pub fn plan(&self, diagnosis: &DiagnosisReport) -> Result<Plan> {
        if diagnosis.target.name.is_empty() {
            return Err(Error::InvalidInput(
                "diagnosis has no target to plan for".to_string(),
            ));
        }

        let mut plan = Plan::empty(diagnosis.target.clone(), self.config.max_escalation);
        if diagnosis.is_healthy() {
            return Ok(plan);
        }

        let mut actions = self.informational_actions(diagnosis);
        if self.config.allows(EscalationLevel::Clean) {
            actions.extend(self.clean_actions(diagnosis));
        }
        if self.config.allows(EscalationLevel::Finalizer) {
            actions.extend(self.finalizer_actions(diagnosis));
        }
        if self.config.allows(EscalationLevel::Crd) {
            actions.extend(self.crd_actions(diagnosis));
        }
        if self.config.allows(EscalationLevel::Force) {
            actions.extend(self.force_actions(diagnosis));
        }

        let actions = filter_actions_by_max_level(actions, self.config.max_escalation);
        let mut actions = order_actions(actions, self.owners.as_ref());
        assign_ids(&mut actions);

        plan.risk_level = calculate_risk_level(&actions);
        plan.commands = actions
            .iter()
            .filter(|a| !a.command.is_empty())
            .map(|a| a.command.clone())
            .collect();
        plan.actions = actions;
        Ok(plan)
    }

    fn informational_actions(&self, diagnosis: &DiagnosisReport) -> Vec<Action> {
        let mut actions = vec![Action::new(
            ActionType::Inspect,
            EscalationLevel::Info,
            diagnosis.target.clone(),
            "inspect",
            format!(
                "Inspect {} \"{}\"",
                diagnosis.target_type, diagnosis.target.name
            ),
        )
        .with_expected("Gather current state information")];

        if diagnosis.has_blockers() {
            actions.push(
                Action::new(
                    ActionType::List,
                    EscalationLevel::Info,
                    diagnosis.target.clone(),
                    "list-blockers",
                    format!("List {} blocking resources", diagnosis.blockers.len()),
                )
                .with_expected("Enumerate resources preventing deletion"),
            );
        }
        actions
    }

    fn clean_actions(&self, diagnosis: &DiagnosisReport) -> Vec<Action> {
        if !diagnosis.has_ready_controller() {
            return Vec::new();
        }
        vec![Action::new(
            ActionType::Wait,
            EscalationLevel::Clean,
            diagnosis.target.clone(),
            "wait-controller",
            "Wait for controller to process finalizers",
        )
        .with_risk(risk_level_from_escalation(EscalationLevel::Clean))
        .with_expected("Controller removes finalizers naturally")]
    }

    fn finalizer_actions(&self, diagnosis: &DiagnosisReport) -> Vec<Action> {
        diagnosis
            .blockers
            .iter()
            .map(|blocker| {
                let mut target = blocker.resource.clone();
                if target.namespace.is_empty() {
                    target.namespace = diagnosis.target.namespace.clone();
                }
                Action::new(
                    ActionType::Patch,
                    EscalationLevel::Finalizer,
                    target.clone(),
                    "remove-finalizers",
                    format!("Remove finalizers from {}", target),
                )
                .with_command(commands::remove_finalizers_command(&target))
                .with_risk(risk_level_from_escalation(EscalationLevel::Finalizer))
                .with_expected("Finalizers removed, object deletion proceeds")
            })
            .collect()
    }

    fn crd_actions(&self, diagnosis: &DiagnosisReport) -> Vec<Action> {
        if diagnosis.target_type != TargetType::Crd {
            return Vec::new();
        }
        let name = &diagnosis.target.name;
        let target = ResourceRef::new(
            "CustomResourceDefinition",
            "apiextensions.k8s.io/v1",
            name.clone(),
        );
        vec![Action::new(
            ActionType::Patch,
            EscalationLevel::Crd,
            target,
            "remove-crd-finalizer",
            format!("Remove cleanup finalizer from CRD {}", name),
        )
        .with_command(commands::remove_crd_finalizers_command(name))
        .with_risk(risk_level_from_escalation(EscalationLevel::Crd))
        .with_force(true)
        .with_expected("CRD cleanup finalizer removed, CR data may be orphaned")]
    }

    fn force_actions(&self, diagnosis: &DiagnosisReport) -> Vec<Action> {
        if diagnosis.target_type != TargetType::Namespace || !diagnosis.has_discovery_failures() {
            return Vec::new();
        }
        let name = &diagnosis.target.name;
        vec![Action::new(
            ActionType::Finalize,
            EscalationLevel::Force,
            diagnosis.target.clone(),
            "force-finalize",
            format!("Force-finalize namespace {}", name),
        )
        .with_command(commands::force_finalize_command(name))
        .with_risk(risk_level_from_escalation(EscalationLevel::Force))
        .with_force(true)
        .with_expected("Namespace deleted, remaining resources abandoned")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unstuck_common::{Blocker, ControllerStatus, DiscoveryFailure, RiskLevel};

    fn stuck_namespace() -> DiagnosisReport {
        let mut report = DiagnosisReport::new(
            ResourceRef::new("Namespace", "v1", "shop"),
            TargetType::Namespace,
        );
        report.status = "Terminating".into();
        report.blockers = vec![
            Blocker::new(
                ResourceRef::new("Certificate", "cert-manager.io/v1", "tls").in_namespace("shop"),
            )
            .with_finalizers(["cert-manager.io/cleanup"]),
            Blocker::new(ResourceRef::new("Pod", "v1", "web-0").in_namespace("shop"))
                .with_finalizers(["example.com/block"]),
        ];
        report
    }

    fn planner(level: EscalationLevel, force: bool) -> Planner {
        Planner::new(PlannerConfig::new(level, force))
    }

    #[test]
    fn healthy_target_gets_empty_plan() {
        let mut report = stuck_namespace();
        report.status = "Active".into();
        let plan = planner(EscalationLevel::Force, true).plan(&report).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.risk_level, RiskLevel::None);
        assert!(plan.commands.is_empty());
    }

    #[test]
    fn missing_target_is_invalid_input() {
        let report = DiagnosisReport::default();
        let err = planner(EscalationLevel::Finalizer, false)
            .plan(&report)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn level_zero_only() {
        let plan = planner(EscalationLevel::Info, false)
            .plan(&stuck_namespace())
            .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.actions[0].action_type, ActionType::Inspect);
        assert_eq!(plan.actions[0].description, "Inspect namespace \"shop\"");
        assert_eq!(plan.actions[1].description, "List 2 blocking resources");
        assert!(plan.commands.is_empty());
        assert_eq!(plan.risk_level, RiskLevel::None);
    }

    #[test]
    fn default_plan_patches_blockers_leaf_first() {
        let plan = planner(EscalationLevel::Finalizer, false)
            .plan(&stuck_namespace())
            .unwrap();
        let ops: Vec<_> = plan.actions.iter().map(|a| a.operation.as_str()).collect();
        assert_eq!(
            ops,
            vec!["inspect", "list-blockers", "remove-finalizers", "remove-finalizers"]
        );
        assert_eq!(plan.actions[2].target.kind, "Pod");
        assert_eq!(plan.actions[3].target.kind, "Certificate");
        assert_eq!(plan.actions[3].id, "action-004");
        assert_eq!(plan.commands.len(), 2);
        assert_eq!(plan.risk_level, RiskLevel::Medium);
        assert!(!has_force_actions(&plan.actions));
    }

    #[test]
    fn blocker_inherits_target_namespace() {
        let mut report = DiagnosisReport::new(
            ResourceRef::new("Deployment", "apps/v1", "web").in_namespace("shop"),
            TargetType::Resource,
        );
        report.status = "Terminating".into();
        report.blockers = vec![Blocker::new(ResourceRef::new("Deployment", "apps/v1", "web"))];
        let plan = planner(EscalationLevel::Finalizer, false).plan(&report).unwrap();
        let patch = plan.actions.last().unwrap();
        assert_eq!(patch.target.namespace, "shop");
        assert!(patch.command.contains("-n shop"));
    }

    #[test]
    fn wait_needs_ready_controller() {
        let mut report = stuck_namespace();
        report.controllers.push(ControllerStatus {
            name: "cert-manager".into(),
            namespace: "cert-manager".into(),
            available: true,
            ready: false,
            message: String::new(),
        });
        let plan = planner(EscalationLevel::Clean, false).plan(&report).unwrap();
        assert!(plan.actions.iter().all(|a| a.action_type != ActionType::Wait));

        report.controllers[0].ready = true;
        let plan = planner(EscalationLevel::Clean, false).plan(&report).unwrap();
        let wait = plan
            .actions
            .iter()
            .find(|a| a.action_type == ActionType::Wait)
            .unwrap();
        assert_eq!(wait.risk, RiskLevel::Low);
        assert!(wait.command.is_empty());
    }

    #[test]
    fn crd_level_needs_force_and_crd_target() {
        let mut report = DiagnosisReport::new(
            ResourceRef::new("CustomResourceDefinition", "", "widgets.example.com"),
            TargetType::Crd,
        );
        report.status = "Terminating".into();

        let plan = planner(EscalationLevel::Force, false).plan(&report).unwrap();
        assert!(!has_force_actions(&plan.actions));

        let plan = planner(EscalationLevel::Crd, true).plan(&report).unwrap();
        let crd = plan.actions.last().unwrap();
        assert_eq!(crd.operation, "remove-crd-finalizer");
        assert_eq!(crd.target.api_version, "apiextensions.k8s.io/v1");
        assert_eq!(crd.risk, RiskLevel::High);
        assert!(crd.requires_force);
        assert_eq!(plan.risk_level, RiskLevel::High);

        // Namespace targets never get the CRD action.
        let plan = planner(EscalationLevel::Crd, true)
            .plan(&stuck_namespace())
            .unwrap();
        assert!(plan.actions.iter().all(|a| a.operation != "remove-crd-finalizer"));
    }

    #[test]
    fn force_finalize_needs_discovery_failures() {
        let mut report = stuck_namespace();
        let plan = planner(EscalationLevel::Force, true).plan(&report).unwrap();
        assert!(plan.actions.iter().all(|a| a.action_type != ActionType::Finalize));

        report.discovery_failures.push(DiscoveryFailure {
            group_version: "widgets.example.com/v1".into(),
            resource: String::new(),
            error: "API group not found (CRD likely deleted)".into(),
        });
        let plan = planner(EscalationLevel::Force, true).plan(&report).unwrap();
        let last = plan.actions.last().unwrap();
        assert_eq!(last.action_type, ActionType::Finalize);
        assert_eq!(last.risk, RiskLevel::Critical);
        assert_eq!(plan.risk_level, RiskLevel::Critical);
        assert!(plan.commands.last().unwrap().contains("/finalize"));
    }

    #[test]
    fn from_settings_rejects_out_of_range() {
        let settings = PlanSettings {
            max_escalation: 9,
            allow_force: true,
        };
        assert!(PlannerConfig::from_settings(&settings).is_err());
    }
}
