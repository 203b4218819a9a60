//! Rendering of reports, plans, and apply results.
//!
//! Payloads go to the writer the caller passes (stdout in the binary);
//! structured formats carry no decoration so they can be piped.

pub mod text;

use std::io::Write;

use serde::Serialize;
use unstuck_common::{
    ApplyResult, DiagnosisReport, Error, OutputFormat, Plan, ResourceRef, Result, WebhookInfo,
};

pub use text::{apply_banner, truncate};

/// Combined plan output: `{target, diagnosis, plan, commands}`.
#[derive(Debug, Serialize)]
pub struct PlanEnvelope<'a> {
    pub target: &'a ResourceRef,
    pub diagnosis: &'a DiagnosisReport,
    pub plan: &'a Plan,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub commands: &'a [String],
}

impl<'a> PlanEnvelope<'a> {
    pub fn new(diagnosis: &'a DiagnosisReport, plan: &'a Plan) -> Self {
        PlanEnvelope {
            target: &plan.target,
            diagnosis,
            plan,
            commands: &plan.commands,
        }
    }
}

/// Writes one value per call in the selected format.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    format: OutputFormat,
    verbose: bool,
}

impl Printer {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Printer { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn structured<T: Serialize + ?Sized>(&self, out: &mut dyn Write, value: &T) -> Result<()> {
        match self.format {
            OutputFormat::Yaml => {
                let text = serde_yaml::to_string(value)
                    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                out.write_all(text.as_bytes())?;
            }
            _ => {
                serde_json::to_writer_pretty(&mut *out, value)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }

    pub fn print_diagnosis(&self, out: &mut dyn Write, report: &DiagnosisReport) -> Result<()> {
        match self.format {
            OutputFormat::Text => Ok(text::write_diagnosis(out, report, self.verbose)?),
            _ => self.structured(out, report),
        }
    }

    pub fn print_plan(
        &self,
        out: &mut dyn Write,
        report: &DiagnosisReport,
        plan: &Plan,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Text => Ok(text::write_plan(out, report, plan, self.verbose)?),
            _ => self.structured(out, &PlanEnvelope::new(report, plan)),
        }
    }

    pub fn print_apply_result(&self, out: &mut dyn Write, result: &ApplyResult) -> Result<()> {
        match self.format {
            OutputFormat::Text => Ok(text::write_apply_result(out, result, self.verbose)?),
            _ => self.structured(out, result),
        }
    }

    pub fn print_webhooks(&self, out: &mut dyn Write, webhooks: &[WebhookInfo]) -> Result<()> {
        match self.format {
            OutputFormat::Text => Ok(text::write_webhooks(out, webhooks)?),
            _ => self.structured(out, webhooks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use unstuck_common::{
        Action, ActionResult, ActionType, Blocker, ConditionSummary, DiscoveryFailure,
        EscalationLevel, RiskLevel, TargetType,
    };

    fn render(printer: Printer, f: impl FnOnce(&Printer, &mut Vec<u8>) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&printer, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn healthy() -> DiagnosisReport {
        let mut r = DiagnosisReport::new(
            ResourceRef::new("Namespace", "v1", "default"),
            TargetType::Namespace,
        );
        r.status = "Active".into();
        r
    }

    fn stuck() -> DiagnosisReport {
        let mut r = DiagnosisReport::new(
            ResourceRef::new("Namespace", "v1", "stuck-ns"),
            TargetType::Namespace,
        );
        r.status = "Terminating".into();
        r.terminating_for = "2h".into();
        r.root_cause = "CR instances stuck with unsatisfied finalizers".into();
        r.blockers = vec![
            Blocker::new(
                ResourceRef::new("Certificate", "cert-manager.io/v1", "my-cert")
                    .in_namespace("stuck-ns"),
            )
            .with_finalizers(["cert-manager.io/finalizer", "other/x"])
            .with_deletion_timestamp(Utc::now()),
            Blocker::new(ResourceRef::new("Widget", "example.com/v1", "w").in_namespace("elsewhere")),
        ];
        r.discovery_failures = vec![DiscoveryFailure {
            group_version: "metrics.k8s.io/v1beta1".into(),
            resource: String::new(),
            error: "API group not found (CRD likely deleted)".into(),
        }];
        r.conditions = vec![ConditionSummary {
            condition_type: "NamespaceContentRemaining".into(),
            status: "True".into(),
            reason: String::new(),
            message: "x".repeat(150),
        }];
        r.recommendations = vec!["Use `unstuck plan namespace stuck-ns`".into()];
        r
    }

    fn plan_for(report: &DiagnosisReport) -> Plan {
        let mut plan = Plan::empty(report.target.clone(), EscalationLevel::Force);
        plan.actions.push(
            Action::new(
                ActionType::Finalize,
                EscalationLevel::Force,
                report.target.clone(),
                "force-finalize",
                "Force-finalize namespace stuck-ns",
            )
            .with_risk(RiskLevel::Critical)
            .with_force(true)
            .with_command("kubectl get namespace stuck-ns -o json | jq ..."),
        );
        plan.commands = vec![plan.actions[0].command.clone()];
        plan.risk_level = RiskLevel::Critical;
        plan
    }

    #[test]
    fn healthy_diagnosis_text() {
        let out = render(Printer::new(OutputFormat::Text, false), |p, w| {
            p.print_diagnosis(w, &healthy())
        });
        assert!(out.contains("DIAGNOSIS: Namespace \"default\""));
        assert!(out.contains("Active ✓"));
        assert!(out.contains("not in Terminating state"));
    }

    #[test]
    fn stuck_diagnosis_text() {
        let out = render(Printer::new(OutputFormat::Text, false), |p, w| {
            p.print_diagnosis(w, &stuck())
        });
        assert!(out.contains("Terminating (since 2h ago)"));
        assert!(out.contains("BLOCKERS (2 found)"));
        assert!(out.contains("Certificate/my-cert"));
        assert!(out.contains("cert-manager.io/finalizer (+1)"));
        assert!(out.contains("Widget/elsewhere/w"));
        assert!(out.contains("Pending"));
        assert!(out.contains("• metrics.k8s.io/v1beta1 - API group not found"));
        assert!(out.contains("RECOMMENDATION"));
        assert!(!out.contains("CONDITIONS"));

        let verbose = render(Printer::new(OutputFormat::Text, true), |p, w| {
            p.print_diagnosis(w, &stuck())
        });
        assert!(verbose.contains("CONDITIONS"));
        assert!(verbose.contains(&format!("Message: {}...", "x".repeat(97))));
    }

    #[test]
    fn diagnosis_json_is_camel_case() {
        let out = render(Printer::new(OutputFormat::Json, false), |p, w| {
            p.print_diagnosis(w, &healthy())
        });
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], "Active");
        assert_eq!(v["targetType"], "namespace");
    }

    #[test]
    fn plan_envelope_json() {
        let report = stuck();
        let plan = plan_for(&report);
        let out = render(Printer::new(OutputFormat::Json, false), |p, w| {
            p.print_plan(w, &report, &plan)
        });
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["target"]["name"], "stuck-ns");
        assert_eq!(v["diagnosis"]["status"], "Terminating");
        assert_eq!(v["plan"]["actions"][0]["escalationLevel"], 4);
        assert_eq!(v["commands"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn plan_yaml() {
        let report = stuck();
        let plan = plan_for(&report);
        let out = render(Printer::new(OutputFormat::Yaml, false), |p, w| {
            p.print_plan(w, &report, &plan)
        });
        let v: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(v["plan"]["riskLevel"], serde_yaml::Value::from("critical"));
    }

    #[test]
    fn plan_text_shows_commands_only_when_verbose() {
        let report = stuck();
        let plan = plan_for(&report);
        let quiet = render(Printer::new(OutputFormat::Text, false), |p, w| {
            p.print_plan(w, &report, &plan)
        });
        assert!(quiet.contains("Risk Level:     CRITICAL"));
        assert!(quiet.contains("Max Escalation: L4 (Force Finalize)"));
        assert!(quiet.contains("ACTIONS (1 steps)"));
        assert!(quiet.contains("critical (force req'd)"));
        assert!(quiet.contains("WARNING"));
        assert!(quiet.contains("To execute: unstuck apply namespace stuck-ns"));
        assert!(!quiet.contains("KUBECTL COMMANDS"));

        let verbose = render(Printer::new(OutputFormat::Text, true), |p, w| {
            p.print_plan(w, &report, &plan)
        });
        assert!(verbose.contains("KUBECTL COMMANDS"));
        assert!(verbose.contains("# Step 1"));
    }

    #[test]
    fn apply_result_text_with_webhook_guidance() {
        let report = stuck();
        let plan = plan_for(&report);
        let start = Utc::now();
        let mut result = ApplyResult::begin(start, 1);
        let mut failed = ActionResult::started(plan.actions[0].clone());
        failed.error = r#"cluster request failed: admission webhook "guard.example.io" denied the request"#.into();
        result.actions.push(failed);
        result.failed = 1;
        result.finish(start + Duration::milliseconds(1500));

        let out = render(Printer::new(OutputFormat::Text, false), |p, w| {
            p.print_apply_result(w, &result)
        });
        assert!(out.contains("RESULT SUMMARY"));
        assert!(out.contains("Duration:       1.5s"));
        assert!(out.contains("❌ All actions failed"));
        assert!(out.contains("FAILED ACTIONS"));
        assert!(out.contains("Webhook \"guard.example.io\" is blocking the request"));
    }

    #[test]
    fn banners() {
        let report = stuck();
        assert_eq!(
            apply_banner(&plan_for(&report)),
            "📋 Remediation Plan: 1 actions (max risk: CRITICAL)"
        );
        assert!(apply_banner(&Plan::default()).starts_with("✅ No remediation actions needed"));
    }

    #[test]
    fn webhook_table() {
        let hooks = vec![WebhookInfo {
            name: "policy".into(),
            webhook_name: "pods.policy.io".into(),
            webhook_type: "validating".into(),
            healthy: false,
            error: "no ready endpoints available".into(),
            service_ref: String::new(),
            failure_policy: "Fail".into(),
        }];
        let out = render(Printer::new(OutputFormat::Text, false), |p, w| {
            p.print_webhooks(w, &hooks)
        });
        assert!(out.contains("Unhealthy:      1"));
        assert!(out.contains("(URL)"));
        assert!(out.contains("UNHEALTHY WEBHOOKS MAY BLOCK OPERATIONS"));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijk", 8), "abcde...");
    }
}
