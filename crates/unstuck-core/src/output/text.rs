//! Human-readable rendering.

use std::io::{self, Write};

use unstuck_common::{ApplyResult, DiagnosisReport, Plan, WebhookInfo};

use crate::detect::{extract_webhook_name, webhook_guidance};
use crate::plan::has_force_actions;

const RULE_WIDE: usize = 68;
const RULE_NARROW: usize = 40;

fn rule(width: usize) -> String {
    "━".repeat(width)
}

/// Cut to `max` characters, ending in `...` when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Left-aligned columns separated by two spaces.
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: &[&str]) -> Self {
        Table {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn print(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };
        writeln!(out, "{}", line(&self.header))?;
        for row in &self.rows {
            writeln!(out, "{}", line(row))?;
        }
        Ok(())
    }
}

fn field(out: &mut dyn Write, label: &str, value: impl std::fmt::Display) -> io::Result<()> {
    writeln!(out, "{:<16}{}", label, value)
}

fn not_terminating(out: &mut dyn Write, kind: &str, name: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "The {} {:?} is not in Terminating state.", kind.to_lowercase(), name)?;
    writeln!(out, "No remediation needed.")?;
    writeln!(out)
}

pub fn write_diagnosis(
    out: &mut dyn Write,
    report: &DiagnosisReport,
    verbose: bool,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "DIAGNOSIS: {} {:?}", report.target.kind, report.target.name)?;
    writeln!(out, "{}", rule(RULE_WIDE))?;
    writeln!(out)?;

    if report.is_healthy() {
        field(out, "Status:", format!("{} ✓", report.status))?;
        return not_terminating(out, &report.target.kind, &report.target.name);
    }

    let since = if report.terminating_for.is_empty() {
        String::new()
    } else {
        format!(" (since {} ago)", report.terminating_for)
    };
    field(out, "Status:", format!("{}{}", report.status, since))?;
    if !report.root_cause.is_empty() {
        field(out, "Root Cause:", &report.root_cause)?;
    }
    if !report.finalizers.is_empty() {
        field(out, "Finalizers:", report.finalizers.join(", "))?;
    }
    writeln!(out)?;

    if report.has_blockers() {
        writeln!(out, "BLOCKERS ({} found)", report.blockers.len())?;
        let mut table = Table::new(&["#", "Resource", "Finalizer", "Status"]);
        for (i, b) in report.blockers.iter().enumerate() {
            let finalizer = match b.finalizers.as_slice() {
                [] => "-".to_string(),
                [only] => only.clone(),
                [first, rest @ ..] => format!("{} (+{})", first, rest.len()),
            };
            // Inside the target namespace the namespace is implied.
            let resource = if b.resource.namespace.is_empty()
                || b.resource.namespace == report.target.name
            {
                format!("{}/{}", b.resource.kind, b.resource.name)
            } else {
                b.resource.key()
            };
            let status = if b.is_terminating() { "Stuck" } else { "Pending" };
            table.row(vec![(i + 1).to_string(), resource, finalizer, status.to_string()]);
        }
        table.print(out)?;
        writeln!(out)?;
    }

    if report.has_discovery_failures() {
        writeln!(out, "DISCOVERY FAILURES")?;
        for f in &report.discovery_failures {
            writeln!(out, "• {} - {}", f.group_version, f.error)?;
        }
        writeln!(out)?;
    }

    if verbose && !report.conditions.is_empty() {
        writeln!(out, "CONDITIONS")?;
        for c in report.conditions.iter().filter(|c| c.status == "True") {
            writeln!(out, "• {}: {}", c.condition_type, c.status)?;
            if !c.message.is_empty() {
                writeln!(out, "  Message: {}", truncate(&c.message, 100))?;
            }
        }
        writeln!(out)?;
    }

    if report.instance_count > 0 {
        writeln!(
            out,
            "REMAINING INSTANCES ({} across {} namespaces)",
            report.instance_count,
            report.instances_by_namespace.len()
        )?;
        for (ns, count) in &report.instances_by_namespace {
            writeln!(out, "• {}: {} instances", ns, count)?;
        }
        writeln!(out)?;
    }

    if !report.webhook_issues.is_empty() {
        writeln!(out, "WEBHOOK ISSUES")?;
        for w in &report.webhook_issues {
            let state = if w.healthy {
                "healthy".to_string()
            } else {
                format!("UNHEALTHY: {}", w.error)
            };
            writeln!(out, "• {} ({}, {}) - {}", w.webhook_name, w.webhook_type, w.name, state)?;
        }
        writeln!(out)?;
    }

    if !report.recommendations.is_empty() {
        writeln!(out, "RECOMMENDATION")?;
        for rec in &report.recommendations {
            writeln!(out, "{}", rec)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_plan(
    out: &mut dyn Write,
    report: &DiagnosisReport,
    plan: &Plan,
    verbose: bool,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "REMEDIATION PLAN: {} {:?}", plan.target.kind, plan.target.name)?;
    writeln!(out, "{}", rule(RULE_WIDE))?;

    if report.is_healthy() {
        return not_terminating(out, &plan.target.kind, &plan.target.name);
    }
    writeln!(out)?;

    field(out, "Risk Level:", plan.risk_level.as_str().to_uppercase())?;
    field(out, "Max Escalation:", plan.max_escalation)?;
    writeln!(out)?;

    if has_force_actions(&plan.actions) {
        writeln!(
            out,
            "⚠️  WARNING: This plan includes Level 3+ actions that require --allow-force"
        )?;
        writeln!(out)?;
    }

    if plan.is_empty() {
        writeln!(out, "No actions required.")?;
        return writeln!(out);
    }

    writeln!(out, "ACTIONS ({} steps)", plan.len())?;
    let mut table = Table::new(&["#", "Level", "Target", "Action", "Risk"]);
    for (i, action) in plan.actions.iter().enumerate() {
        let mut risk = action.risk.as_str().to_string();
        if action.requires_force {
            risk.push_str(" (force req'd)");
        }
        table.row(vec![
            (i + 1).to_string(),
            action.escalation_level.short(),
            truncate(&action.target.to_string(), 40),
            action.action_type.to_string(),
            risk,
        ]);
    }
    table.print(out)?;
    writeln!(out)?;

    if verbose && !plan.commands.is_empty() {
        writeln!(out, "KUBECTL COMMANDS")?;
        for (i, cmd) in plan.commands.iter().enumerate() {
            writeln!(out, "# Step {}", i + 1)?;
            writeln!(out, "{}", cmd)?;
            writeln!(out)?;
        }
    }

    writeln!(out, "To execute: unstuck apply {} {}", report.target_type, plan.target.name)?;
    writeln!(
        out,
        "To dry-run: unstuck apply {} {} --dry-run",
        report.target_type, plan.target.name
    )?;
    writeln!(out)
}

/// Banner printed before the apply loop starts.
pub fn apply_banner(plan: &Plan) -> String {
    if plan.is_empty() {
        "✅ No remediation actions needed - resource is healthy or will delete naturally".to_string()
    } else {
        format!(
            "📋 Remediation Plan: {} actions (max risk: {})",
            plan.len(),
            plan.risk_level.as_str().to_uppercase()
        )
    }
}

pub fn write_apply_result(
    out: &mut dyn Write,
    result: &ApplyResult,
    verbose: bool,
) -> io::Result<()> {
    writeln!(out, "RESULT SUMMARY")?;
    writeln!(out, "{}", rule(RULE_NARROW))?;
    writeln!(out)?;

    let millis = (result.end_time - result.start_time).num_milliseconds().max(0);
    field(out, "Total Actions:", result.total_actions)?;
    field(out, "Succeeded:", result.succeeded)?;
    field(out, "Failed:", result.failed)?;
    field(out, "Skipped:", result.skipped)?;
    field(out, "Duration:", format!("{:.1}s", millis as f64 / 1000.0))?;
    writeln!(out)?;

    if result.deadline_exceeded {
        writeln!(out, "⏱  Overall timeout reached before all actions ran")?;
    }
    match result.exit_code {
        0 => writeln!(out, "✅ All actions completed successfully")?,
        1 => writeln!(out, "❌ All actions failed")?,
        _ => writeln!(out, "⚠️  Partial success - some actions failed")?,
    }

    let failures: Vec<_> = result.failures().collect();
    if !failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "FAILED ACTIONS")?;
        for r in &failures {
            writeln!(out, "• {}: {}", r.action.description, r.error)?;
            if let Some(hook) = extract_webhook_name(&r.error) {
                for line in webhook_guidance(&hook, None).lines() {
                    writeln!(out, "    {}", line)?;
                }
            }
        }
    }

    if verbose {
        let audited: Vec<_> = result
            .actions
            .iter()
            .filter(|r| r.before.is_some() || r.after.is_some())
            .collect();
        if !audited.is_empty() {
            writeln!(out)?;
            writeln!(out, "STATE CHANGES")?;
            for r in audited {
                writeln!(out, "• {}", r.action.target)?;
                if let Some(before) = &r.before {
                    writeln!(out, "  before: {}", serde_json::to_string(before).unwrap_or_default())?;
                }
                if let Some(after) = &r.after {
                    writeln!(out, "  after:  {}", serde_json::to_string(after).unwrap_or_default())?;
                }
            }
        }
    }
    writeln!(out)
}

pub fn write_webhooks(out: &mut dyn Write, webhooks: &[WebhookInfo]) -> io::Result<()> {
    if webhooks.is_empty() {
        return writeln!(out, "No applicable webhooks found.");
    }
    let unhealthy = webhooks.iter().filter(|w| !w.healthy).count();

    writeln!(out, "WEBHOOK STATUS")?;
    writeln!(out, "{}", rule(RULE_WIDE))?;
    writeln!(out)?;
    field(out, "Total:", webhooks.len())?;
    field(out, "Healthy:", webhooks.len() - unhealthy)?;
    if unhealthy > 0 {
        field(out, "Unhealthy:", unhealthy)?;
    }
    writeln!(out)?;

    let mut table = Table::new(&["Name", "Type", "Status", "Policy", "Service"]);
    for w in webhooks {
        let status = if w.healthy {
            "✓ Healthy".to_string()
        } else {
            truncate(&format!("✗ {}", w.error), 30)
        };
        let service = if w.service_ref.is_empty() {
            "(URL)".to_string()
        } else {
            w.service_ref.clone()
        };
        table.row(vec![
            w.webhook_name.clone(),
            w.webhook_type.clone(),
            status,
            w.failure_policy.clone(),
            service,
        ]);
    }
    table.print(out)?;
    writeln!(out)?;

    if unhealthy > 0 {
        writeln!(out, "⚠️  UNHEALTHY WEBHOOKS MAY BLOCK OPERATIONS")?;
        writeln!(out)?;
        writeln!(
            out,
            "Webhooks with FailurePolicy=Fail will block API operations when unhealthy."
        )?;
        writeln!(
            out,
            "Consider checking the webhook service health or temporarily disabling the webhook."
        )?;
        writeln!(out)?;
    }
    Ok(())
}
