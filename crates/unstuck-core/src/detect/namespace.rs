//! Namespaces stuck in `Terminating`.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;
use unstuck_common::{
    Blocker, ConditionSummary, DiagnosisReport, DiscoveryFailure, ResourceRef, Result, TargetType,
};

use super::blocker_from;
use crate::kube::{
    ClusterClient, HasDeletionTimestamp, HasFinalizers, NamespaceCondition, NamespaceObject,
};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

pub const CONDITION_DISCOVERY_FAILURE: &str = "NamespaceDeletionDiscoveryFailure";
pub const CONDITION_FINALIZERS_REMAINING: &str = "NamespaceFinalizersRemaining";
pub const CONDITION_CONTENT_REMAINING: &str = "NamespaceContentRemaining";

fn group_version_pattern() -> &'static Regex {
    static GV: OnceLock<Regex> = OnceLock::new();
    GV.get_or_init(|| Regex::new(r"([a-zA-Z0-9.-]+/v[a-zA-Z0-9]+)").expect("static group/version pattern"))
}

/// Distinct `group/version` strings named in a condition message, in order of appearance.
pub fn group_versions_in(message: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    group_version_pattern()
        .find_iter(message)
        .map(|m| m.as_str().to_string())
        .filter(|gv| seen.insert(gv.clone()))
        .collect()
}

pub struct NamespaceDetector<'a, C: ClusterClient + ?Sized> {
    client: &'a C,
    ctx: LogContext,
    now: DateTime<Utc>,
}

impl<'a, C: ClusterClient + ?Sized> NamespaceDetector<'a, C> {
    pub fn new(client: &'a C) -> Self {
        NamespaceDetector {
            client,
            ctx: LogContext::new("", ""),
            now: Utc::now(),
        }
    }

    pub fn with_context(mut self, ctx: LogContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Fix "now" for `terminating_for`.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn detect(&self, name: &str) -> Result<DiagnosisReport> {
        let ns = self.client.get_namespace(name)?;
        let mut report =
            DiagnosisReport::new(ResourceRef::new("Namespace", "v1", name), TargetType::Namespace);
        report.status = ns.phase().to_string();
        report.finalizers = ns
            .spec
            .finalizers
            .iter()
            .cloned()
            .chain(ns.finalizers())
            .collect();

        if !ns.is_terminating() {
            report.recommendations.push(format!(
                "Namespace {:?} is not in Terminating state. No remediation needed.",
                name
            ));
            return Ok(report);
        }

        report.mark_terminating(ns.deletion_timestamp(), self.now);
        report.conditions = ns.status.conditions.iter().map(summarize).collect();
        self.analyze_conditions(&ns, &mut report);
        report.blockers = self.find_blockers(name, &mut report);
        report.recommendations = recommendations(name, &report);
        Ok(report)
    }

    fn analyze_conditions(&self, ns: &NamespaceObject, report: &mut DiagnosisReport) {
        let active: Vec<&NamespaceCondition> = ns
            .status
            .conditions
            .iter()
            .filter(|c| c.status == "True")
            .collect();
        let find = |t: &str| active.iter().find(|c| c.condition_type == t);

        if let Some(cond) = find(CONDITION_DISCOVERY_FAILURE) {
            report.root_cause = "Discovery failures - CRD may have been deleted".to_string();
            report.discovery_failures.extend(group_versions_in(&cond.message).into_iter().map(
                |gv| DiscoveryFailure {
                    group_version: gv,
                    resource: String::new(),
                    error: "API group not found (CRD likely deleted)".to_string(),
                },
            ));
        } else if find(CONDITION_FINALIZERS_REMAINING).is_some() {
            report.root_cause = "CR instances stuck with unsatisfied finalizers".to_string();
        } else if find(CONDITION_CONTENT_REMAINING).is_some() {
            report.root_cause = "Resources remaining in namespace".to_string();
        } else {
            report.root_cause = "Namespace finalizer blocking deletion".to_string();
        }
    }

    /// Every object in the namespace with finalizers or a deletion timestamp.
    fn find_blockers(&self, name: &str, report: &mut DiagnosisReport) -> Vec<Blocker> {
        let discovery = match self.client.list_api_resources() {
            Ok(d) => d,
            Err(e) => {
                report.discovery_failures.push(DiscoveryFailure {
                    group_version: "unknown".to_string(),
                    resource: String::new(),
                    error: e.to_string(),
                });
                return Vec::new();
            }
        };
        if let Some(partial) = discovery.partial_error.as_deref() {
            log_event!(
                self.ctx,
                WARN,
                event_names::DIAGNOSE_PARTIAL_DISCOVERY,
                Stage::Diagnose,
                "Continuing with partial API discovery",
                error = partial
            );
        }

        let mut blockers = Vec::new();
        for (gvr, resource) in discovery.resources() {
            if !resource.namespaced || resource.is_subresource() || !resource.supports("list") {
                continue;
            }
            let objects = match self.client.list_objects(&gvr, Some(name)) {
                Ok(objects) => objects,
                Err(e) => {
                    debug!(resource = %gvr, error = %e, "skipping unlistable resource");
                    continue;
                }
            };
            blockers.extend(
                objects
                    .iter()
                    .filter(|o| o.has_finalizers() || o.is_deleting())
                    .map(|o| blocker_from(o, &gvr, &resource.kind)),
            );
        }
        blockers.sort_by_key(|b| b.resource.key());
        blockers
    }
}

fn summarize(c: &NamespaceCondition) -> ConditionSummary {
    ConditionSummary {
        condition_type: c.condition_type.clone(),
        status: c.status.clone(),
        reason: c.reason.clone(),
        message: c.message.clone(),
    }
}

fn recommendations(name: &str, report: &DiagnosisReport) -> Vec<String> {
    let mut recs = Vec::new();
    if report.has_discovery_failures() {
        recs.push(format!(
            "Discovery failures detected. CRDs may have been deleted. Use `unstuck plan namespace {} --max-escalation=4 --allow-force`",
            name
        ));
    }
    let terminating = report.blockers.iter().filter(|b| b.is_terminating()).count();
    if terminating > 0 {
        recs.push(format!(
            "{} resources are stuck in Terminating. Use `unstuck plan namespace {}` to generate remediation steps.",
            terminating, name
        ));
    } else if report.has_blockers() {
        recs.push(format!(
            "{} resources have finalizers. Use `unstuck plan namespace {}` to see remediation options.",
            report.blockers.len(),
            name
        ));
    }
    if recs.is_empty() {
        recs.push(
            "Unable to determine specific blockers. The namespace finalizer may need force removal."
                .to_string(),
        );
    }
    recs
}
