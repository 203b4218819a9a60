//! Cluster inspection.
//!
//! Each detector reads one kind of target and returns a [`DiagnosisReport`].
//! Detectors only read; nothing here mutates cluster state.

pub mod crd;
pub mod namespace;
pub mod resource;
pub mod webhook;

use std::collections::BTreeSet;

use tracing::debug;
use unstuck_common::{Blocker, DiagnosisReport, Error, ResourceRef, Result, TargetType};

pub use crd::CrdDetector;
pub use namespace::NamespaceDetector;
pub use resource::{ResolvedType, ResourceDetector, DEFAULT_NAMESPACE};
pub use webhook::{
    classify_webhook_error, extract_webhook_name, webhook_guidance, WebhookDetector,
    WebhookErrorKind,
};

use crate::action::gvr::resolve_gvr;
use crate::kube::{
    ClusterClient, DynamicObject, Gvr, HasDeletionTimestamp, HasFinalizers, HasOwnerReferences,
    TargetKind,
};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::plan::OwnerEdges;

/// What the user asked to diagnose, as typed on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSpec {
    /// `namespace`, `ns`, `crd`, `customresourcedefinition`, or any resource type name.
    pub target_type: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl TargetSpec {
    pub fn new(target_type: impl Into<String>, name: impl Into<String>) -> Self {
        TargetSpec {
            target_type: target_type.into(),
            name: name.into(),
            namespace: None,
        }
    }

    pub fn in_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn kind(&self) -> TargetType {
        match self.target_type.to_lowercase().as_str() {
            "namespace" | "ns" => TargetType::Namespace,
            "crd" | "customresourcedefinition" => TargetType::Crd,
            _ => TargetType::Resource,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.target_type.trim().is_empty() {
            return Err(Error::InvalidInput("target type is required".to_string()));
        }
        if self.name.trim().is_empty() {
            let what = match self.kind() {
                TargetType::Namespace => "namespace",
                TargetType::Crd => "CRD",
                TargetType::Resource => "resource",
            };
            return Err(Error::InvalidInput(format!("{} name is required", what)));
        }
        Ok(())
    }
}

/// Run the detector for `spec`, optionally attaching matching webhooks.
pub fn diagnose<C: ClusterClient + ?Sized>(
    client: &C,
    spec: &TargetSpec,
    check_webhooks: bool,
    ctx: &LogContext,
) -> Result<DiagnosisReport> {
    spec.validate()?;
    log_event!(
        ctx,
        INFO,
        event_names::DIAGNOSE_STARTED,
        Stage::Diagnose,
        "Diagnosing target",
        target_type = spec.target_type.as_str(),
        name = spec.name.as_str()
    );

    let mut report = match spec.kind() {
        TargetType::Namespace => NamespaceDetector::new(client)
            .with_context(ctx.clone())
            .detect(&spec.name)?,
        TargetType::Crd => CrdDetector::new(client).detect(&spec.name)?,
        TargetType::Resource => ResourceDetector::new(client).detect(
            &spec.target_type,
            &spec.name,
            spec.namespace.as_deref(),
        )?,
    };

    if check_webhooks && !report.is_healthy() {
        report.webhook_issues = find_webhooks(client, &report);
    }

    log_event!(
        ctx,
        INFO,
        event_names::DIAGNOSE_FINISHED,
        Stage::Diagnose,
        "Diagnosis complete",
        status = report.status.as_str(),
        blockers = report.blockers.len(),
        discovery_failures = report.discovery_failures.len(),
        webhooks = report.webhook_issues.len()
    );
    Ok(report)
}

/// Webhooks covering the target's type or any blocker's type. Errors are advisory.
fn find_webhooks<C: ClusterClient + ?Sized>(
    client: &C,
    report: &DiagnosisReport,
) -> Vec<unstuck_common::WebhookInfo> {
    let mut gvrs = BTreeSet::new();
    if let Ok(kind) = TargetKind::resolve(&report.target) {
        gvrs.insert(kind.gvr());
    }
    gvrs.extend(
        report
            .blockers
            .iter()
            .filter_map(|b| resolve_gvr(&b.resource).ok()),
    );

    let detector = WebhookDetector::new(client);
    let mut seen = BTreeSet::new();
    let mut found = Vec::new();
    for gvr in &gvrs {
        match detector.find_matching(gvr) {
            Ok(hooks) => found.extend(
                hooks
                    .into_iter()
                    .filter(|h| seen.insert((h.name.clone(), h.webhook_name.clone()))),
            ),
            Err(e) => debug!(resource = %gvr, error = %e, "webhook listing failed"),
        }
    }
    found
}

/// Blocker for a listed object; `kind` fills in when the list items omit it.
pub(crate) fn blocker_from(object: &DynamicObject, gvr: &Gvr, kind: &str) -> Blocker {
    let kind = match object.kind() {
        "" => kind,
        k => k,
    };
    let api_version = match object.api_version() {
        "" => gvr.group_version(),
        v => v.to_string(),
    };
    let mut resource = ResourceRef::new(kind, api_version, object.name());
    if !object.namespace().is_empty() {
        resource = resource.in_namespace(object.namespace());
    }
    let mut blocker = Blocker::new(resource).with_finalizers(object.finalizers());
    blocker.deletion_timestamp = object.deletion_timestamp();
    blocker.owner_references = object.owner_references();
    blocker
}

/// Child → owners key map over the report's blockers, for dependency ordering.
///
/// Only owners that are themselves blockers are kept; owners inherit the
/// child's namespace.
pub fn owner_edges(report: &DiagnosisReport) -> OwnerEdges {
    let keys: BTreeSet<String> = report.blockers.iter().map(|b| b.resource.key()).collect();
    let mut edges = OwnerEdges::new();
    for blocker in &report.blockers {
        let owners: Vec<String> = blocker
            .owner_references
            .iter()
            .map(|owner| {
                ResourceRef::new(&owner.kind, &owner.api_version, &owner.name)
                    .in_namespace(&blocker.resource.namespace)
                    .key()
            })
            .filter(|key| keys.contains(key))
            .collect();
        if !owners.is_empty() {
            edges.entry(blocker.resource.key()).or_default().extend(owners);
        }
    }
    edges
}
