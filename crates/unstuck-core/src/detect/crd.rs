//! CustomResourceDefinitions stuck on instance cleanup.

use chrono::{DateTime, Utc};
use unstuck_common::{DiagnosisReport, DiscoveryFailure, ResourceRef, Result, TargetType};

use super::blocker_from;
use crate::kube::{ClusterClient, CrdObject, Gvr, HasDeletionTimestamp, HasFinalizers};

pub struct CrdDetector<'a, C: ClusterClient + ?Sized> {
    client: &'a C,
    now: DateTime<Utc>,
}

impl<'a, C: ClusterClient + ?Sized> CrdDetector<'a, C> {
    pub fn new(client: &'a C) -> Self {
        CrdDetector {
            client,
            now: Utc::now(),
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn detect(&self, name: &str) -> Result<DiagnosisReport> {
        let crd = self.client.get_crd(name)?;
        let mut report = DiagnosisReport::new(
            ResourceRef::new("CustomResourceDefinition", "apiextensions.k8s.io/v1", name),
            TargetType::Crd,
        );
        report.finalizers = crd.finalizers();

        if !crd.is_deleting() {
            report.status = "Active".to_string();
            return Ok(report);
        }
        report.mark_terminating(crd.deletion_timestamp(), self.now);
        report.root_cause = root_cause(&crd);

        self.count_instances(&crd, &mut report);
        report.recommendations = recommendations(name, &crd, &report);
        Ok(report)
    }

    fn count_instances(&self, crd: &CrdObject, report: &mut DiagnosisReport) {
        let gvr = Gvr::new(
            crd.spec.group.clone(),
            crd.storage_version(),
            crd.spec.names.plural.clone(),
        );
        let instances = match self.client.list_objects(&gvr, None) {
            Ok(instances) => instances,
            Err(e) => {
                report.discovery_failures.push(DiscoveryFailure {
                    group_version: gvr.group_version(),
                    resource: gvr.resource.clone(),
                    error: e.to_string(),
                });
                return;
            }
        };

        report.instance_count = instances.len();
        for instance in &instances {
            if crd.is_namespaced() {
                *report
                    .instances_by_namespace
                    .entry(instance.namespace().to_string())
                    .or_default() += 1;
            }
            report
                .blockers
                .push(blocker_from(instance, &gvr, &crd.spec.names.kind));
        }
        report.blockers.sort_by_key(|b| b.resource.key());
    }
}

fn root_cause(crd: &CrdObject) -> String {
    if crd.has_cleanup_finalizer() {
        return "CRD cleanup finalizer waiting for instance deletion".to_string();
    }
    let custom = crd.finalizers();
    if custom.is_empty() {
        "Unknown - CRD may be waiting for API server processing".to_string()
    } else {
        format!("CRD has custom finalizers: {:?}", custom)
    }
}

fn recommendations(name: &str, crd: &CrdObject, report: &DiagnosisReport) -> Vec<String> {
    let mut recs = Vec::new();
    if report.instance_count > 0 {
        recs.push(format!(
            "{} CR instances remain across {} namespaces. Remove finalizers from instances first, then CRD will auto-delete.",
            report.instance_count,
            report.instances_by_namespace.len()
        ));
        recs.push(format!("Use `unstuck plan crd {}` to generate steps.", name));
    } else if crd.has_cleanup_finalizer() {
        recs.push(
            "CRD has cleanup finalizer but no instances found. May need force removal.".to_string(),
        );
        recs.push(format!(
            "Use `unstuck plan crd {} --max-escalation=3 --allow-force`",
            name
        ));
    }
    recs
}
