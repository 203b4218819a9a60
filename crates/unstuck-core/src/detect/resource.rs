//! Any other API object stuck in deletion.

use chrono::{DateTime, Utc};
use unstuck_common::{Blocker, DiagnosisReport, Error, ResourceRef, Result, TargetType};

use crate::kube::{ClusterClient, Gvr, HasDeletionTimestamp, HasFinalizers, HasOwnerReferences};

/// Namespace used for a namespaced type when none was given.
pub const DEFAULT_NAMESPACE: &str = "default";

/// A resource type resolved through discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    pub gvr: Gvr,
    pub kind: String,
    pub namespaced: bool,
}

pub struct ResourceDetector<'a, C: ClusterClient + ?Sized> {
    client: &'a C,
    now: DateTime<Utc>,
}

impl<'a, C: ClusterClient + ?Sized> ResourceDetector<'a, C> {
    pub fn new(client: &'a C) -> Self {
        ResourceDetector {
            client,
            now: Utc::now(),
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Match `resource_type` against plural, singular, kind and short names.
    pub fn resolve_type(&self, resource_type: &str) -> Result<ResolvedType> {
        let discovery = self.client.list_api_resources()?;
        let resolved = discovery
            .resources()
            .find(|(_, r)| !r.is_subresource() && r.matches_name(resource_type))
            .map(|(gvr, r)| ResolvedType {
                gvr,
                kind: r.kind.clone(),
                namespaced: r.namespaced,
            })
            .ok_or_else(|| {
                Error::Resolution(format!("unknown resource type {:?}", resource_type))
            });
        resolved
    }

    pub fn detect(
        &self,
        resource_type: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<DiagnosisReport> {
        let resolved = self.resolve_type(resource_type)?;
        let namespace = resolved
            .namespaced
            .then(|| namespace.unwrap_or(DEFAULT_NAMESPACE));
        let object = self.client.get_object(&resolved.gvr, namespace, name)?;

        let api_version = match object.api_version() {
            "" => resolved.gvr.group_version(),
            v => v.to_string(),
        };
        let mut target = ResourceRef::new(resolved.kind.clone(), api_version, name);
        if let Some(ns) = namespace {
            target = target.in_namespace(ns);
        }

        let mut report = DiagnosisReport::new(target.clone(), TargetType::Resource);
        report.finalizers = object.finalizers();

        let Some(deleted_at) = object.deletion_timestamp() else {
            report.status = "Active".to_string();
            report.recommendations.push(format!(
                "{} {:?} is not in Terminating state. No remediation needed.",
                resolved.kind, name
            ));
            return Ok(report);
        };

        report.mark_terminating(Some(deleted_at), self.now);
        report.root_cause = if report.finalizers.is_empty() {
            "Resource is terminating but has no finalizers (may be waiting for dependents)"
                .to_string()
        } else {
            format!("Resource has finalizers: {:?}", report.finalizers)
        };

        let mut blocker = Blocker::new(target.clone())
            .with_finalizers(report.finalizers.clone())
            .with_deletion_timestamp(deleted_at);
        blocker.owner_references = object.owner_references();
        report.blockers.push(blocker);

        report.recommendations.push(if report.finalizers.is_empty() {
            "Resource has no finalizers but is still terminating. Check for dependent resources or controller issues."
                .to_string()
        } else {
            let scope = namespace.map(|ns| format!(" -n {}", ns)).unwrap_or_default();
            format!(
                "Use `unstuck plan {} {}{}` to generate remediation steps.",
                resolved.kind.to_lowercase(),
                name,
                scope
            )
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::fake::FakeCluster;
    use crate::kube::ApiResource;
    use serde_json::json;

    fn cluster() -> FakeCluster {
        FakeCluster::new()
            .with_api_resources(
                "v1",
                vec![
                    ApiResource {
                        name: "persistentvolumeclaims".into(),
                        singular_name: "persistentvolumeclaim".into(),
                        kind: "PersistentVolumeClaim".into(),
                        namespaced: true,
                        short_names: vec!["pvc".into()],
                        verbs: vec!["get".into(), "list".into()],
                    },
                    ApiResource {
                        name: "persistentvolumeclaims/status".into(),
                        kind: "PersistentVolumeClaim".into(),
                        namespaced: true,
                        ..Default::default()
                    },
                    ApiResource {
                        name: "persistentvolumes".into(),
                        singular_name: "persistentvolume".into(),
                        kind: "PersistentVolume".into(),
                        short_names: vec!["pv".into()],
                        ..Default::default()
                    },
                ],
            )
    }

    fn pvcs() -> Gvr {
        Gvr::new("", "v1", "persistentvolumeclaims")
    }

    #[test]
    fn resolves_short_and_plural_names() {
        let cluster = cluster();
        let detector = ResourceDetector::new(&cluster);
        for name in ["pvc", "PVC", "persistentvolumeclaims", "PersistentVolumeClaim"] {
            let resolved = detector.resolve_type(name).unwrap();
            assert_eq!(resolved.gvr, pvcs(), "{name}");
            assert!(resolved.namespaced);
        }
        assert!(!detector.resolve_type("pv").unwrap().namespaced);
        let err = detector.resolve_type("gizmo").unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn stuck_pvc_is_its_own_blocker() {
        let cluster = cluster().with_object(
            &pvcs(),
            json!({
                "apiVersion": "v1",
                "kind": "PersistentVolumeClaim",
                "metadata": {
                    "name": "data-0",
                    "namespace": "shop",
                    "finalizers": ["kubernetes.io/pvc-protection"],
                    "deletionTimestamp": "2026-03-01T10:00:00Z"
                },
                "status": {"phase": "Bound"}
            }),
        );
        let report = ResourceDetector::new(&cluster)
            .detect("pvc", "data-0", Some("shop"))
            .unwrap();
        assert!(report.is_terminating());
        assert_eq!(report.target.key(), "PersistentVolumeClaim/shop/data-0");
        assert_eq!(report.blockers.len(), 1);
        assert_eq!(report.blockers[0].finalizers, ["kubernetes.io/pvc-protection"]);
        assert_eq!(
            report.root_cause,
            "Resource has finalizers: [\"kubernetes.io/pvc-protection\"]"
        );
        assert_eq!(
            report.recommendations,
            ["Use `unstuck plan persistentvolumeclaim data-0 -n shop` to generate remediation steps."]
        );
    }

    #[test]
    fn namespaced_type_defaults_to_default_namespace() {
        let cluster = cluster().with_object(
            &pvcs(),
            json!({"kind": "PersistentVolumeClaim",
                   "metadata": {"name": "data-0", "namespace": "default"}}),
        );
        let report = ResourceDetector::new(&cluster)
            .detect("pvc", "data-0", None)
            .unwrap();
        assert_eq!(report.status, "Active");
        assert!(report.is_healthy());
        assert_eq!(report.target.namespace, "default");
        assert_eq!(report.target.api_version, "v1");
    }

    #[test]
    fn terminating_without_finalizers() {
        let cluster = cluster().with_object(
            &Gvr::new("", "v1", "persistentvolumes"),
            json!({"kind": "PersistentVolume",
                   "metadata": {"name": "pv-1", "deletionTimestamp": "2026-03-01T10:00:00Z"}}),
        );
        let report = ResourceDetector::new(&cluster)
            .detect("pv", "pv-1", Some("ignored"))
            .unwrap();
        assert_eq!(report.target.namespace(), None);
        assert!(report.root_cause.contains("no finalizers"));
        assert!(report.recommendations[0].starts_with("Resource has no finalizers"));
    }

    #[test]
    fn missing_object_is_not_found() {
        let err = ResourceDetector::new(&cluster())
            .detect("pvc", "ghost", Some("shop"))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
