//! Resource references and blocking resources.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifies a Kubernetes API object.
///
/// An empty `namespace` means the object is cluster-scoped.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub kind: String,
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    /// Create a cluster-scoped reference.
    pub fn new(
        kind: impl Into<String>,
        api_version: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ResourceRef {
            kind: kind.into(),
            api_version: api_version.into(),
            namespace: String::new(),
            name: name.into(),
        }
    }

    /// Set the namespace.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The namespace, if the object is namespaced.
    pub fn namespace(&self) -> Option<&str> {
        if self.namespace.is_empty() {
            None
        } else {
            Some(&self.namespace)
        }
    }

    /// Ordering and owner-graph key: `kind/namespace/name` or `kind/name`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Back-reference from a child object to its owner.
///
/// Used only as an ordering hint; unstuck never manages lifetimes through it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
}

/// A resource whose existence or finalizers keep a parent from being deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Blocker {
    #[serde(flatten)]
    pub resource: ResourceRef,
    #[serde(default)]
    pub finalizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl Blocker {
    pub fn new(resource: ResourceRef) -> Self {
        Blocker {
            resource,
            ..Default::default()
        }
    }

    pub fn with_finalizers<I, S>(mut self, finalizers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.finalizers = finalizers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deletion_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.deletion_timestamp = Some(ts);
        self
    }

    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Time since deletion was requested, zero when not terminating.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        self.deletion_timestamp
            .map(|ts| now.signed_duration_since(ts).max(Duration::zero()))
            .unwrap_or_else(Duration::zero)
    }

    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn display_includes_namespace_only_when_set() {
        let pod = ResourceRef::new("Pod", "v1", "web-0").in_namespace("shop");
        assert_eq!(pod.to_string(), "Pod/shop/web-0");
        assert_eq!(pod.key(), "Pod/shop/web-0");

        let ns = ResourceRef::new("Namespace", "v1", "shop");
        assert_eq!(ns.to_string(), "Namespace/shop");
        assert_eq!(ns.namespace(), None);
    }

    #[test]
    fn equality_requires_all_fields() {
        let a = ResourceRef::new("Pod", "v1", "web-0").in_namespace("shop");
        let b = ResourceRef::new("Pod", "v1", "web-0").in_namespace("shop");
        let c = ResourceRef::new("Pod", "v1beta1", "web-0").in_namespace("shop");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn blocker_age_is_zero_without_deletion_timestamp() {
        let blocker = Blocker::new(ResourceRef::new("Pod", "v1", "p"));
        assert!(!blocker.is_terminating());
        assert_eq!(blocker.age(), Duration::zero());
    }

    #[test]
    fn blocker_age_measures_from_deletion() {
        let deleted = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        let blocker =
            Blocker::new(ResourceRef::new("Pod", "v1", "p")).with_deletion_timestamp(deleted);
        assert!(blocker.is_terminating());
        assert_eq!(blocker.age_at(now), Duration::hours(2));
    }

    #[test]
    fn blocker_serializes_flattened_ref() {
        let blocker = Blocker::new(ResourceRef::new("Certificate", "cert-manager.io/v1", "tls"))
            .with_finalizers(["cert-manager.io/cleanup"]);
        let json = serde_json::to_value(&blocker).unwrap();
        assert_eq!(json["kind"], "Certificate");
        assert_eq!(json["apiVersion"], "cert-manager.io/v1");
        assert_eq!(json["finalizers"][0], "cert-manager.io/cleanup");
        assert!(json.get("namespace").is_none());
    }
}
