//! Cluster access.
//!
//! Everything above this module talks to the cluster through
//! [`ClusterClient`]. Production code uses [`kubectl::KubectlClient`]; tests
//! use the in-memory [`fake::FakeCluster`].

pub mod admission;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
pub mod kubectl;
pub mod object;
pub mod runner;

use std::fmt;

use serde::{Deserialize, Serialize};
use unstuck_common::{Error, ResourceRef, Result};

use crate::action::gvr::resolve_gvr;
pub use admission::{WebhookConfiguration, WebhookKind};
pub use object::{
    CrdObject, DynamicObject, HasDeletionTimestamp, HasFinalizers, HasOwnerReferences,
    NamespaceCondition, NamespaceObject, CRD_CLEANUP_FINALIZER,
};

/// Group/version/resource coordinate of an API type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvr {
    /// Empty for the core group.
    pub group: String,
    pub version: String,
    /// Lower-case plural, e.g. `deployments`.
    pub resource: String,
}

impl Gvr {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Gvr {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    pub fn namespaces() -> Self {
        Gvr::new("", "v1", "namespaces")
    }

    pub fn crds() -> Self {
        Gvr::new("apiextensions.k8s.io", "v1", "customresourcedefinitions")
    }

    pub fn services() -> Self {
        Gvr::new("", "v1", "services")
    }

    pub fn endpoints() -> Self {
        Gvr::new("", "v1", "endpoints")
    }

    /// `v1` for the core group, otherwise `group/version`.
    pub fn group_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Parse `group/version` (or bare `version`) plus a resource name.
    pub fn from_group_version(group_version: &str, resource: impl Into<String>) -> Self {
        match group_version.split_once('/') {
            Some((group, version)) => Gvr::new(group, version, resource),
            None => Gvr::new("", group_version, resource),
        }
    }
}

impl fmt::Display for Gvr {
    /// Fully qualified kubectl form: `resource.version.group`, or `resource` for core v1.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            if self.version == "v1" || self.version.is_empty() {
                write!(f, "{}", self.resource)
            } else {
                write!(f, "{}.{}", self.resource, self.version)
            }
        } else {
            write!(f, "{}.{}.{}", self.resource, self.version, self.group)
        }
    }
}

/// How a target is addressed, resolved once from its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    Namespace,
    CustomResourceDefinition,
    Generic(Gvr),
}

impl TargetKind {
    pub fn resolve(target: &ResourceRef) -> Result<Self> {
        match target.kind.as_str() {
            "Namespace" => Ok(TargetKind::Namespace),
            "CustomResourceDefinition" => Ok(TargetKind::CustomResourceDefinition),
            _ => resolve_gvr(target).map(TargetKind::Generic),
        }
    }

    pub fn gvr(&self) -> Gvr {
        match self {
            TargetKind::Namespace => Gvr::namespaces(),
            TargetKind::CustomResourceDefinition => Gvr::crds(),
            TargetKind::Generic(gvr) => gvr.clone(),
        }
    }

    /// Namespaces and CRDs are cluster-scoped whatever the reference says.
    pub fn scope<'a>(&self, namespace: Option<&'a str>) -> Option<&'a str> {
        match self {
            TargetKind::Generic(_) => namespace,
            _ => None,
        }
    }
}

/// One entry of an API resource list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    pub name: String,
    #[serde(default)]
    pub singular_name: String,
    #[serde(default)]
    pub namespaced: bool,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub short_names: Vec<String>,
}

impl ApiResource {
    pub fn is_subresource(&self) -> bool {
        self.name.contains('/')
    }

    pub fn supports(&self, verb: &str) -> bool {
        self.verbs.iter().any(|v| v == verb)
    }

    /// Case-insensitive match on plural, singular, short names or kind.
    pub fn matches_name(&self, wanted: &str) -> bool {
        let wanted = wanted.to_lowercase();
        self.name == wanted
            || self.singular_name == wanted
            || self.kind.to_lowercase() == wanted
            || self.short_names.iter().any(|s| s.to_lowercase() == wanted)
    }
}

/// Resources served under one group/version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceList {
    pub group_version: String,
    #[serde(default)]
    pub resources: Vec<ApiResource>,
}

/// What discovery returned. `partial_error` is set when some groups failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    pub lists: Vec<ApiResourceList>,
    pub partial_error: Option<String>,
}

impl DiscoveryResult {
    /// Every `(gvr, resource)` pair across all lists.
    pub fn resources(&self) -> impl Iterator<Item = (Gvr, &ApiResource)> {
        self.lists.iter().flat_map(|list| {
            list.resources
                .iter()
                .map(move |r| (Gvr::from_group_version(&list.group_version, &r.name), r))
        })
    }
}

/// Discovery errors with these substrings still returned usable results.
pub fn is_partial_discovery_error(message: &str) -> bool {
    message.contains("unable to retrieve the complete list")
        || message.contains("couldn't get resource list for")
}

/// Cluster capability consumed by the detectors and the executor.
///
/// Implementors supply the generic object primitives; typed accessors and
/// kind dispatch come for free.
pub trait ClusterClient {
    fn get_object(&self, gvr: &Gvr, namespace: Option<&str>, name: &str)
        -> Result<DynamicObject>;

    /// `namespace = None` lists across all namespaces.
    fn list_objects(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<Vec<DynamicObject>>;

    fn list_api_resources(&self) -> Result<DiscoveryResult>;

    fn patch_object(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<()>;

    fn delete_object(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Result<()>;

    /// Submit `namespace` to the finalize sub-resource.
    fn finalize_namespace(&self, namespace: &NamespaceObject) -> Result<()>;

    fn get_namespace(&self, name: &str) -> Result<NamespaceObject> {
        self.get_object(&Gvr::namespaces(), None, name)?.decode()
    }

    fn get_crd(&self, name: &str) -> Result<CrdObject> {
        self.get_object(&Gvr::crds(), None, name)?.decode()
    }

    /// JSON merge-patch through the client matching `kind`.
    fn patch_merge(
        &self,
        kind: &TargetKind,
        namespace: Option<&str>,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<()> {
        self.patch_object(&kind.gvr(), kind.scope(namespace), name, body)
    }

    fn delete(&self, kind: &TargetKind, namespace: Option<&str>, name: &str) -> Result<()> {
        self.delete_object(&kind.gvr(), kind.scope(namespace), name)
    }

    fn list_webhook_configurations(&self, kind: WebhookKind) -> Result<Vec<WebhookConfiguration>> {
        self.list_objects(&kind.gvr(), None)?
            .into_iter()
            .map(DynamicObject::decode)
            .collect()
    }

    fn get_service(&self, namespace: &str, name: &str) -> Result<DynamicObject> {
        self.get_object(&Gvr::services(), Some(namespace), name)
    }

    fn get_endpoints(&self, namespace: &str, name: &str) -> Result<DynamicObject> {
        self.get_object(&Gvr::endpoints(), Some(namespace), name)
    }
}

/// Map a missing object to `Ok(None)`.
pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Convenience for callers that need a not-found error for a GVR.
pub fn not_found(gvr: &Gvr, name: &str) -> Error {
    Error::not_found(gvr.resource.clone(), name)
}
