//! Cluster object representations.
//!
//! Namespaces and CRDs get typed structs; everything else is a
//! [`DynamicObject`] over raw JSON. All three expose the same metadata
//! capabilities so the executor and detectors never care which one they hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unstuck_common::{Error, OwnerReference, Result};

/// Objects that carry `metadata.finalizers`.
pub trait HasFinalizers {
    fn finalizers(&self) -> Vec<String>;

    fn has_finalizers(&self) -> bool {
        !self.finalizers().is_empty()
    }
}

/// Objects that carry `metadata.deletionTimestamp`.
pub trait HasDeletionTimestamp {
    fn deletion_timestamp(&self) -> Option<DateTime<Utc>>;

    fn is_deleting(&self) -> bool {
        self.deletion_timestamp().is_some()
    }
}

/// Objects that carry `metadata.ownerReferences`.
pub trait HasOwnerReferences {
    fn owner_references(&self) -> Vec<OwnerReference>;
}

/// The subset of `metadata` unstuck reads; everything else is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

macro_rules! impl_meta_capabilities {
    ($ty:ty) => {
        impl HasFinalizers for $ty {
            fn finalizers(&self) -> Vec<String> {
                self.metadata.finalizers.clone()
            }
        }

        impl HasDeletionTimestamp for $ty {
            fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
                self.metadata.deletion_timestamp
            }
        }

        impl HasOwnerReferences for $ty {
            fn owner_references(&self) -> Vec<OwnerReference> {
                self.metadata.owner_references.clone()
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceObject {
    #[serde(default = "default_v1")]
    pub api_version: String,
    #[serde(default = "namespace_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: NamespaceSpec,
    #[serde(default)]
    pub status: NamespaceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceSpec {
    /// Spec-level finalizers (e.g. `kubernetes`), cleared only through the finalize endpoint.
    #[serde(default)]
    pub finalizers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<NamespaceCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

fn default_v1() -> String {
    "v1".to_string()
}

fn namespace_kind() -> String {
    "Namespace".to_string()
}

impl NamespaceObject {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn phase(&self) -> &str {
        &self.status.phase
    }

    pub fn is_terminating(&self) -> bool {
        self.status.phase == "Terminating"
    }

    /// Copy of this namespace with `spec.finalizers` emptied, as sent to the finalize endpoint.
    pub fn with_cleared_spec_finalizers(&self) -> Self {
        let mut ns = self.clone();
        ns.spec.finalizers.clear();
        ns
    }
}

impl_meta_capabilities!(NamespaceObject);

// ---------------------------------------------------------------------------
// CustomResourceDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdObject {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: CrdSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrdSpec {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub names: CrdNames,
    /// `Namespaced` or `Cluster`.
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub versions: Vec<CrdVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdNames {
    #[serde(default)]
    pub plural: String,
    #[serde(default)]
    pub singular: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrdVersion {
    pub name: String,
    #[serde(default)]
    pub served: bool,
    #[serde(default)]
    pub storage: bool,
}

/// Finalizer the API server puts on CRDs until all instances are gone.
pub const CRD_CLEANUP_FINALIZER: &str = "customresourcecleanup.apiextensions.k8s.io";

impl CrdObject {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Storage version, else the first listed version, else `v1`.
    pub fn storage_version(&self) -> String {
        self.spec
            .versions
            .iter()
            .find(|v| v.storage)
            .or_else(|| self.spec.versions.first())
            .map(|v| v.name.clone())
            .unwrap_or_else(|| "v1".to_string())
    }

    pub fn is_namespaced(&self) -> bool {
        self.spec.scope == "Namespaced"
    }

    pub fn has_cleanup_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .iter()
            .any(|f| f == CRD_CLEANUP_FINALIZER)
    }
}

impl_meta_capabilities!(CrdObject);

// ---------------------------------------------------------------------------
// Dynamic
// ---------------------------------------------------------------------------

/// Any API object, held as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DynamicObject(pub serde_json::Value);

impl DynamicObject {
    pub fn new(value: serde_json::Value) -> Self {
        DynamicObject(value)
    }

    fn meta_str(&self, field: &str) -> &str {
        self.0["metadata"][field].as_str().unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.meta_str("name")
    }

    /// Empty for cluster-scoped objects.
    pub fn namespace(&self) -> &str {
        self.meta_str("namespace")
    }

    pub fn kind(&self) -> &str {
        self.0["kind"].as_str().unwrap_or("")
    }

    pub fn api_version(&self) -> &str {
        self.0["apiVersion"].as_str().unwrap_or("")
    }

    /// `status.phase`, if the object has one.
    pub fn phase(&self) -> Option<&str> {
        self.0["status"]["phase"].as_str()
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decode into a typed object.
    pub fn decode<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.0).map_err(Error::from)
    }
}

impl HasFinalizers for DynamicObject {
    fn finalizers(&self) -> Vec<String> {
        self.0["metadata"]["finalizers"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|f| f.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl HasDeletionTimestamp for DynamicObject {
    fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
        self.meta_str("deletionTimestamp")
            .parse::<DateTime<Utc>>()
            .ok()
    }
}

impl HasOwnerReferences for DynamicObject {
    fn owner_references(&self) -> Vec<OwnerReference> {
        self.0["metadata"]
            .get("ownerReferences")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}
