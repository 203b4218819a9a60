//! In-memory cluster for tests.
//!
//! Emulates the API server behaviors the remediation path depends on: an
//! object that is being deleted disappears once its last finalizer is
//! removed, a delete on an object with finalizers only marks it deleting,
//! and the namespace finalize call clears `spec.finalizers`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use unstuck_common::{Error, Result};

use super::{
    ApiResource, ApiResourceList, ClusterClient, DiscoveryResult, DynamicObject, Gvr,
    NamespaceObject,
};

/// Operation selector for injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FakeOp {
    Get,
    List,
    Patch,
    Delete,
    Finalize,
}

/// Number of calls per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub list: usize,
    pub discover: usize,
    pub patch: usize,
    pub delete: usize,
    pub finalize: usize,
}

impl CallCounts {
    /// Calls that could have changed cluster state.
    pub fn mutations(&self) -> usize {
        self.patch + self.delete + self.finalize
    }
}

type ObjectKey = (String, String, String);

#[derive(Debug, Default)]
struct FakeState {
    /// (resource, namespace, name) -> object
    objects: BTreeMap<ObjectKey, Value>,
    discovery: Vec<ApiResourceList>,
    partial_discovery: Option<String>,
    /// (op, resource-or-name) -> message
    failures: BTreeMap<(FakeOp, String), String>,
    sticky: BTreeSet<String>,
    calls: CallCounts,
}

/// A `ClusterClient` held entirely in memory.
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
}

fn key(gvr: &Gvr, namespace: Option<&str>, name: &str) -> ObjectKey {
    (
        gvr.resource.clone(),
        namespace.unwrap_or("").to_string(),
        name.to_string(),
    )
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A panicking test thread poisons the lock; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `object` under `gvr`, keyed by its metadata.
    pub fn insert(&self, gvr: &Gvr, object: Value) {
        let ns = object["metadata"]["namespace"].as_str().map(str::to_string);
        let name = object["metadata"]["name"].as_str().unwrap_or("").to_string();
        self.lock()
            .objects
            .insert(key(gvr, ns.as_deref(), &name), object);
    }

    pub fn with_object(self, gvr: &Gvr, object: Value) -> Self {
        self.insert(gvr, object);
        self
    }

    /// Register API resources served under `group_version`.
    pub fn with_api_resources(self, group_version: &str, resources: Vec<ApiResource>) -> Self {
        self.lock().discovery.push(ApiResourceList {
            group_version: group_version.to_string(),
            resources,
        });
        self
    }

    /// Make discovery report a partial failure alongside its results.
    pub fn with_partial_discovery(self, message: impl Into<String>) -> Self {
        self.lock().partial_discovery = Some(message.into());
        self
    }

    /// Fail `op` when it targets an object named `target` (or a resource type named `target`).
    pub fn fail_on(self, op: FakeOp, target: impl Into<String>, message: impl Into<String>) -> Self {
        self.lock()
            .failures
            .insert((op, target.into()), message.into());
        self
    }

    /// Patches against `name` succeed but leave its finalizers in place.
    pub fn with_sticky_finalizers(self, name: impl Into<String>) -> Self {
        self.lock().sticky.insert(name.into());
        self
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Current stored state of an object.
    pub fn object(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Option<Value> {
        self.lock().objects.get(&key(gvr, namespace, name)).cloned()
    }

    pub fn contains(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> bool {
        self.object(gvr, namespace, name).is_some()
    }

    fn injected(state: &FakeState, op: FakeOp, gvr: &Gvr, name: &str) -> Result<()> {
        let hit = state
            .failures
            .get(&(op, name.to_string()))
            .or_else(|| state.failures.get(&(op, gvr.resource.clone())));
        match hit {
            Some(message) => Err(Error::Cluster(message.clone())),
            None => Ok(()),
        }
    }
}

fn finalizers_empty(object: &Value) -> bool {
    object["metadata"]["finalizers"]
        .as_array()
        .map(|f| f.is_empty())
        .unwrap_or(true)
}

fn is_deleting(object: &Value) -> bool {
    object["metadata"]["deletionTimestamp"].is_string()
}

/// RFC 7386 JSON merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target_map) = target {
        for (k, v) in patch_map {
            if v.is_null() {
                target_map.remove(k);
            } else {
                merge_patch(target_map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    }
}

impl ClusterClient for FakeCluster {
    fn get_object(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        let mut state = self.lock();
        state.calls.get += 1;
        Self::injected(&state, FakeOp::Get, gvr, name)?;
        state
            .objects
            .get(&key(gvr, namespace, name))
            .cloned()
            .map(DynamicObject::new)
            .ok_or_else(|| super::not_found(gvr, name))
    }

    fn list_objects(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<Vec<DynamicObject>> {
        let mut state = self.lock();
        state.calls.list += 1;
        Self::injected(&state, FakeOp::List, gvr, "")?;
        Ok(state
            .objects
            .iter()
            .filter(|((res, ns, _), _)| {
                *res == gvr.resource && namespace.is_none_or(|want| want == ns)
            })
            .map(|(_, obj)| DynamicObject::new(obj.clone()))
            .collect())
    }

    fn list_api_resources(&self) -> Result<DiscoveryResult> {
        let mut state = self.lock();
        state.calls.discover += 1;
        Ok(DiscoveryResult {
            lists: state.discovery.clone(),
            partial_error: state.partial_discovery.clone(),
        })
    }

    fn patch_object(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
        body: &Value,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.patch += 1;
        Self::injected(&state, FakeOp::Patch, gvr, name)?;
        let sticky = state.sticky.contains(name);
        let k = key(gvr, namespace, name);
        let object = state
            .objects
            .get_mut(&k)
            .ok_or_else(|| super::not_found(gvr, name))?;
        if sticky {
            return Ok(());
        }
        merge_patch(object, body);
        if is_deleting(object) && finalizers_empty(object) {
            state.objects.remove(&k);
        }
        Ok(())
    }

    fn delete_object(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.delete += 1;
        Self::injected(&state, FakeOp::Delete, gvr, name)?;
        let k = key(gvr, namespace, name);
        let object = state
            .objects
            .get_mut(&k)
            .ok_or_else(|| super::not_found(gvr, name))?;
        if finalizers_empty(object) {
            state.objects.remove(&k);
        } else if !is_deleting(object) {
            object["metadata"]["deletionTimestamp"] =
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        Ok(())
    }

    fn finalize_namespace(&self, namespace: &NamespaceObject) -> Result<()> {
        let gvr = Gvr::namespaces();
        let name = namespace.name();
        let mut state = self.lock();
        state.calls.finalize += 1;
        Self::injected(&state, FakeOp::Finalize, &gvr, name)?;
        let k = key(&gvr, None, name);
        let object = state
            .objects
            .get_mut(&k)
            .ok_or_else(|| super::not_found(&gvr, name))?;
        object["spec"]["finalizers"] = serde_json::to_value(&namespace.spec.finalizers)?;
        if namespace.spec.finalizers.is_empty() && finalizers_empty(object) {
            state.objects.remove(&k);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pods() -> Gvr {
        Gvr::new("", "v1", "pods")
    }

    fn stuck_pod(name: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": "shop",
                "finalizers": ["example.com/block"],
                "deletionTimestamp": "2026-01-01T00:00:00Z"
            }
        })
    }

    #[test]
    fn patch_removes_terminating_object() {
        let cluster = FakeCluster::new().with_object(&pods(), stuck_pod("web-0"));
        cluster
            .patch_object(
                &pods(),
                Some("shop"),
                "web-0",
                &json!({"metadata": {"finalizers": null}}),
            )
            .unwrap();
        assert!(!cluster.contains(&pods(), Some("shop"), "web-0"));
        assert_eq!(cluster.calls().patch, 1);
    }

    #[test]
    fn sticky_finalizers_survive_patch() {
        let cluster = FakeCluster::new()
            .with_object(&pods(), stuck_pod("web-0"))
            .with_sticky_finalizers("web-0");
        cluster
            .patch_object(
                &pods(),
                Some("shop"),
                "web-0",
                &json!({"metadata": {"finalizers": null}}),
            )
            .unwrap();
        let obj = cluster.object(&pods(), Some("shop"), "web-0").unwrap();
        assert_eq!(obj["metadata"]["finalizers"][0], "example.com/block");
    }

    #[test]
    fn delete_with_finalizers_marks_deleting() {
        let mut pod = stuck_pod("web-1");
        pod["metadata"]
            .as_object_mut()
            .unwrap()
            .remove("deletionTimestamp");
        let cluster = FakeCluster::new().with_object(&pods(), pod);
        cluster.delete_object(&pods(), Some("shop"), "web-1").unwrap();
        let obj = cluster.object(&pods(), Some("shop"), "web-1").unwrap();
        assert!(obj["metadata"]["deletionTimestamp"].is_string());
    }

    #[test]
    fn injected_failures_and_not_found() {
        let cluster = FakeCluster::new()
            .with_object(&pods(), stuck_pod("web-0"))
            .fail_on(FakeOp::Patch, "web-0", "admission webhook \"deny.io\" denied the request");
        let err = cluster
            .patch_object(&pods(), Some("shop"), "web-0", &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("denied the request"));

        let err = cluster.get_object(&pods(), Some("shop"), "nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn list_filters_by_namespace() {
        let mut other = stuck_pod("api-0");
        other["metadata"]["namespace"] = json!("billing");
        let cluster = FakeCluster::new()
            .with_object(&pods(), stuck_pod("web-0"))
            .with_object(&pods(), other);
        assert_eq!(cluster.list_objects(&pods(), Some("shop")).unwrap().len(), 1);
        assert_eq!(cluster.list_objects(&pods(), None).unwrap().len(), 2);
    }

    #[test]
    fn merge_patch_semantics() {
        let mut doc = json!({"a": {"b": 1, "c": 2}, "d": [1]});
        merge_patch(&mut doc, &json!({"a": {"b": null, "e": 3}, "d": [2]}));
        assert_eq!(doc, json!({"a": {"c": 2, "e": 3}, "d": [2]}));
    }
}
