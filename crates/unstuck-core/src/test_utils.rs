//! Test utilities for unstuck-core.
//!
//! - Assertion macros
//! - Fixture loading from `tests/fixtures`
//! - Canned cluster scenarios on top of [`FakeCluster`]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use unstuck_common::{Blocker, DiagnosisReport, DiscoveryFailure, ResourceRef, TargetType};

use crate::kube::fake::FakeCluster;
use crate::kube::{ApiResource, Gvr};

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(e) => e,
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => panic!("{}: got Ok({:?})", $msg, val),
            Err(e) => e,
        }
    };
}

// ============================================================================
// Fixtures
// ============================================================================

/// Fixture directory relative to crate root.
pub const FIXTURES_DIR: &str = "tests/fixtures";

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join(FIXTURES_DIR)
        .join(name)
}

pub fn load_fixture(name: &str) -> std::io::Result<String> {
    std::fs::read_to_string(fixture_path(name))
}

pub fn load_fixture_json<T: serde::de::DeserializeOwned>(name: &str) -> Result<T, String> {
    let content =
        load_fixture(name).map_err(|e| format!("Failed to read fixture {}: {}", name, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse fixture {}: {}", name, e))
}

// ============================================================================
// Cluster objects
// ============================================================================

pub const DELETED_AT: &str = "2026-03-01T10:00:00Z";

/// Namespaced, listable API resource entry.
pub fn api_resource(name: &str, kind: &str) -> ApiResource {
    ApiResource {
        name: name.to_string(),
        singular_name: kind.to_lowercase(),
        namespaced: true,
        kind: kind.to_string(),
        verbs: vec!["get".into(), "list".into(), "patch".into(), "delete".into()],
        short_names: Vec::new(),
    }
}

pub fn terminating_namespace(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {"name": name, "deletionTimestamp": DELETED_AT},
        "spec": {"finalizers": ["kubernetes"]},
        "status": {"phase": "Terminating"}
    })
}

/// An object of `kind` that is being deleted and held by `finalizers`.
pub fn stuck_object(api_version: &str, kind: &str, namespace: &str, name: &str, finalizers: &[&str]) -> Value {
    json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": {
            "name": name,
            "namespace": namespace,
            "finalizers": finalizers,
            "deletionTimestamp": DELETED_AT
        }
    })
}

pub fn certificates() -> Gvr {
    Gvr::new("cert-manager.io", "v1", "certificates")
}

/// A terminating namespace holding two stuck cert-manager certificates.
pub fn stuck_namespace_cluster(namespace: &str) -> FakeCluster {
    FakeCluster::new()
        .with_api_resources(
            "cert-manager.io/v1",
            vec![api_resource("certificates", "Certificate")],
        )
        .with_object(&Gvr::namespaces(), terminating_namespace(namespace))
        .with_object(
            &certificates(),
            stuck_object("cert-manager.io/v1", "Certificate", namespace, "api-tls", &["cert-manager.io/finalizer"]),
        )
        .with_object(
            &certificates(),
            stuck_object("cert-manager.io/v1", "Certificate", namespace, "web-tls", &["cert-manager.io/finalizer"]),
        )
}

// ============================================================================
// Reports
// ============================================================================

/// What `NamespaceDetector` reports for [`stuck_namespace_cluster`].
pub fn stuck_namespace_report(namespace: &str) -> DiagnosisReport {
    let mut report = DiagnosisReport::new(
        ResourceRef::new("Namespace", "v1", namespace),
        TargetType::Namespace,
    );
    report.status = "Terminating".to_string();
    report.root_cause = "Namespace finalizer blocking deletion".to_string();
    report.finalizers = vec!["kubernetes".to_string()];
    report.blockers = ["api-tls", "web-tls"]
        .iter()
        .map(|name| {
            Blocker::new(
                ResourceRef::new("Certificate", "cert-manager.io/v1", *name).in_namespace(namespace),
            )
            .with_finalizers(["cert-manager.io/finalizer"])
        })
        .collect();
    report
}

/// A namespace whose CRDs are gone: only a force finalize can help.
pub fn discovery_failure_report(namespace: &str) -> DiagnosisReport {
    let mut report = DiagnosisReport::new(
        ResourceRef::new("Namespace", "v1", namespace),
        TargetType::Namespace,
    );
    report.status = "Terminating".to_string();
    report.root_cause = "Discovery failures - CRD may have been deleted".to_string();
    report.discovery_failures = vec![DiscoveryFailure {
        group_version: "widgets.example.com/v1".to_string(),
        resource: String::new(),
        error: "API group not found (CRD likely deleted)".to_string(),
    }];
    report
}
