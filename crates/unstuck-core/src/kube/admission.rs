//! Admission webhook configuration objects.

use serde::{Deserialize, Serialize};

use super::object::ObjectMeta;
use super::Gvr;

/// Validating or mutating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookKind {
    Validating,
    Mutating,
}

impl WebhookKind {
    pub const ALL: [WebhookKind; 2] = [WebhookKind::Validating, WebhookKind::Mutating];

    pub fn gvr(self) -> Gvr {
        let resource = match self {
            WebhookKind::Validating => "validatingwebhookconfigurations",
            WebhookKind::Mutating => "mutatingwebhookconfigurations",
        };
        Gvr::new("admissionregistration.k8s.io", "v1", resource)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WebhookKind::Validating => "validating",
            WebhookKind::Mutating => "mutating",
        }
    }
}

/// A `ValidatingWebhookConfiguration` or `MutatingWebhookConfiguration`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfiguration {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub webhooks: Vec<Webhook>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub name: String,
    #[serde(default)]
    pub client_config: WebhookClientConfig,
    #[serde(default)]
    pub rules: Vec<RuleWithOperations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceReference {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleWithOperations {
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub api_versions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl RuleWithOperations {
    /// `*` matches anything; a resource rule also matches its sub-resources
    /// (`pods` matches `pods/status`).
    pub fn matches(&self, gvr: &Gvr) -> bool {
        let group_ok = self
            .api_groups
            .iter()
            .any(|g| g == "*" || *g == gvr.group);
        let version_ok = self
            .api_versions
            .iter()
            .any(|v| v == "*" || *v == gvr.version);
        let resource_ok = self.resources.iter().any(|r| {
            r == "*"
                || *r == gvr.resource
                || gvr
                    .resource
                    .strip_prefix(r.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        group_ok && version_ok && resource_ok
    }
}

impl Webhook {
    pub fn matches(&self, gvr: &Gvr) -> bool {
        self.rules.iter().any(|rule| rule.matches(gvr))
    }
}
