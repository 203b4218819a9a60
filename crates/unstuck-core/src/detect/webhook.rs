//! Admission webhooks that can block finalizer removal.
//!
//! Findings are advisory: they fill `webhook_issues` on the report and are
//! used to explain failed patches, but never change what the planner emits.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use unstuck_common::{Result, WebhookInfo};

use crate::kube::{optional, ClusterClient, DynamicObject, Gvr, WebhookKind};

/// Failure class recognized in an API error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookErrorKind {
    Denied,
    NoEndpoints,
    ServiceMissing,
    Timeout,
    Unavailable,
    InternalError,
    Failed,
}

impl WebhookErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookErrorKind::Denied => "webhook_denied",
            WebhookErrorKind::NoEndpoints => "webhook_no_endpoints",
            WebhookErrorKind::ServiceMissing => "webhook_service_missing",
            WebhookErrorKind::Timeout => "webhook_timeout",
            WebhookErrorKind::Unavailable => "webhook_unavailable",
            WebhookErrorKind::InternalError => "webhook_internal_error",
            WebhookErrorKind::Failed => "webhook_failed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            WebhookErrorKind::Denied => "Admission webhook rejected the request",
            WebhookErrorKind::NoEndpoints => "Webhook service has no ready endpoints",
            WebhookErrorKind::ServiceMissing => "Webhook service does not exist",
            WebhookErrorKind::Timeout => "Webhook call timed out",
            WebhookErrorKind::Unavailable => "Webhook backend refused the connection",
            WebhookErrorKind::InternalError => "API server failed while calling the webhook",
            WebhookErrorKind::Failed => "Webhook call failed",
        }
    }
}

/// Most specific cause first; a denial wins over everything.
fn patterns() -> &'static [(Regex, WebhookErrorKind)] {
    static PATTERNS: OnceLock<Vec<(Regex, WebhookErrorKind)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r#"admission webhook "([^"]+)" denied the request"#, WebhookErrorKind::Denied),
            (r"no endpoints available", WebhookErrorKind::NoEndpoints),
            (r"service .* not found", WebhookErrorKind::ServiceMissing),
            (r"context deadline exceeded", WebhookErrorKind::Timeout),
            (r"connection refused", WebhookErrorKind::Unavailable),
            (
                r"Internal error occurred: failed calling webhook",
                WebhookErrorKind::InternalError,
            ),
            (r#"failed calling webhook "([^"]+)""#, WebhookErrorKind::Failed),
        ]
        .into_iter()
        .map(|(re, kind)| (Regex::new(re).expect("static webhook pattern"), kind))
        .collect()
    })
}

fn name_pattern() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| {
        Regex::new(r#"(?:admission webhook|failed calling webhook) "([^"]+)""#)
            .expect("static webhook name pattern")
    })
}

/// Classify an API error string, `None` if it is not webhook-related.
pub fn classify_webhook_error(message: &str) -> Option<WebhookErrorKind> {
    let mentions_webhook = message.contains("webhook");
    patterns()
        .iter()
        .find(|(re, kind)| {
            re.is_match(message)
                && (mentions_webhook
                    || !matches!(
                        kind,
                        WebhookErrorKind::Timeout
                            | WebhookErrorKind::Unavailable
                            | WebhookErrorKind::NoEndpoints
                            | WebhookErrorKind::ServiceMissing
                    ))
        })
        .map(|(_, kind)| *kind)
}

/// Webhook name quoted in an API error string.
pub fn extract_webhook_name(message: &str) -> Option<String> {
    name_pattern()
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Operator guidance for a webhook that is getting in the way.
pub fn webhook_guidance(webhook_name: &str, failure_policy: Option<&str>) -> String {
    let mut text = format!(
        "Webhook \"{name}\" is blocking the request. Options:\n\
         \x20 1. Fix or restore the webhook backend so it can admit the change\n\
         \x20 2. Temporarily delete the webhook configuration that contains \"{name}\"\n\
         \x20 3. Narrow the webhook's rules or namespaceSelector to exclude this resource",
        name = webhook_name
    );
    if failure_policy == Some("Fail") {
        text.push_str(
            "\nNote: failurePolicy is Fail, so an unreachable backend rejects every matching request.",
        );
    }
    text
}

/// Enumerates webhooks matching a resource type.
pub struct WebhookDetector<'a, C: ClusterClient + ?Sized> {
    client: &'a C,
    check_health: bool,
}

impl<'a, C: ClusterClient + ?Sized> WebhookDetector<'a, C> {
    pub fn new(client: &'a C) -> Self {
        WebhookDetector {
            client,
            check_health: true,
        }
    }

    pub fn with_health_check(mut self, enabled: bool) -> Self {
        self.check_health = enabled;
        self
    }

    /// Webhooks whose rules cover `gvr`, validating first.
    pub fn find_matching(&self, gvr: &Gvr) -> Result<Vec<WebhookInfo>> {
        let mut found = Vec::new();
        for kind in WebhookKind::ALL {
            for config in self.client.list_webhook_configurations(kind)? {
                for hook in config.webhooks.iter().filter(|w| w.matches(gvr)) {
                    let service = hook.client_config.service.as_ref();
                    let mut info = WebhookInfo {
                        name: config.metadata.name.clone(),
                        webhook_name: hook.name.clone(),
                        webhook_type: kind.as_str().to_string(),
                        healthy: true,
                        error: String::new(),
                        service_ref: service
                            .map(|s| format!("{}/{}", s.namespace, s.name))
                            .unwrap_or_default(),
                        failure_policy: hook.failure_policy.clone().unwrap_or_default(),
                    };
                    if let (true, Some(svc)) = (self.check_health, service) {
                        if let Some(problem) = self.service_problem(&svc.namespace, &svc.name) {
                            info.healthy = false;
                            info.error = problem;
                        }
                    }
                    debug!(webhook = %info.webhook_name, healthy = info.healthy, "matching webhook");
                    found.push(info);
                }
            }
        }
        Ok(found)
    }

    /// Why the backing service can't serve, `None` if it looks fine.
    fn service_problem(&self, namespace: &str, name: &str) -> Option<String> {
        match optional(self.client.get_service(namespace, name)) {
            Ok(None) => return Some(format!("service {}/{} not found", namespace, name)),
            Err(e) => return Some(e.to_string()),
            Ok(Some(_)) => {}
        }
        match optional(self.client.get_endpoints(namespace, name)) {
            Ok(None) => Some(format!("endpoints {}/{} not found", namespace, name)),
            Err(e) => Some(e.to_string()),
            Ok(Some(endpoints)) if !has_ready_address(&endpoints) => {
                Some("no ready endpoints available".to_string())
            }
            Ok(Some(_)) => None,
        }
    }
}

fn has_ready_address(endpoints: &DynamicObject) -> bool {
    endpoints.as_value()["subsets"]
        .as_array()
        .is_some_and(|subsets| {
            subsets.iter().any(|s| {
                s["addresses"]
                    .as_array()
                    .is_some_and(|addrs| !addrs.is_empty())
            })
        })
}
