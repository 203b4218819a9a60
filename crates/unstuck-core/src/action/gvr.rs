//! Kind → group/version/resource resolution.
//!
//! Heuristic only: the plural comes from a small table of Kubernetes
//! irregulars plus English suffix rules, not from discovery.

use unstuck_common::{Error, ResourceRef, Result};

use crate::kube::Gvr;

/// Kinds whose plural the suffix rules get wrong or that must stay unchanged.
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("endpoints", "endpoints"),
    ("ingress", "ingresses"),
    ("networkpolicy", "networkpolicies"),
    ("podsecuritypolicy", "podsecuritypolicies"),
    ("resourcequota", "resourcequotas"),
    ("limitrange", "limitranges"),
];

/// Lower-cased plural resource name for `kind`.
pub fn pluralize(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(k, _)| *k == lower) {
        return (*plural).to_string();
    }
    if lower.ends_with('s') {
        format!("{}es", lower)
    } else if let Some(stem) = lower.strip_suffix('y') {
        format!("{}ies", stem)
    } else {
        format!("{}s", lower)
    }
}

/// Split `group/version`; a bare string is a core-group version, empty means `v1`.
pub fn split_api_version(api_version: &str) -> Result<(String, String)> {
    if api_version.is_empty() {
        return Ok((String::new(), "v1".to_string()));
    }
    match api_version.split('/').collect::<Vec<_>>().as_slice() {
        [version] if !version.is_empty() => Ok((String::new(), version.to_string())),
        [group, version] if !group.is_empty() && !version.is_empty() => {
            Ok((group.to_string(), version.to_string()))
        }
        _ => Err(Error::Resolution(format!(
            "malformed apiVersion '{}'",
            api_version
        ))),
    }
}

/// Resolve the GVR a reference addresses.
pub fn resolve_gvr(target: &ResourceRef) -> Result<Gvr> {
    if target.kind.trim().is_empty() {
        return Err(Error::Resolution(format!(
            "resource '{}' has no kind",
            target.name
        )));
    }
    let (group, version) = split_api_version(&target.api_version)?;
    Ok(Gvr::new(group, version, pluralize(&target.kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irregular_plurals() {
        assert_eq!(pluralize("Endpoints"), "endpoints");
        assert_eq!(pluralize("Ingress"), "ingresses");
        assert_eq!(pluralize("NetworkPolicy"), "networkpolicies");
        assert_eq!(pluralize("PodSecurityPolicy"), "podsecuritypolicies");
        assert_eq!(pluralize("ResourceQuota"), "resourcequotas");
        assert_eq!(pluralize("LimitRange"), "limitranges");
    }

    #[test]
    fn suffix_rules() {
        assert_eq!(pluralize("Pod"), "pods");
        assert_eq!(pluralize("Deployment"), "deployments");
        assert_eq!(pluralize("Class"), "classes");
        // Heuristic, not discovery: vowel + y still takes -ies.
        assert_eq!(pluralize("Gateway"), "gatewaies");
        assert_eq!(pluralize("Policy"), "policies");
        assert_eq!(pluralize("ClusterIssuer"), "clusterissuers");
    }

    #[test]
    fn api_version_splitting() {
        assert_eq!(
            split_api_version("apps/v1").unwrap(),
            ("apps".to_string(), "v1".to_string())
        );
        assert_eq!(
            split_api_version("v1").unwrap(),
            (String::new(), "v1".to_string())
        );
        assert_eq!(
            split_api_version("").unwrap(),
            (String::new(), "v1".to_string())
        );
        assert!(split_api_version("a/b/c").is_err());
        assert!(split_api_version("apps/").is_err());
    }

    #[test]
    fn resolve_reference() {
        let cert = ResourceRef::new("Certificate", "cert-manager.io/v1", "tls").in_namespace("shop");
        let gvr = resolve_gvr(&cert).unwrap();
        assert_eq!(gvr, Gvr::new("cert-manager.io", "v1", "certificates"));

        let err = resolve_gvr(&ResourceRef::new("", "v1", "x")).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }
}
