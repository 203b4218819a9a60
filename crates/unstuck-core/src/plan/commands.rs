//! kubectl-equivalent command strings shown alongside each action.

use unstuck_common::ResourceRef;

const NULL_FINALIZERS: &str = r#"'{"metadata":{"finalizers":null}}'"#;

/// Kind as written on the target; kubectl matches kinds case-insensitively.
fn kind_arg(target: &ResourceRef) -> &str {
    if target.kind.is_empty() {
        "resource"
    } else {
        &target.kind
    }
}

fn namespace_flag(target: &ResourceRef) -> String {
    target
        .namespace()
        .map(|ns| format!(" -n {}", ns))
        .unwrap_or_default()
}

/// Merge-patch that nulls `metadata.finalizers`.
pub fn remove_finalizers_command(target: &ResourceRef) -> String {
    format!(
        "kubectl patch {} {}{} -p {} --type=merge",
        kind_arg(target),
        target.name,
        namespace_flag(target),
        NULL_FINALIZERS
    )
}

pub fn remove_crd_finalizers_command(crd_name: &str) -> String {
    format!(
        "kubectl patch crd {} -p {} --type=merge",
        crd_name, NULL_FINALIZERS
    )
}

/// Clear `spec.finalizers` and submit through the finalize sub-resource.
pub fn force_finalize_command(namespace: &str) -> String {
    format!(
        "kubectl get namespace {ns} -o json | jq '.spec.finalizers = []' | kubectl replace --raw \"/api/v1/namespaces/{ns}/finalize\" -f -",
        ns = namespace
    )
}

pub fn delete_command(target: &ResourceRef) -> String {
    format!(
        "kubectl delete {} {}{}",
        kind_arg(target),
        target.name,
        namespace_flag(target)
    )
}
