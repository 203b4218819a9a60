//! Deterministic action ordering.
//!
//! Lower escalation levels always run first. Within a level, leaf
//! resources come before the objects that own them so a parent is never
//! cleared while its children still carry finalizers.

use std::collections::{BTreeMap, BTreeSet};

use unstuck_common::{Action, ResourceRef};

/// Child resource key to the keys of its owners.
pub type OwnerEdges = BTreeMap<String, Vec<String>>;

/// Priority for kinds not in the table: after leaves, before CRDs and namespaces.
pub const DEFAULT_PRIORITY: u32 = 50;

/// Hierarchy position of a kind (case-insensitive). Lower runs first.
pub fn resource_priority(kind: &str) -> u32 {
    match kind.to_lowercase().as_str() {
        "pod" | "configmap" | "secret" | "service" | "endpoint" | "endpoints" => 10,
        "deployment" | "statefulset" | "daemonset" | "replicaset" | "job" | "cronjob" => 20,
        "certificate" | "issuer" | "clusterissuer" => 30,
        "customresourcedefinition" => 100,
        "namespace" => 200,
        _ => DEFAULT_PRIORITY,
    }
}

/// Key shared with owner-edge maps: `kind/namespace/name` or `kind/name`.
pub fn resource_key(target: &ResourceRef) -> String {
    target.key()
}

/// Stable sort by `(escalation level, kind priority, name)`.
pub fn order_by_priority(mut actions: Vec<Action>) -> Vec<Action> {
    actions.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    actions
}

fn sort_key(action: &Action) -> (u8, u32, &str) {
    (
        action.escalation_level.as_u8(),
        resource_priority(&action.target.kind),
        action.target.name.as_str(),
    )
}

/// Children-before-owners ordering from an explicit edge map.
///
/// `owners` maps a resource key to the keys of the objects it depends on;
/// each owner adds one to the child's in-degree. Kahn's algorithm runs owner-first with the ready set re-sorted at every
/// step, then the order is reversed. Actions whose key is not in the graph,
/// or that sit on a cycle, follow in input order. A final stable sort by
/// escalation level keeps lower levels first. An empty map falls back to
/// [`order_by_priority`].
pub fn order_topological(actions: Vec<Action>, owners: &OwnerEdges) -> Vec<Action> {
    if owners.is_empty() {
        return order_by_priority(actions);
    }

    let mut nodes: BTreeSet<&str> = BTreeSet::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (child, parents) in owners {
        nodes.insert(child.as_str());
        in_degree.entry(child.as_str()).or_insert(0);
        let parents: BTreeSet<&str> = parents.iter().map(String::as_str).collect();
        for owner in parents {
            nodes.insert(owner);
            *in_degree.entry(child.as_str()).or_insert(0) += 1;
            in_degree.entry(owner).or_insert(0);
            dependents.entry(owner).or_default().push(child.as_str());
        }
    }

    // BTreeSet keeps the ready set sorted after every insertion.
    let mut ready: BTreeSet<&str> = nodes
        .iter()
        .copied()
        .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
        .collect();
    let mut owner_first = Vec::with_capacity(nodes.len());
    while let Some(node) = ready.pop_first() {
        owner_first.push(node);
        for child in dependents.get(node).into_iter().flatten() {
            if let Some(d) = in_degree.get_mut(child) {
                *d -= 1;
                if *d == 0 {
                    ready.insert(*child);
                }
            }
        }
    }

    let mut slots: Vec<Option<Action>> = actions.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    for node in owner_first.iter().rev() {
        for slot in slots.iter_mut() {
            if slot
                .as_ref()
                .is_some_and(|a| resource_key(&a.target) == *node)
            {
                ordered.extend(slot.take());
            }
        }
    }
    ordered.extend(slots.into_iter().flatten());

    ordered.sort_by_key(|a| a.escalation_level);
    ordered
}

/// Pick the ordering: topological when an edge map is supplied, priority otherwise.
pub fn order_actions(actions: Vec<Action>, owners: Option<&OwnerEdges>) -> Vec<Action> {
    match owners {
        Some(edges) => order_topological(actions, edges),
        None => order_by_priority(actions),
    }
}

/// Number actions `action-001`, `action-002`, ... in their current order.
pub fn assign_ids(actions: &mut [Action]) {
    for (i, action) in actions.iter_mut().enumerate() {
        action.id = format!("action-{:03}", i + 1);
    }
}
