//! Single-action execution against the cluster.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;
use unstuck_common::{Action, ActionType, Error, ResourceRef, Result, StateSnapshot};

use crate::kube::{optional, ClusterClient, HasDeletionTimestamp, HasFinalizers, TargetKind};

/// Runs, verifies, and snapshots one action at a time.
pub trait Executor {
    fn execute(&self, action: &Action) -> Result<()>;

    /// Whether the action's post-condition now holds.
    fn verify(&self, action: &Action) -> Result<bool>;

    /// Minimal state for before/after audit.
    fn snapshot(&self, target: &ResourceRef) -> Result<StateSnapshot>;
}

/// What the executor reads back from an object.
#[derive(Debug, Clone, Default, PartialEq)]
struct Observed {
    finalizers: Vec<String>,
    deletion_timestamp: Option<DateTime<Utc>>,
    /// Namespaces only.
    phase: Option<String>,
}

impl Observed {
    fn from_object<O: HasFinalizers + HasDeletionTimestamp>(object: &O) -> Self {
        Observed {
            finalizers: object.finalizers(),
            deletion_timestamp: object.deletion_timestamp(),
            phase: None,
        }
    }
}

/// [`Executor`] over any [`ClusterClient`].
pub struct ClusterExecutor<'a, C: ClusterClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ClusterClient + ?Sized> ClusterExecutor<'a, C> {
    pub fn new(client: &'a C) -> Self {
        ClusterExecutor { client }
    }

    /// Current state of `target`, `None` if it no longer exists.
    fn observe(&self, kind: &TargetKind, target: &ResourceRef) -> Result<Option<Observed>> {
        let name = target.name.as_str();
        match kind {
            TargetKind::Namespace => Ok(optional(self.client.get_namespace(name))?.map(|ns| {
                Observed {
                    phase: Some(ns.phase().to_string()),
                    ..Observed::from_object(&ns)
                }
            })),
            TargetKind::CustomResourceDefinition => {
                Ok(optional(self.client.get_crd(name))?.map(|crd| Observed::from_object(&crd)))
            }
            TargetKind::Generic(gvr) => Ok(optional(self.client.get_object(
                gvr,
                target.namespace(),
                name,
            ))?
            .map(|obj| Observed::from_object(&obj))),
        }
    }
}

fn null_finalizers_patch() -> serde_json::Value {
    json!({"metadata": {"finalizers": null}})
}

impl<C: ClusterClient + ?Sized> Executor for ClusterExecutor<'_, C> {
    fn execute(&self, action: &Action) -> Result<()> {
        if action.action_type.is_read_only() {
            return Ok(());
        }

        let target = &action.target;
        let kind = TargetKind::resolve(target)?;
        debug!(action_id = %action.id, kind = ?kind, target = %target, "executing");

        match action.action_type {
            ActionType::Patch => self.client.patch_merge(
                &kind,
                target.namespace(),
                &target.name,
                &null_finalizers_patch(),
            ),
            ActionType::Delete => self.client.delete(&kind, target.namespace(), &target.name),
            ActionType::Finalize => {
                if kind != TargetKind::Namespace {
                    return Err(Error::UnsupportedTarget(format!(
                        "finalize only applies to namespaces, not {}",
                        target.kind
                    )));
                }
                let namespace = self.client.get_namespace(&target.name)?;
                self.client
                    .finalize_namespace(&namespace.with_cleared_spec_finalizers())
            }
            ActionType::Inspect | ActionType::List | ActionType::Wait => Ok(()),
        }
    }

    fn verify(&self, action: &Action) -> Result<bool> {
        let target = &action.target;
        match action.action_type {
            ActionType::Inspect | ActionType::List | ActionType::Wait => Ok(true),
            ActionType::Patch => {
                let kind = TargetKind::resolve(target)?;
                Ok(self
                    .observe(&kind, target)?
                    .is_none_or(|state| state.finalizers.is_empty()))
            }
            ActionType::Delete => {
                // An unresolvable type means its API surface is already gone.
                let Ok(kind) = TargetKind::resolve(target) else {
                    return Ok(true);
                };
                Ok(self.observe(&kind, target)?.is_none())
            }
            ActionType::Finalize => Ok(optional(self.client.get_namespace(&target.name))?
                .is_none_or(|ns| !ns.is_terminating())),
        }
    }

    fn snapshot(&self, target: &ResourceRef) -> Result<StateSnapshot> {
        let kind = TargetKind::resolve(target)?;
        let mut state = StateSnapshot::new();
        match self.observe(&kind, target)? {
            None => {
                state.insert("exists".into(), json!(false));
            }
            Some(observed) => {
                state.insert("finalizers".into(), json!(observed.finalizers));
                state.insert(
                    "deletionTimestamp".into(),
                    json!(observed.deletion_timestamp.map(|t| t.to_rfc3339())),
                );
                if let Some(phase) = observed.phase {
                    state.insert("phase".into(), json!(phase));
                }
            }
        }
        Ok(state)
    }
}
