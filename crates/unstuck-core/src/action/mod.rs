//! Plan execution: executor, confirmation, deadline, and the apply loop.

pub mod applier;
pub mod confirm;
pub mod deadline;
pub mod executor;
pub mod gvr;

pub use applier::{Applier, ApplierConfig};
pub use confirm::{is_affirmative, AutoConfirm, Confirmer, ScriptedConfirmer, StdinConfirmer};
pub use deadline::Deadline;
pub use executor::{ClusterExecutor, Executor};
pub use gvr::{pluralize, resolve_gvr, split_api_version};
