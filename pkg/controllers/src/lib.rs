//! Environment controller: derives a Namespace, ResourceQuota, LimitRange
//! and two RoleBindings from each Environment and keeps them converged.

pub mod child;
pub mod desired;
pub mod environment;
pub mod gc;
pub mod partition;
pub mod queue;
pub mod reconciler;
pub mod trigger;

pub use environment::{ControllerConfig, ControllerHandle, EnvironmentController};
pub use reconciler::{Action, EnvironmentReconciler, Reconcile, ReconcileReport};
