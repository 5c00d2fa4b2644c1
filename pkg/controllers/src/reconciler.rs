use anyhow::Context;
use async_trait::async_trait;
use pkg_metrics::{
    CHILD_CREATES_TOTAL, CHILD_UPDATES_TOTAL, GARBAGE_COLLECTED_TOTAL, MetricsRegistry,
    RECONCILE_ERRORS_TOTAL, RECONCILE_REQUEUES_TOTAL, RECONCILE_TOTAL,
};
use pkg_state::ownership::{OwnedChild, OwnershipLedger};
use pkg_state::resource::ResourceStore;
use pkg_types::environment::{Environment, EnvironmentPhase, EnvironmentStatus};
use pkg_types::meta::{ObjectKey, OwnerReference, Resource};
use serde::Serialize;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::child::{ChildResource, Step, StepOutcome, UpdatePolicy};
use crate::desired;
use crate::gc::GarbageCollector;
use crate::partition::partition_users;

/// Continuation signal returned by a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    /// More convergence work remains; invoke again.
    Requeue,
    /// Converged; wait for the next change.
    AwaitChange,
}

/// What a single pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub action: Action,
    pub steps: Vec<Step>,
    /// Objects deleted because their Environment no longer exists.
    pub collected: usize,
}

impl ReconcileReport {
    fn done(steps: Vec<Step>) -> Self {
        Self {
            action: Action::AwaitChange,
            steps,
            collected: 0,
        }
    }

    /// Outcome of the step for `kind` at `key`, if that step ran.
    pub fn outcome(&self, kind: &str, key: &ObjectKey) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.kind == kind && &s.key == key)
            .map(|s| s.outcome)
    }
}

/// A desired child next to what the store currently holds for it.
struct Observed<R> {
    key: ObjectKey,
    owner: OwnerReference,
    desired: R,
    actual: Option<R>,
}

/// The unit of work driven by the work queue: one pass for one key.
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self, name: &str) -> anyhow::Result<Action>;
}

/// Converges the objects derived from one Environment.
///
/// A pass re-reads everything it needs, so it may be retried at any time.
/// The first failing store operation aborts the pass; completed steps are
/// kept and the next pass picks up from there.
pub struct EnvironmentReconciler {
    store: ResourceStore,
    ledger: OwnershipLedger,
    gc: GarbageCollector,
    metrics: Arc<MetricsRegistry>,
}

impl EnvironmentReconciler {
    pub fn new(store: ResourceStore, metrics: Arc<MetricsRegistry>) -> Self {
        let ledger = OwnershipLedger::new(store.state().clone());
        Self {
            gc: GarbageCollector::new(store.clone(), ledger.clone()),
            store,
            ledger,
            metrics,
        }
    }

    /// Run one pass for the Environment called `name`.
    pub async fn run(&self, name: &str) -> anyhow::Result<ReconcileReport> {
        let span = info_span!("reconcile", environment = %name);
        self.run_inner(name).instrument(span).await
    }

    async fn run_inner(&self, name: &str) -> anyhow::Result<ReconcileReport> {
        self.metrics.counter_inc(RECONCILE_TOTAL);
        debug!("Reconciling Environment");

        let env = match self
            .store
            .get::<Environment>(&ObjectKey::cluster(name))
            .await
            .context("get Environment")
        {
            Ok(Some(env)) => env,
            Ok(None) => {
                let collected = self.gc.collect(name).await.inspect_err(|e| {
                    self.metrics.counter_inc(RECONCILE_ERRORS_TOTAL);
                    warn!("Garbage collection failed: {:#}", e);
                })?;
                if collected > 0 {
                    self.metrics.counter_add(GARBAGE_COLLECTED_TOTAL, collected as u64);
                    info!("Environment removed, deleted {} derived objects", collected);
                }
                return Ok(ReconcileReport {
                    collected,
                    ..ReconcileReport::done(Vec::new())
                });
            }
            Err(e) => {
                self.metrics.counter_inc(RECONCILE_ERRORS_TOTAL);
                return Err(e);
            }
        };

        match self.converge(&env).await {
            Ok(report) => {
                match report.action {
                    Action::Requeue => self.metrics.counter_inc(RECONCILE_REQUEUES_TOTAL),
                    Action::AwaitChange => {
                        self.record_status(&env, EnvironmentPhase::Success, None).await
                    }
                }
                Ok(report)
            }
            Err(e) => {
                self.metrics.counter_inc(RECONCILE_ERRORS_TOTAL);
                warn!("Reconcile failed: {:#}", e);
                self.record_status(&env, EnvironmentPhase::Failed, Some(format!("{:#}", e)))
                    .await;
                Err(e)
            }
        }
    }

    async fn converge(&self, env: &Environment) -> anyhow::Result<ReconcileReport> {
        let namespace = self.ensure(env, desired::namespace_for(env)).await?;
        if namespace.outcome == StepOutcome::Created {
            info!("Namespace {} created, requesting another pass", namespace.key);
            return Ok(ReconcileReport {
                action: Action::Requeue,
                steps: vec![namespace],
                collected: 0,
            });
        }

        let mut steps = vec![namespace];
        steps.push(self.ensure(env, desired::resource_quota_for(env)).await?);
        steps.push(self.ensure(env, desired::limit_range_for(env)).await?);

        let partition = partition_users(&env.spec.users, env.spec.is_prod);
        for binding in desired::role_bindings_for(env, partition) {
            steps.push(self.ensure(env, binding).await?);
        }

        info!("Environment reconciled");
        Ok(ReconcileReport::done(steps))
    }

    /// Bring one derived object to its desired state.
    async fn ensure<R: ChildResource>(
        &self,
        env: &Environment,
        desired: R,
    ) -> anyhow::Result<Step> {
        let observed = self.observe(env, desired).await?;
        self.apply(observed).await
    }

    /// Attach ownership, record the child and read what is stored.
    async fn observe<R: ChildResource>(
        &self,
        env: &Environment,
        mut desired: R,
    ) -> anyhow::Result<Observed<R>> {
        let key = desired.key();
        let owner = env.controller_reference();
        desired
            .meta_mut()
            .set_controller_reference(owner.clone())
            .with_context(|| format!("set owner of {} '{}'", R::KIND, key))?;

        // Recorded before the create so a crash in between cannot leak it.
        self.ledger
            .record(&env.metadata.name, OwnedChild::of::<R>(&key))
            .await
            .with_context(|| format!("record ownership of {} '{}'", R::KIND, key))?;

        let actual = self
            .store
            .get::<R>(&key)
            .await
            .with_context(|| format!("get {} '{}'", R::KIND, key))?;

        if let Some(actual) = &actual {
            // Refuse to take over an object another Environment controls.
            actual
                .meta()
                .clone()
                .set_controller_reference(owner.clone())
                .with_context(|| format!("adopt {} '{}'", R::KIND, key))?;
        }

        Ok(Observed {
            key,
            owner,
            desired,
            actual,
        })
    }

    /// Write the observed child according to its kind's update policy. The
    /// write carries the resource version read in [`Self::observe`], so a
    /// concurrent change fails the step with a conflict.
    async fn apply<R: ChildResource>(&self, observed: Observed<R>) -> anyhow::Result<Step> {
        let Observed {
            key,
            owner,
            mut desired,
            actual,
        } = observed;

        let outcome = match (actual, R::UPDATE_POLICY) {
            (None, _) => {
                info!("Creating {} {}", R::KIND, key);
                self.store
                    .create(&desired)
                    .await
                    .with_context(|| format!("create {} '{}'", R::KIND, key))?;
                self.metrics.counter_inc(CHILD_CREATES_TOTAL);
                StepOutcome::Created
            }
            (Some(actual), UpdatePolicy::CreateOnly)
                if actual
                    .meta()
                    .controller_owner()
                    .is_some_and(|o| o.uid != owner.uid) =>
            {
                // Controlled by an earlier incarnation of this Environment:
                // move the reference, keep the content.
                let mut adopted = actual;
                adopted
                    .meta_mut()
                    .set_controller_reference(owner)
                    .with_context(|| format!("adopt {} '{}'", R::KIND, key))?;
                self.store
                    .update(&adopted)
                    .await
                    .with_context(|| format!("adopt {} '{}'", R::KIND, key))?;
                self.metrics.counter_inc(CHILD_UPDATES_TOTAL);
                info!("Adopted {} {}", R::KIND, key);
                StepOutcome::Adopted
            }
            (Some(_), UpdatePolicy::CreateOnly) => {
                debug!("{} {} exists", R::KIND, key);
                StepOutcome::Unchanged
            }
            (Some(actual), UpdatePolicy::Overwrite) => {
                desired.meta_mut().resource_version = actual.meta().resource_version;
                self.store
                    .update(&desired)
                    .await
                    .with_context(|| format!("update {} '{}'", R::KIND, key))?;
                self.metrics.counter_inc(CHILD_UPDATES_TOTAL);
                debug!("{} {} updated", R::KIND, key);
                StepOutcome::Updated
            }
        };

        Ok(Step {
            kind: R::KIND,
            key,
            outcome,
        })
    }

    /// Write the Environment status if it changed. Failures are logged only:
    /// the status write itself is not part of convergence.
    async fn record_status(
        &self,
        env: &Environment,
        phase: EnvironmentPhase,
        message: Option<String>,
    ) {
        let status = EnvironmentStatus {
            environment_status: Some(phase),
            message,
        };
        if env.status == status {
            return;
        }
        let mut updated = env.clone();
        updated.status = status;
        match self.store.update(&updated).await {
            Ok(_) => debug!("Environment status set to {}", phase),
            Err(e) => warn!("Failed to record Environment status {}: {}", phase, e),
        }
    }
}

#[async_trait]
impl Reconcile for EnvironmentReconciler {
    async fn reconcile(&self, name: &str) -> anyhow::Result<Action> {
        Ok(self.run(name).await?.action)
    }
}
