use pkg_constants::controller::{DEFAULT_RESYNC_SECS, DEFAULT_WORKERS};
use pkg_constants::state::OWNERSHIP_PREFIX;
use pkg_metrics::{MetricsRegistry, WORKQUEUE_DEPTH};
use pkg_state::resource::ResourceStore;
use pkg_state::watch::WatchEvent;
use pkg_types::environment::Environment;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::queue::WorkQueue;
use crate::reconciler::{Action, EnvironmentReconciler, Reconcile};
use crate::trigger::request_for;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Environments reconciled concurrently. One key is never processed by
    /// two workers at once.
    pub workers: usize,
    pub resync_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_SECS),
        }
    }
}

/// Controller that keeps every Environment's derived objects converged.
///
/// Store changes are mapped to Environment names and fed through a
/// [`WorkQueue`]; a periodic resync re-enqueues everything so that drift is
/// repaired even when no event arrives.
pub struct EnvironmentController {
    store: ResourceStore,
    reconciler: Arc<dyn Reconcile>,
    metrics: Arc<MetricsRegistry>,
    queue: WorkQueue,
    config: ControllerConfig,
}

impl EnvironmentController {
    pub fn new(
        store: ResourceStore,
        metrics: Arc<MetricsRegistry>,
        config: ControllerConfig,
    ) -> Self {
        let reconciler = Arc::new(EnvironmentReconciler::new(store.clone(), metrics.clone()));
        Self::with_reconciler(store, reconciler, metrics, config)
    }

    pub fn with_reconciler(
        store: ResourceStore,
        reconciler: Arc<dyn Reconcile>,
        metrics: Arc<MetricsRegistry>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            reconciler,
            metrics,
            queue: WorkQueue::default(),
            config,
        }
    }

    pub fn start(self) -> ControllerHandle {
        info!(
            "EnvironmentController started (workers={}, resync={}s)",
            self.config.workers,
            self.config.resync_interval.as_secs()
        );
        let this = Arc::new(self);

        // Subscribe before the first resync so no change slips in between.
        let events = this.store.state().event_log.subscribe();
        let watcher = tokio::spawn(this.clone().watch(events));
        let resync = tokio::spawn(this.clone().resync());
        let workers = (0..this.config.workers.max(1))
            .map(|id| tokio::spawn(this.clone().work(id)))
            .collect();

        ControllerHandle {
            queue: this.queue.clone(),
            watcher,
            resync,
            workers,
        }
    }

    async fn watch(self: Arc<Self>, mut events: broadcast::Receiver<WatchEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(name) = request_for(&event) {
                        debug!("{:?} {} -> Environment {}", event.event_type, event.key, name);
                        self.queue.add(name).await;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Watch lagged by {} events, resyncing", missed);
                    self.enqueue_all().await;
                }
                Err(RecvError::Closed) => {
                    info!("Watch stream closed");
                    return;
                }
            }
        }
    }

    async fn resync(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.resync_interval);
        loop {
            interval.tick().await;
            self.enqueue_all().await;
        }
    }

    /// Enqueue every stored Environment, plus every owner still present in
    /// the ownership ledger so that Environments deleted while the operator
    /// was down get collected.
    async fn enqueue_all(&self) {
        match self.store.list::<Environment>(None).await {
            Ok(envs) => {
                for env in envs {
                    self.queue.add(env.metadata.name).await;
                }
            }
            Err(e) => warn!("EnvironmentController resync error: {}", e),
        }
        match self.store.state().list_prefix(OWNERSHIP_PREFIX).await {
            Ok(entries) => {
                for (key, _) in entries {
                    if let Some(owner) = key.strip_prefix(OWNERSHIP_PREFIX) {
                        self.queue.add(owner).await;
                    }
                }
            }
            Err(e) => warn!("EnvironmentController ownership scan error: {}", e),
        }
        self.metrics.gauge_set(WORKQUEUE_DEPTH, self.queue.len().await as i64);
    }

    async fn work(self: Arc<Self>, id: usize) {
        debug!("Worker {} started", id);
        while let Some(name) = self.queue.get().await {
            match self.reconciler.reconcile(&name).await {
                Ok(Action::AwaitChange) => self.queue.forget(&name).await,
                Ok(Action::Requeue) => self.queue.add_rate_limited(name.as_str()).await,
                Err(e) => {
                    let retries = self.queue.num_requeues(&name).await;
                    warn!(
                        "Reconcile of Environment {} failed (retry {}): {:#}",
                        name, retries, e
                    );
                    self.queue.add_rate_limited(name.as_str()).await;
                }
            }
            self.queue.done(&name).await;
            self.metrics.gauge_set(WORKQUEUE_DEPTH, self.queue.len().await as i64);
        }
        debug!("Worker {} stopped", id);
    }
}

/// Running controller tasks.
pub struct ControllerHandle {
    queue: WorkQueue,
    watcher: JoinHandle<()>,
    resync: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Stop accepting work and wait for in-flight reconciles to finish.
    pub async fn shutdown(self) {
        self.watcher.abort();
        self.resync.abort();
        self.queue.shutdown().await;
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!("Worker ended abnormally: {}", e);
            }
        }
        info!("EnvironmentController stopped");
    }
}
