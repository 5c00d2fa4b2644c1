//! Reconciliation metrics rendered in Prometheus text exposition format.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const RECONCILE_TOTAL: &str = "cno_reconcile_total";
pub const RECONCILE_ERRORS_TOTAL: &str = "cno_reconcile_errors_total";
pub const RECONCILE_REQUEUES_TOTAL: &str = "cno_reconcile_requeues_total";
pub const CHILD_CREATES_TOTAL: &str = "cno_child_creates_total";
pub const CHILD_UPDATES_TOTAL: &str = "cno_child_updates_total";
pub const GARBAGE_COLLECTED_TOTAL: &str = "cno_garbage_collected_total";
pub const WORKQUEUE_DEPTH: &str = "cno_workqueue_depth";

/// A lightweight, thread-safe metrics registry.
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, Counter>>,
    gauges: RwLock<BTreeMap<String, Gauge>>,
}

/// Monotonically increasing counter.
pub struct Counter {
    value: AtomicU64,
    help: String,
}

/// Value that can go up or down.
pub struct Gauge {
    value: AtomicI64,
    help: String,
}

// The maps only ever gain entries, so a poisoned lock still holds valid data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            gauges: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry with every operator metric registered.
    pub fn with_operator_metrics() -> Self {
        let registry = Self::new();
        registry.register_counter(RECONCILE_TOTAL, "Reconciliation invocations");
        registry.register_counter(RECONCILE_ERRORS_TOTAL, "Reconciliation invocations that failed");
        registry.register_counter(
            RECONCILE_REQUEUES_TOTAL,
            "Reconciliation invocations that requested continuation",
        );
        registry.register_counter(CHILD_CREATES_TOTAL, "Derived resources created");
        registry.register_counter(CHILD_UPDATES_TOTAL, "Derived resource updates issued");
        registry.register_counter(
            GARBAGE_COLLECTED_TOTAL,
            "Derived resources deleted after their Environment was removed",
        );
        registry.register_gauge(WORKQUEUE_DEPTH, "Environments waiting in the work queue");
        registry
    }

    /// Register a counter. If it already exists, this is a no-op.
    pub fn register_counter(&self, name: &str, help: &str) {
        write(&self.counters)
            .entry(name.to_string())
            .or_insert_with(|| Counter {
                value: AtomicU64::new(0),
                help: help.to_string(),
            });
    }

    /// Register a gauge. If it already exists, this is a no-op.
    pub fn register_gauge(&self, name: &str, help: &str) {
        write(&self.gauges)
            .entry(name.to_string())
            .or_insert_with(|| Gauge {
                value: AtomicI64::new(0),
                help: help.to_string(),
            });
    }

    /// Increment a counter by 1.
    pub fn counter_inc(&self, name: &str) {
        self.counter_add(name, 1);
    }

    /// Increment a counter by a given amount.
    pub fn counter_add(&self, name: &str, val: u64) {
        if let Some(c) = read(&self.counters).get(name) {
            c.value.fetch_add(val, Ordering::Relaxed);
        }
    }

    /// Current value of a counter, `None` if unregistered.
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        read(&self.counters)
            .get(name)
            .map(|c| c.value.load(Ordering::Relaxed))
    }

    /// Set a gauge to a specific value.
    pub fn gauge_set(&self, name: &str, val: i64) {
        if let Some(g) = read(&self.gauges).get(name) {
            g.value.store(val, Ordering::Relaxed);
        }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut output = String::new();

        for (name, counter) in read(&self.counters).iter() {
            let _ = writeln!(output, "# HELP {} {}", name, counter.help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, counter.value.load(Ordering::Relaxed));
        }

        for (name, gauge) in read(&self.gauges).iter() {
            let _ = writeln!(output, "# HELP {} {}", name, gauge.help);
            let _ = writeln!(output, "# TYPE {} gauge", name);
            let _ = writeln!(output, "{} {}", name, gauge.value.load(Ordering::Relaxed));
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_metrics() {
        let registry = MetricsRegistry::with_operator_metrics();
        registry.counter_inc(RECONCILE_TOTAL);
        registry.counter_add(CHILD_CREATES_TOTAL, 4);
        registry.gauge_set(WORKQUEUE_DEPTH, 3);

        let text = registry.render();
        assert!(text.contains("# TYPE cno_reconcile_total counter\ncno_reconcile_total 1\n"));
        assert!(text.contains("cno_child_creates_total 4\n"));
        assert!(text.contains("# TYPE cno_workqueue_depth gauge\ncno_workqueue_depth 3\n"));
    }

    #[test]
    fn unregistered_names_are_ignored() {
        let registry = MetricsRegistry::new();
        registry.counter_inc("missing");
        assert_eq!(registry.counter_value("missing"), None);
        assert_eq!(registry.render(), "");
    }
}
