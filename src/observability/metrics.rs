//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `vsphere_cleaner_reconciliations_total` - Total number of reconciliations
//! - `vsphere_cleaner_reconciliation_errors_total` - Total number of reconciliation errors
//! - `vsphere_cleaner_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `vsphere_cleaner_reconcile_outcomes_total` - Reconciliations by outcome
//! - `vsphere_cleaner_cleanup_requeues_total` - Deletion passes that had to come back later
//! - `vsphere_cleaner_finalizer_operations_total` - Finalizers added or removed, by object kind
//! - `vsphere_cleaner_volumes_deleted_total` - CNS volumes deleted in vCenter
//! - `vsphere_cleaner_sessions_created_total` - vCenter sessions established
//! - `vsphere_cleaner_requeues_total` - Requeues scheduled by the controller, by reason

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vsphere_cleaner_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vsphere_cleaner_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "vsphere_cleaner_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static RECONCILE_OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vsphere_cleaner_reconcile_outcomes_total",
            "Total number of reconciliations by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create RECONCILE_OUTCOMES_TOTAL metric - this should never happen")
});

static CLEANUP_REQUEUES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vsphere_cleaner_cleanup_requeues_total",
        "Total number of deletion passes that requested another pass",
    )
    .expect("Failed to create CLEANUP_REQUEUES_TOTAL metric - this should never happen")
});

static FINALIZER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vsphere_cleaner_finalizer_operations_total",
            "Total number of finalizer additions and removals",
        ),
        &["operation", "kind"],
    )
    .expect("Failed to create FINALIZER_OPERATIONS_TOTAL metric - this should never happen")
});

static VOLUMES_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vsphere_cleaner_volumes_deleted_total",
        "Total number of CNS volumes deleted in vCenter",
    )
    .expect("Failed to create VOLUMES_DELETED_TOTAL metric - this should never happen")
});

static SESSIONS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vsphere_cleaner_sessions_created_total",
        "Total number of vCenter sessions established",
    )
    .expect("Failed to create SESSIONS_CREATED_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vsphere_cleaner_requeues_total",
            "Total number of requeues scheduled by the controller",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_OUTCOMES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CLEANUP_REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FINALIZER_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VOLUMES_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SESSIONS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_reconcile_outcome(outcome: &str) {
    RECONCILE_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_cleanup_requeues() {
    CLEANUP_REQUEUES_TOTAL.inc();
}

pub fn increment_finalizer_operations(operation: &str, kind: &str) {
    FINALIZER_OPERATIONS_TOTAL
        .with_label_values(&[operation, kind])
        .inc();
}

pub fn increment_volumes_deleted(count: u64) {
    VOLUMES_DELETED_TOTAL.inc_by(count);
}

pub fn increment_sessions_created() {
    SESSIONS_CREATED_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
