//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_START_SECS, DEFAULT_CLEANUP_REQUEUE_SECS,
    DEFAULT_CLUSTER_NAME_LABEL, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
    DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_SERVER_POLL_INTERVAL_MS,
    DEFAULT_SERVER_STARTUP_TIMEOUT_SECS, DEFAULT_TASK_POLL_INTERVAL_MS,
    DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared, read-only controller configuration
pub type SharedControllerConfig = Arc<ControllerConfig>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Parse a format name, falling back to JSON for anything unknown
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Delay before re-running a deletion pass while cleanup is still in progress (seconds)
    pub cleanup_requeue_secs: u64,
    /// Label key that must name the owning cluster before deletion cleanup can start
    pub cluster_name_label: String,
    /// Namespace the controller runs in; `VSphereClusterIdentity` secrets live here
    pub controller_namespace: String,
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// How often to check whether the HTTP server is up (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: LogFormat,
    /// Maximum concurrent reconciliations across different clusters
    pub max_concurrent_reconciliations: u16,
    /// Upper bound for one reconciliation including all remote calls (seconds)
    pub reconcile_timeout_secs: u64,
    /// Interval between vCenter task status polls (milliseconds)
    pub task_poll_interval_ms: u64,
    /// Fibonacci backoff starting value after a failed reconciliation (seconds)
    pub backoff_start_secs: u64,
    /// Fibonacci backoff maximum value (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting the watch stream after it ends (seconds)
    pub watch_restart_delay_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cleanup_requeue_secs: DEFAULT_CLEANUP_REQUEUE_SECS,
            cluster_name_label: DEFAULT_CLUSTER_NAME_LABEL.to_string(),
            controller_namespace: "giantswarm".to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            log_level: "INFO".to_string(),
            log_format: LogFormat::Json,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            task_poll_interval_ms: DEFAULT_TASK_POLL_INTERVAL_MS,
            backoff_start_secs: DEFAULT_BACKOFF_START_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// `from_env` is this with `std::env::var`; tests pass a map instead.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            cleanup_requeue_secs: parse_or(&lookup, "CLEANUP_REQUEUE_SECS", defaults.cleanup_requeue_secs),
            cluster_name_label: lookup("CLUSTER_NAME_LABEL")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.cluster_name_label),
            controller_namespace: lookup("POD_NAMESPACE").unwrap_or(defaults.controller_namespace),
            metrics_port: parse_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            server_startup_timeout_secs: parse_or(
                &lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                defaults.server_startup_timeout_secs,
            ),
            server_poll_interval_ms: parse_or(
                &lookup,
                "SERVER_POLL_INTERVAL_MS",
                defaults.server_poll_interval_ms,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map_or(defaults.log_format, |v| LogFormat::parse(&v)),
            max_concurrent_reconciliations: parse_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            reconcile_timeout_secs: parse_or(
                &lookup,
                "RECONCILE_TIMEOUT_SECS",
                defaults.reconcile_timeout_secs,
            ),
            task_poll_interval_ms: parse_or(
                &lookup,
                "TASK_POLL_INTERVAL_MS",
                defaults.task_poll_interval_ms,
            ),
            backoff_start_secs: parse_or(&lookup, "BACKOFF_START_SECS", defaults.backoff_start_secs),
            backoff_max_secs: parse_or(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max_secs),
            watch_restart_delay_secs: parse_or(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
        }
    }

    /// Get the fixed delay used while cleanup is still in progress
    pub fn cleanup_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.cleanup_requeue_secs)
    }

    /// Get the per-reconcile timeout
    pub fn reconcile_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get the vCenter task poll interval
    pub fn task_poll_interval_duration(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read a key and parse it, or return the default when unset or malformed
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
