//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Finalizer placed on every `VSphereCluster` (and its identity secret) until
/// the vSphere resources tagged to the cluster are gone.
pub const CLEANER_FINALIZER: &str = "vsphere-cleaner.finalizers.giantswarm.io";

/// Label carrying the owning Cluster API cluster name
pub const DEFAULT_CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Annotation that pauses reconciliation of a Cluster API object
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";

/// API group of the Cluster API core types
pub const CLUSTER_API_GROUP: &str = "cluster.x-k8s.io";

/// Secret keys holding vCenter credentials
pub const SECRET_USERNAME_KEY: &str = "username";
pub const SECRET_PASSWORD_KEY: &str = "password";

/// Default delay before re-running a deletion pass that still has work in flight (seconds)
pub const DEFAULT_CLEANUP_REQUEUE_SECS: u64 = 10;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default upper bound for a single reconciliation (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 300;

/// Default interval between vCenter task status polls (milliseconds)
pub const DEFAULT_TASK_POLL_INTERVAL_MS: u64 = 1000;

/// Default Fibonacci backoff starting value after a failed reconciliation (seconds)
pub const DEFAULT_BACKOFF_START_SECS: u64 = 5;

/// Default Fibonacci backoff maximum value (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default maximum number of clusters reconciled at the same time
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;
