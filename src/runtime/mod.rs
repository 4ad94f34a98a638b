//! # Runtime
//!
//! Process-level wiring around the reconciler.
//!
//! - `initialization`: crypto provider, tracing, metrics, HTTP server and client setup
//! - `watch_loop`: the `kube_runtime::Controller` driving reconciliations
//! - `error_policy`: per-resource retry backoff and watch error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
