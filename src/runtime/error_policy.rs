//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//!
//! Retry scheduling lives here, outside the reconciler: a failed
//! reconciliation is retried with a per-resource Fibonacci backoff, a
//! successful one resets that resource's backoff.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::VSphereCluster;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay before retrying after a concurrent-update conflict
const CONFLICT_RETRY: Duration = Duration::from_secs(1);

fn resource_key(obj: &VSphereCluster) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing cluster does not
/// slow down the others.
pub fn handle_reconciliation_error(
    obj: Arc<VSphereCluster>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let resource_key = resource_key(&obj);

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %obj.name_any(),
        resource.namespace = %obj.namespace().unwrap_or_default(),
        error = %error
    );
    let _error_guard = error_span.enter();

    observability::metrics::increment_reconciliation_errors();

    // Finalizer updates are idempotent, so a conflict is retried right away
    // with a fresh copy instead of growing the backoff.
    if error.is_conflict() {
        warn!("Update conflict for {}, retrying: {}", resource_key, error);
        observability::metrics::increment_requeues_total("conflict");
        return Action::requeue(CONFLICT_RETRY);
    }

    error!("Reconciliation error for {}: {}", resource_key, error);

    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(resource_key.clone())
                .or_insert_with(|| ctx.new_backoff_state());
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (ctx.config.backoff_max_secs, 0)
        }
    };

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));
    info!(
        "Retrying {} with Fibonacci backoff: {}s (error count: {}, next retry: {})",
        resource_key,
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Forget the backoff of a resource after it reconciled successfully
pub fn reset_backoff(ctx: &Reconciler, obj: &VSphereCluster) {
    let resource_key = resource_key(obj);
    if let Ok(mut states) = ctx.backoff_states.lock() {
        if let Some(state) = states.remove(&resource_key) {
            if state.error_count > 0 {
                debug!(
                    "Reset backoff for {} after {} failed attempts",
                    resource_key, state.error_count
                );
            }
        }
    }
}

/// Log a watch stream error; waits out authentication failures before the stream resumes
pub async fn handle_watch_stream_error(error_string: &str, watch_restart_delay: Duration) {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    let is_401 = error_string.contains("401") || error_string.contains("Unauthorized");
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");

    if is_401 {
        error!("Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
        warn!(
            "Waiting {}s before retrying watch",
            watch_restart_delay.as_secs()
        );
        tokio::time::sleep(watch_restart_delay).await;
    } else if is_410 {
        warn!("Watch resource version expired (410), watch will restart");
    } else {
        error!("Controller stream error: {}", error_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::crd::VSphereClusterSpec;
    use crate::store::{ObjectKey, StoreError};
    use kube::Client;

    fn reconciler() -> Arc<Reconciler> {
        // `Client::try_from` needs no cluster connection, only a URL.
        let config = kube::Config::new("http://127.0.0.1:1".parse().unwrap());
        let client = Client::try_from(config).unwrap();
        Arc::new(Reconciler::new(client, Arc::new(ControllerConfig::default())))
    }

    fn cluster() -> Arc<VSphereCluster> {
        let mut cluster = VSphereCluster::new("demo", VSphereClusterSpec::default());
        cluster.metadata.namespace = Some("org-acme".to_string());
        Arc::new(cluster)
    }

    fn backoff_of(action: &Action) -> String {
        format!("{action:?}")
    }

    #[tokio::test]
    async fn test_error_backoff_grows_per_resource() {
        let ctx = reconciler();
        let error = ReconcilerError::InvalidObject("broken".to_string());

        let first = handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));
        let second = handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));
        let third = handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));

        assert_eq!(backoff_of(&first), backoff_of(&Action::requeue(Duration::from_secs(5))));
        assert_eq!(backoff_of(&second), backoff_of(&Action::requeue(Duration::from_secs(5))));
        assert_eq!(backoff_of(&third), backoff_of(&Action::requeue(Duration::from_secs(10))));

        reset_backoff(&ctx, &cluster());
        assert!(ctx.backoff_states.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_retries_quickly() {
        let ctx = reconciler();
        let error: ReconcilerError = StoreError::Conflict {
            key: ObjectKey::new("org-acme", "demo"),
        }
        .into();

        let action = handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));

        assert_eq!(backoff_of(&action), backoff_of(&Action::requeue(CONFLICT_RETRY)));
        assert!(ctx.backoff_states.lock().unwrap().is_empty());
    }
}
