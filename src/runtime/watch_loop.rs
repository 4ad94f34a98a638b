//! # Watch Loop
//!
//! Controller watch loop that monitors `VSphereCluster` resources and triggers
//! reconciliation when changes are detected.

use crate::cancel::CancelScope;
use crate::controller::reconciler::{reconcile, Outcome, Reconciler, ReconcilerError};
use crate::controller::server::ServerState;
use crate::crd::VSphereCluster;
use crate::observability;
use crate::runtime::error_policy::{
    handle_reconciliation_error, handle_watch_stream_error, reset_backoff,
};
use crate::store::ObjectKey;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, controller::Action, watcher, Controller};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop
///
/// Watches every `VSphereCluster` in the cluster and reconciles each one as it
/// changes. Reconciliations of different objects run concurrently up to the
/// configured limit; the same object is never reconciled twice at once.
/// Returns after a shutdown signal, once in-flight reconciliations have
/// observed the cancelled `shutdown` token.
pub async fn run_watch_loop(
    clusters: Api<VSphereCluster>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    shutdown: CancellationToken,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loop...");

    spawn_shutdown_handler(Arc::clone(&server_state), shutdown.clone())?;

    let concurrency = reconciler.config.max_concurrent_reconciliations;
    let restart_delay = reconciler.config.watch_restart_delay_duration();

    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        let reconcile_shutdown = shutdown.clone();
        Controller::new(clusters.clone(), watcher::Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(concurrency))
            .graceful_shutdown_on(shutdown.clone().cancelled_owned())
            .run(
                move |obj, ctx| reconcile_object(obj, ctx, reconcile_shutdown.child_token()),
                handle_reconciliation_error,
                Arc::clone(&reconciler),
            )
            .for_each(|result| async move {
                match result {
                    Ok((object, _action)) => {
                        debug!(resource = %object, "watch.event.success");
                    }
                    // Already logged and counted by the error policy
                    Err(controller::Error::ReconcilerFailed(error, object)) => {
                        debug!(resource = %object, error = %error, "watch.event.reconcile_failed");
                    }
                    Err(e) => {
                        handle_watch_stream_error(&format!("{e:?}"), restart_delay).await;
                    }
                }
            })
            .instrument(watch_span)
            .await;

        if shutdown.is_cancelled() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::select! {
            () = shutdown.cancelled() => {}
            () = tokio::time::sleep(restart_delay) => {}
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Spawn the task that turns SIGINT/SIGTERM into a cancelled `shutdown` token
///
/// Signal handlers are installed before this returns, so a signal arriving
/// right after startup is not lost.
fn spawn_shutdown_handler(
    server_state: Arc<ServerState>,
    shutdown: CancellationToken,
) -> std::io::Result<JoinHandle<()>> {
    let signal = shutdown_signal()?;
    Ok(tokio::spawn(async move {
        signal.await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        server_state.set_ready(false);
        shutdown.cancel();
        info!("Marked server as not ready, waiting for in-flight reconciliations to stop...");
    }))
}

#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
}

/// Run one reconciliation inside its own cancel scope and map the outcome to an [`Action`]
async fn reconcile_object(
    obj: Arc<VSphereCluster>,
    ctx: Arc<Reconciler>,
    token: CancellationToken,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::from_resource(obj.as_ref())
        .ok_or_else(|| ReconcilerError::InvalidObject("VSphereCluster has no name".to_string()))?;
    let scope = CancelScope::with_timeout(token, ctx.config.reconcile_timeout_duration());

    let outcome = reconcile(&key, &ctx, &scope).await?;
    reset_backoff(&ctx, &obj);

    Ok(action_for(outcome))
}

/// Requeue only while cleanup is in flight; everything else waits for the next change
fn action_for(outcome: Outcome) -> Action {
    match outcome.requeue_after() {
        Some(delay) => {
            observability::metrics::increment_requeues_total("cleanup-running");
            Action::requeue(delay)
        }
        None => Action::await_change(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::DeletionState;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn test_cleanup_running_requeues_after_fixed_delay() {
        let action = action_for(Outcome::Deletion(DeletionState::CleanupRunning {
            requeue_after: Duration::from_secs(10),
        }));
        assert_eq!(
            format!("{action:?}"),
            format!("{:?}", Action::requeue(Duration::from_secs(10)))
        );
    }

    #[test]
    fn test_terminal_outcomes_wait_for_changes() {
        for outcome in [
            Outcome::NotFound,
            Outcome::Protected,
            Outcome::Deletion(DeletionState::Blocked),
            Outcome::Deletion(DeletionState::CleanupComplete),
        ] {
            assert_eq!(
                format!("{:?}", action_for(outcome)),
                format!("{:?}", Action::await_change())
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_cancels_root_token_and_clears_readiness() {
        let state = Arc::new(ServerState {
            is_ready: Arc::new(AtomicBool::new(true)),
        });
        let shutdown = CancellationToken::new();
        spawn_shutdown_handler(Arc::clone(&state), shutdown.clone()).unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), shutdown.cancelled())
            .await
            .unwrap();
        assert!(!state.is_ready());
    }
}
