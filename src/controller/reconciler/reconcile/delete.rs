//! # Deletion Orchestrator
//!
//! Runs the registered cleaners for a `VSphereCluster` that is being deleted
//! and releases the finalizers once nothing is left in vCenter.
//!
//! ```text
//! finalizer absent ─────────────────────────────► NotStarted
//! cluster-name label absent ────────────────────► Blocked
//! session + cleaners, any requeue ──────────────► CleanupRunning (requeue)
//! session + cleaners, all done ─► strip secret finalizer, then cluster finalizer ─► CleanupComplete
//! ```
//!
//! A pass is all-or-nothing: if any cleaner fails or asks for a requeue, no
//! finalizer is touched.

use crate::cancel::{CancelScope, Cancelled};
use crate::constants::CLEANER_FINALIZER;
use crate::controller::reconciler::finalizer;
use crate::controller::reconciler::types::{DeletionState, Reconciler, ReconcilerError};
use crate::crd::VSphereCluster;
use crate::observability;
use crate::session::SessionParams;
use crate::store::{ObjectKey, StoreError};
use kube::ResourceExt;
use tracing::{debug, info, warn};

pub async fn reconcile_delete(
    cluster: &VSphereCluster,
    ctx: &Reconciler,
    scope: &CancelScope,
) -> Result<DeletionState, ReconcilerError> {
    if !finalizer::has_finalizer(cluster, CLEANER_FINALIZER) {
        debug!("Finalizer not present, nothing to clean up");
        return Ok(DeletionState::NotStarted);
    }

    let label = ctx.config.cluster_name_label.as_str();
    let Some(cluster_name) = cluster.labels().get(label) else {
        warn!(
            label = label,
            "VSphereCluster has no owning cluster label, cleanup blocked until it is added or the finalizer is removed manually"
        );
        return Ok(DeletionState::Blocked);
    };
    info!(cluster = %cluster_name, "Cleaning vSphere resources belonging to cluster");

    let credentials = scope
        .run(ctx.credentials.credentials_for(cluster))
        .await?
        .map_err(ReconcilerError::Credentials)?;
    let params = SessionParams {
        server: cluster.spec.server.clone(),
        thumbprint: cluster.spec.thumbprint.clone(),
        credentials,
    };
    let session = scope
        .run(ctx.sessions.get_or_create(&params))
        .await?
        .map_err(ReconcilerError::Session)?;

    let mut requeue = false;
    for cleaner in &ctx.cleaners {
        scope.check()?;
        let cleaner_requeue = scope
            .run(cleaner.clean(scope, &session, cluster))
            .await?
            .map_err(|source| cleanup_error(cleaner.name(), source))?;
        debug!(
            cleaner = cleaner.name(),
            requeue = cleaner_requeue,
            "Cleaner finished"
        );
        requeue |= cleaner_requeue;
    }

    if requeue {
        let requeue_after = ctx.config.cleanup_requeue_duration();
        observability::metrics::increment_cleanup_requeues();
        info!(
            requeue_after_secs = requeue_after.as_secs(),
            "Cleanup still in progress, checking again later"
        );
        return Ok(DeletionState::CleanupRunning { requeue_after });
    }

    // The secret goes first: once the cluster finalizer is gone the object
    // can vanish and nothing would be left to release the secret.
    if let Some(secret_name) = cluster.identity_secret_name() {
        let key = ObjectKey::new(cluster.namespace().unwrap_or_default(), secret_name);
        release_secret(&key, ctx, scope).await?;
    }

    scope
        .run(finalizer::remove(ctx.clusters.as_ref(), cluster, CLEANER_FINALIZER))
        .await??;

    info!("Cleanup complete, VSphereCluster released");
    Ok(DeletionState::CleanupComplete)
}

/// Remove the finalizer from the identity secret; a missing secret is already released
async fn release_secret(
    key: &ObjectKey,
    ctx: &Reconciler,
    scope: &CancelScope,
) -> Result<(), ReconcilerError> {
    let Some(secret) = scope.run(ctx.secrets.get(key)).await?? else {
        debug!(secret = %key, "Identity secret already gone");
        return Ok(());
    };

    match scope
        .run(finalizer::remove(ctx.secrets.as_ref(), &secret, CLEANER_FINALIZER))
        .await?
    {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound { .. }) => {
            debug!(secret = %key, "Identity secret deleted while releasing it");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Cancellation surfaced through a cleaner is reported as such, not as a cleaner failure
fn cleanup_error(cleaner: &'static str, source: anyhow::Error) -> ReconcilerError {
    match source
        .chain()
        .find_map(|cause| cause.downcast_ref::<Cancelled>())
    {
        Some(cancelled) => ReconcilerError::Cancelled(*cancelled),
        None => ReconcilerError::Cleanup { cleaner, source },
    }
}
