//! # Reconciliation Logic
//!
//! Entry point for a single `VSphereCluster` reconciliation.
//!
//! 1. Load the object; gone means done
//! 2. Resolve the owning `Cluster`; no owner yet means wait for the next event
//! 3. Skip paused objects
//! 4. Dispatch on the deletion timestamp to the normal or deletion path
//!
//! Steps 1-3 only read. Errors are returned to the caller, which owns retry
//! scheduling.

mod delete;
mod normal;

pub use delete::reconcile_delete;
pub use normal::reconcile_normal;

use crate::cancel::CancelScope;
use crate::controller::reconciler::types::{Outcome, Reconciler, ReconcilerError};
use crate::observability;
use crate::store::ObjectKey;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

/// Reconcile the `VSphereCluster` identified by `key`
///
/// Every blocking call runs inside `scope`; when the scope ends the
/// reconciliation stops and returns [`ReconcilerError::Cancelled`].
pub async fn reconcile(
    key: &ObjectKey,
    ctx: &Reconciler,
    scope: &CancelScope,
) -> Result<Outcome, ReconcilerError> {
    let span = info_span!(
        "reconcile",
        resource.namespace = %key.namespace,
        resource.name = %key.name
    );

    async move {
        let start = Instant::now();
        observability::metrics::increment_reconciliations();

        let result = dispatch(key, ctx, scope).await;

        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if let Ok(outcome) = &result {
            observability::metrics::increment_reconcile_outcome(outcome.as_str());
        }
        result
    }
    .instrument(span)
    .await
}

async fn dispatch(
    key: &ObjectKey,
    ctx: &Reconciler,
    scope: &CancelScope,
) -> Result<Outcome, ReconcilerError> {
    scope.check()?;

    let Some(cluster) = scope.run(ctx.clusters.get(key)).await?? else {
        debug!("VSphereCluster not found, nothing to do");
        return Ok(Outcome::NotFound);
    };

    let Some(owner) = scope.run(ctx.owners.owner_cluster(&cluster)).await?? else {
        debug!("Owner Cluster not set yet, waiting");
        return Ok(Outcome::OwnerNotSet);
    };

    if ctx.pause.is_paused(&owner, &cluster) {
        debug!("Reconciliation paused");
        return Ok(Outcome::Paused);
    }

    if cluster.is_being_deleted() {
        reconcile_delete(&cluster, ctx, scope)
            .await
            .map(Outcome::Deletion)
    } else {
        reconcile_normal(&cluster, ctx, scope)
            .await
            .map(|()| Outcome::Protected)
    }
}
