//! # Normal Path
//!
//! Puts the cleaner finalizer on a live `VSphereCluster` and, for
//! secret-backed identities, on the identity secret as well.

use crate::cancel::CancelScope;
use crate::constants::CLEANER_FINALIZER;
use crate::controller::reconciler::finalizer;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::VSphereCluster;
use crate::store::{ObjectKey, StoreError};
use kube::ResourceExt;

pub async fn reconcile_normal(
    cluster: &VSphereCluster,
    ctx: &Reconciler,
    scope: &CancelScope,
) -> Result<(), ReconcilerError> {
    scope
        .run(finalizer::ensure(ctx.clusters.as_ref(), cluster, CLEANER_FINALIZER))
        .await??;

    if let Some(secret_name) = cluster.identity_secret_name() {
        let key = ObjectKey::new(cluster.namespace().unwrap_or_default(), secret_name);
        let secret = scope
            .run(ctx.secrets.get(&key))
            .await??
            .ok_or(StoreError::NotFound { key })?;
        scope
            .run(finalizer::ensure(ctx.secrets.as_ref(), &secret, CLEANER_FINALIZER))
            .await??;
    }

    Ok(())
}
