//! # Cleaners
//!
//! Pluggable cleanup steps run while a `VSphereCluster` is being deleted.
//!
//! Each cleaner removes one kind of remote resource tagged to the cluster.
//! Cleaners are registered in order and run sequentially against the same
//! session; returning `Ok(false)` means nothing tagged to the cluster remains
//! and no delete issued by the cleaner is still in flight.

mod volumes;

pub use volumes::VolumeCleaner;

use crate::cancel::CancelScope;
use crate::crd::VSphereCluster;
use crate::session::Session;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Cleaner: Send + Sync {
    /// Short name used in logs, metrics and errors
    fn name(&self) -> &'static str;

    /// Delete remote resources belonging to `cluster`
    ///
    /// Returns `true` when work remains and the deletion pass should be retried later.
    async fn clean(
        &self,
        scope: &CancelScope,
        session: &Session,
        cluster: &VSphereCluster,
    ) -> Result<bool>;
}
