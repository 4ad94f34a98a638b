//! # Owner Resolution
//!
//! Finds the Cluster API `Cluster` that owns a `VSphereCluster` and decides
//! whether reconciliation is paused.

use crate::constants::{CLUSTER_API_GROUP, PAUSED_ANNOTATION};
use crate::crd::{Cluster, VSphereCluster};
use crate::store::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::debug;

/// Lookup of the owning cluster
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    /// `Ok(None)` when no owner reference is set yet, or the owner no longer exists
    async fn owner_cluster(&self, cluster: &VSphereCluster) -> Result<Option<Cluster>, StoreError>;
}

/// Pause predicate over the owner and the managed object
pub trait PausePredicate: Send + Sync {
    fn is_paused(&self, owner: &Cluster, cluster: &VSphereCluster) -> bool;
}

/// Resolve the owner through `metadata.ownerReferences`
pub struct KubeOwnerResolver {
    clusters: Arc<dyn ObjectStore<Cluster>>,
}

impl std::fmt::Debug for KubeOwnerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeOwnerResolver").finish_non_exhaustive()
    }
}

impl KubeOwnerResolver {
    #[must_use]
    pub fn new(clusters: Arc<dyn ObjectStore<Cluster>>) -> Self {
        Self { clusters }
    }
}

/// Name of the Cluster API `Cluster` listed as owner, if any
#[must_use]
pub fn owner_cluster_name(cluster: &VSphereCluster) -> Option<&str> {
    cluster
        .owner_references()
        .iter()
        .find(|r| r.kind == "Cluster" && api_group(&r.api_version) == CLUSTER_API_GROUP)
        .map(|r| r.name.as_str())
}

fn api_group(api_version: &str) -> &str {
    api_version
        .split_once('/')
        .map_or("", |(group, _version)| group)
}

#[async_trait]
impl OwnerResolver for KubeOwnerResolver {
    async fn owner_cluster(&self, cluster: &VSphereCluster) -> Result<Option<Cluster>, StoreError> {
        let Some(owner_name) = owner_cluster_name(cluster) else {
            return Ok(None);
        };

        let key = ObjectKey::new(cluster.namespace().unwrap_or_default(), owner_name);
        let owner = self.clusters.get(&key).await?;
        if owner.is_none() {
            debug!(owner = %key, "Owner cluster referenced but not found");
        }
        Ok(owner)
    }
}

/// Paused when the owner sets `spec.paused`, or either object carries the paused annotation
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationPausePredicate;

impl PausePredicate for AnnotationPausePredicate {
    fn is_paused(&self, owner: &Cluster, cluster: &VSphereCluster) -> bool {
        owner.spec.paused.unwrap_or(false)
            || owner.annotations().contains_key(PAUSED_ANNOTATION)
            || cluster.annotations().contains_key(PAUSED_ANNOTATION)
    }
}
