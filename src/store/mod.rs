//! # Object Store
//!
//! Read and update access to the records the cleaner protects.
//!
//! The reconciler only ever needs two operations per kind: fetch an object by
//! identity (absence is a normal answer, not an error) and write back a
//! modified object (subject to the API server's optimistic concurrency).
//! `KubeStore` and `KubeClusterStore` implement them on top of `kube::Api`;
//! tests substitute an in-memory store.

mod kubernetes;

pub use kubernetes::{KubeClusterStore, KubeStore};

use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use thiserror::Error;

/// Namespace and name of a stored object
///
/// Cluster-scoped objects use an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key for a cluster-scoped object
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    /// Key of an existing object, `None` if it has no name
    pub fn from_resource<K: Resource>(object: &K) -> Option<Self> {
        let name = object.meta().name.clone()?;
        Some(Self::new(object.namespace().unwrap_or_default(), name))
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{key} was modified concurrently, update rejected")]
    Conflict { key: ObjectKey },

    #[error("{key} not found")]
    NotFound { key: ObjectKey },

    #[error("object has no name, cannot address it")]
    MissingName,

    #[error("API request for {key} failed: {source}")]
    Api {
        key: ObjectKey,
        #[source]
        source: kube::Error,
    },
}

impl StoreError {
    /// Whether retrying with a fresh copy of the object is expected to succeed
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Get/update access to objects of kind `K`
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch an object; `Ok(None)` when it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    /// Replace an object and return the stored version
    ///
    /// Fails with [`StoreError::Conflict`] when the object changed since it was read.
    async fn update(&self, object: &K) -> Result<K, StoreError>;
}
