//! # Types
//!
//! Core types for the reconciler.

use super::identity::{default_credentials_from_env, CredentialResolver, KubeCredentialResolver};
use super::owner::{AnnotationPausePredicate, KubeOwnerResolver, OwnerResolver, PausePredicate};
use crate::cancel::Cancelled;
use crate::cleaner::{Cleaner, VolumeCleaner};
use crate::config::SharedControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::{Cluster, VSphereCluster, VSphereClusterIdentity};
use crate::session::{CachingSessionProvider, SessionProvider};
use crate::store::{KubeClusterStore, KubeStore, ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Store operation failed: {0}")]
    Store(#[source] StoreError),

    #[error("Update rejected, object changed concurrently: {0}")]
    PersistenceConflict(#[source] StoreError),

    #[error("Failed to resolve vCenter credentials: {0:#}")]
    Credentials(#[source] anyhow::Error),

    #[error("Failed to acquire vCenter session: {0:#}")]
    Session(#[source] anyhow::Error),

    #[error("Cleaner '{cleaner}' failed: {source:#}")]
    Cleanup {
        cleaner: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Reconciliation interrupted: {0}")]
    Cancelled(#[from] Cancelled),

    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl From<StoreError> for ReconcilerError {
    fn from(err: StoreError) -> Self {
        if err.is_conflict() {
            ReconcilerError::PersistenceConflict(err)
        } else {
            ReconcilerError::Store(err)
        }
    }
}

impl ReconcilerError {
    /// Concurrent update race; safe to retry right away since finalizer updates are idempotent
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcilerError::PersistenceConflict(_))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReconcilerError::Cancelled(_))
    }
}

/// Where a deletion pass ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    /// Finalizer already absent; nothing to do
    NotStarted,
    /// Owning-cluster label missing; finalizer stays until someone intervenes
    Blocked,
    /// Cleaners still have work in flight; run again after `requeue_after`
    CleanupRunning { requeue_after: Duration },
    /// Remote resources gone, finalizers removed
    CleanupComplete,
}

/// Result of one reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Object no longer exists
    NotFound,
    /// Owner reference not set yet
    OwnerNotSet,
    Paused,
    /// Normal path: finalizers are in place
    Protected,
    Deletion(DeletionState),
}

impl Outcome {
    /// Fixed delay requested by the deletion pass, if any
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Outcome::Deletion(DeletionState::CleanupRunning { requeue_after }) => {
                Some(*requeue_after)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NotFound => "not-found",
            Outcome::OwnerNotSet => "owner-not-set",
            Outcome::Paused => "paused",
            Outcome::Protected => "protected",
            Outcome::Deletion(DeletionState::NotStarted) => "deletion-not-started",
            Outcome::Deletion(DeletionState::Blocked) => "deletion-blocked",
            Outcome::Deletion(DeletionState::CleanupRunning { .. }) => "cleanup-running",
            Outcome::Deletion(DeletionState::CleanupComplete) => "cleanup-complete",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(start_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(start_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Everything a reconciliation needs, shared by all reconcile calls
#[derive(Clone)]
pub struct Reconciler {
    pub config: SharedControllerConfig,
    pub clusters: Arc<dyn ObjectStore<VSphereCluster>>,
    pub secrets: Arc<dyn ObjectStore<Secret>>,
    pub owners: Arc<dyn OwnerResolver>,
    pub pause: Arc<dyn PausePredicate>,
    pub credentials: Arc<dyn CredentialResolver>,
    pub sessions: Arc<dyn SessionProvider>,
    /// Run in this order during every deletion pass
    pub cleaners: Vec<Arc<dyn Cleaner>>,
    // Backoff state per resource (identified by namespace/name), used by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cleaners: Vec<&str> = self.cleaners.iter().map(|c| c.name()).collect();
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("cleaners", &cleaners)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Reconciler wired to the Kubernetes API and the vCenter REST API
    #[must_use]
    pub fn new(client: Client, config: SharedControllerConfig) -> Self {
        let namespaced = Arc::new(KubeStore::new(client.clone()));
        let cluster_scoped = Arc::new(KubeClusterStore::new(client));

        let clusters: Arc<dyn ObjectStore<VSphereCluster>> = Arc::<KubeStore>::clone(&namespaced);
        let secrets: Arc<dyn ObjectStore<Secret>> = Arc::<KubeStore>::clone(&namespaced);
        let owner_clusters: Arc<dyn ObjectStore<Cluster>> = namespaced;
        let identities: Arc<dyn ObjectStore<VSphereClusterIdentity>> = cluster_scoped;

        let credentials = KubeCredentialResolver::new(
            Arc::clone(&secrets),
            identities,
            config.controller_namespace.clone(),
            default_credentials_from_env(),
        );

        let cleaners: Vec<Arc<dyn Cleaner>> = vec![Arc::new(VolumeCleaner::new(
            config.task_poll_interval_duration(),
        ))];

        Self {
            clusters,
            secrets,
            owners: Arc::new(KubeOwnerResolver::new(owner_clusters)),
            pause: Arc::new(AnnotationPausePredicate),
            credentials: Arc::new(credentials),
            sessions: Arc::new(CachingSessionProvider::rest()),
            cleaners,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Fresh backoff state using the configured bounds
    #[must_use]
    pub fn new_backoff_state(&self) -> BackoffState {
        BackoffState::new(self.config.backoff_start_secs, self.config.backoff_max_secs)
    }
}
