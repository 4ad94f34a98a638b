//! # Reconciler
//!
//! Core reconciliation logic for `VSphereCluster` resources.
//!
//! The reconciler:
//! - Keeps the cleaner finalizer on every live `VSphereCluster` and its identity secret
//! - On deletion, runs the registered cleaners against vCenter
//! - Releases the finalizers only after every cleaner reports that nothing is left
//!
//! ## Module Structure
//!
//! - `reconcile`: entry point, normal path and deletion orchestrator
//! - `finalizer`: idempotent finalizer add/remove
//! - `owner`: owner lookup and pause predicate
//! - `identity`: credential resolution
//! - `types`: reconciler context, outcomes and errors

pub mod finalizer;
pub mod identity;
pub mod owner;
pub mod reconcile;
pub mod types;

// Re-export public API
pub use identity::{CredentialResolver, KubeCredentialResolver};
pub use owner::{AnnotationPausePredicate, KubeOwnerResolver, OwnerResolver, PausePredicate};
pub use reconcile::reconcile;
pub use types::{BackoffState, DeletionState, Outcome, Reconciler, ReconcilerError};
