//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use cluster_api_cleaner_vsphere::prelude::*;
//! ```
//!
//! This brings into scope:
//! - CRD types (`VSphereCluster`, `Cluster`, `VSphereClusterIdentity`)
//! - Reconciler entry point, outcomes and errors
//! - The store, session and cleaner seams
//! - Config types

// CRD types - most commonly used
pub use crate::crd::*;

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, BackoffState, CredentialResolver, DeletionState, Outcome, OwnerResolver,
    PausePredicate, Reconciler, ReconcilerError,
};

// Seams substituted in tests
pub use crate::cancel::{CancelScope, Cancelled};
pub use crate::cleaner::{Cleaner, VolumeCleaner};
pub use crate::provider::{CnsVolume, TaskRef, TaskState, VCenterApi};
pub use crate::session::{Credentials, Session, SessionKey, SessionParams, SessionProvider};
pub use crate::store::{ObjectKey, ObjectStore, StoreError};

// Config types - for configuration management
pub use crate::config::{ControllerConfig, LogFormat, SharedControllerConfig};
