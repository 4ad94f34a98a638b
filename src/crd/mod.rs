//! # Custom Resource Definitions
//!
//! Cluster API types consumed by the cleaner.
//!
//! The controller does not own any of these CRDs; they are installed by
//! Cluster API and the vSphere infrastructure provider. Only the fields the
//! cleaner reads are modelled, everything else is ignored on deserialization.
//!
//! ## Module Structure
//!
//! - `vsphere_cluster.rs` - `VSphereCluster`, the managed resource
//! - `cluster.rs` - Cluster API `Cluster`, the owner
//! - `identity.rs` - cluster-scoped `VSphereClusterIdentity`

mod cluster;
mod identity;
mod vsphere_cluster;

pub use cluster::{Cluster, ClusterSpec};
pub use identity::{VSphereClusterIdentity, VSphereClusterIdentitySpec};
pub use vsphere_cluster::{IdentityKind, IdentityRef, VSphereCluster, VSphereClusterSpec};
