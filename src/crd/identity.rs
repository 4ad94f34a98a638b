//! # VSphereClusterIdentity
//!
//! Cluster-scoped identity pointing at a credentials secret in the controller namespace.

use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "VSphereClusterIdentity",
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct VSphereClusterIdentitySpec {
    /// Name of the secret holding `username` and `password`
    pub secret_name: String,
}
