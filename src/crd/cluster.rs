//! # Cluster
//!
//! Cluster API `Cluster`, the owner of every `VSphereCluster`.

use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Cluster",
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Paused can be used to prevent controllers from processing the Cluster and all its associated objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}
