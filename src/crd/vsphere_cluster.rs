//! # VSphereCluster
//!
//! The managed resource. Its deletion is held back by the cleaner finalizer
//! until every vSphere resource created for the cluster is gone.

use serde::{Deserialize, Serialize};

/// VSphereCluster Custom Resource (Cluster API Provider vSphere)
///
/// # Example
///
/// ```yaml
/// apiVersion: infrastructure.cluster.x-k8s.io/v1beta1
/// kind: VSphereCluster
/// metadata:
///   name: demo
///   namespace: org-acme
///   labels:
///     cluster.x-k8s.io/cluster-name: demo
/// spec:
///   server: vcenter.example.com
///   thumbprint: "AB:CD:..."
///   identityRef:
///     kind: Secret
///     name: demo-vsphere-credentials
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "VSphereCluster",
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VSphereClusterSpec {
    /// vCenter server address (host name, IP or URL)
    pub server: String,
    /// Certificate thumbprint of the vCenter server, colon separated hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
    /// Reference to the credentials used to talk to vCenter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<IdentityRef>,
}

/// Reference to a vCenter identity
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    /// `Secret` or `VSphereClusterIdentity`
    pub kind: String,
    pub name: String,
}

/// Kind of identity an [`IdentityRef`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// Namespaced secret next to the `VSphereCluster`
    Secret,
    /// Cluster-scoped `VSphereClusterIdentity`
    ClusterIdentity,
}

impl IdentityRef {
    /// Identity kind, or `None` for kinds this controller does not understand
    #[must_use]
    pub fn identity_kind(&self) -> Option<IdentityKind> {
        match self.kind.as_str() {
            "Secret" => Some(IdentityKind::Secret),
            "VSphereClusterIdentity" => Some(IdentityKind::ClusterIdentity),
            _ => None,
        }
    }
}

impl VSphereCluster {
    /// Name of the identity secret when credentials are secret-backed
    ///
    /// Such a secret is protected by the same finalizer as the cluster itself,
    /// so it cannot disappear before deletion cleanup had a chance to use it.
    #[must_use]
    pub fn identity_secret_name(&self) -> Option<&str> {
        self.spec
            .identity_ref
            .as_ref()
            .filter(|r| r.identity_kind() == Some(IdentityKind::Secret))
            .map(|r| r.name.as_str())
    }

    /// Whether deletion has been requested
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
