//! # Credential Resolution
//!
//! Turns a `VSphereCluster` identity reference into vCenter credentials.
//!
//! - `Secret`: secret with the same name in the cluster's namespace
//! - `VSphereClusterIdentity`: cluster-scoped identity naming a secret in the controller namespace
//! - no reference: controller default credentials (`VSPHERE_USERNAME` / `VSPHERE_PASSWORD`)

use crate::constants::{SECRET_PASSWORD_KEY, SECRET_USERNAME_KEY};
use crate::crd::{IdentityKind, VSphereCluster, VSphereClusterIdentity};
use crate::session::Credentials;
use crate::store::{ObjectKey, ObjectStore};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Credential lookup for a managed cluster
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn credentials_for(&self, cluster: &VSphereCluster) -> Result<Credentials>;
}

pub struct KubeCredentialResolver {
    secrets: Arc<dyn ObjectStore<Secret>>,
    identities: Arc<dyn ObjectStore<VSphereClusterIdentity>>,
    controller_namespace: String,
    default_credentials: Option<Credentials>,
}

impl std::fmt::Debug for KubeCredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCredentialResolver")
            .field("controller_namespace", &self.controller_namespace)
            .field("has_default_credentials", &self.default_credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl KubeCredentialResolver {
    #[must_use]
    pub fn new(
        secrets: Arc<dyn ObjectStore<Secret>>,
        identities: Arc<dyn ObjectStore<VSphereClusterIdentity>>,
        controller_namespace: impl Into<String>,
        default_credentials: Option<Credentials>,
    ) -> Self {
        Self {
            secrets,
            identities,
            controller_namespace: controller_namespace.into(),
            default_credentials,
        }
    }

    async fn from_secret(&self, key: &ObjectKey) -> Result<Credentials> {
        let secret = self
            .secrets
            .get(key)
            .await
            .with_context(|| format!("Failed to read identity secret {key}"))?
            .ok_or_else(|| anyhow!("Identity secret {key} not found"))?;
        credentials_from_secret(&secret).with_context(|| format!("Identity secret {key} is invalid"))
    }
}

/// Controller default credentials from the process environment
#[must_use]
pub fn default_credentials_from_env() -> Option<Credentials> {
    let username = std::env::var("VSPHERE_USERNAME").ok()?;
    let password = Zeroizing::new(std::env::var("VSPHERE_PASSWORD").ok()?);
    if username.is_empty() {
        return None;
    }
    Some(Credentials::new(username, password.as_str()))
}

/// Read `username` and `password` from a secret's data
pub fn credentials_from_secret(secret: &Secret) -> Result<Credentials> {
    let read = |key: &str| -> Result<Zeroizing<String>> {
        let value = secret
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .ok_or_else(|| anyhow!("missing key '{key}'"))?;
        let text = String::from_utf8(value.0.clone())
            .with_context(|| format!("key '{key}' is not valid UTF-8"))?;
        Ok(Zeroizing::new(text))
    };

    let username = read(SECRET_USERNAME_KEY)?;
    let password = read(SECRET_PASSWORD_KEY)?;
    if username.is_empty() {
        bail!("key '{SECRET_USERNAME_KEY}' is empty");
    }
    Ok(Credentials::new(username.as_str(), password.as_str()))
}

#[async_trait]
impl CredentialResolver for KubeCredentialResolver {
    async fn credentials_for(&self, cluster: &VSphereCluster) -> Result<Credentials> {
        let Some(identity_ref) = cluster.spec.identity_ref.as_ref() else {
            return self
                .default_credentials
                .clone()
                .ok_or_else(|| anyhow!("{} has no identityRef and no default credentials are configured", cluster.name_any()));
        };

        match identity_ref.identity_kind() {
            Some(IdentityKind::Secret) => {
                let key = ObjectKey::new(cluster.namespace().unwrap_or_default(), &identity_ref.name);
                self.from_secret(&key).await
            }
            Some(IdentityKind::ClusterIdentity) => {
                let identity_key = ObjectKey::cluster_scoped(&identity_ref.name);
                let identity = self
                    .identities
                    .get(&identity_key)
                    .await
                    .with_context(|| format!("Failed to read VSphereClusterIdentity {identity_key}"))?
                    .ok_or_else(|| anyhow!("VSphereClusterIdentity {identity_key} not found"))?;
                let key = ObjectKey::new(&self.controller_namespace, &identity.spec.secret_name);
                self.from_secret(&key).await
            }
            None => bail!("Unsupported identityRef kind '{}'", identity_ref.kind),
        }
    }
}
