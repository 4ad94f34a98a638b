//! # Kubernetes-backed stores

use super::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Api, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Store for namespaced kinds
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Store for cluster-scoped kinds; the key namespace is ignored
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
}

impl Debug for KubeClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterStore").finish_non_exhaustive()
    }
}

impl KubeClusterStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        get_object(&api, key).await
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        let key = ObjectKey::from_resource(object).ok_or(StoreError::MissingName)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        replace_object(&api, key, object).await
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeClusterStore
where
    K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let api: Api<K> = Api::all(self.client.clone());
        get_object(&api, key).await
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        let key = ObjectKey::from_resource(object).ok_or(StoreError::MissingName)?;
        let api: Api<K> = Api::all(self.client.clone());
        replace_object(&api, key, object).await
    }
}

async fn get_object<K>(api: &Api<K>, key: &ObjectKey) -> Result<Option<K>, StoreError>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    api.get_opt(&key.name)
        .await
        .map_err(|source| StoreError::Api {
            key: key.clone(),
            source,
        })
}

/// `PUT` the whole object; the API server rejects it with 409 if the
/// resourceVersion we read is stale
async fn replace_object<K>(api: &Api<K>, key: ObjectKey, object: &K) -> Result<K, StoreError>
where
    K: Resource + Clone + Debug + DeserializeOwned + Serialize,
{
    match api.replace(&key.name, &PostParams::default(), object).await {
        Ok(updated) => Ok(updated),
        Err(kube::Error::Api(api_err)) if api_err.code == 409 => Err(StoreError::Conflict { key }),
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => Err(StoreError::NotFound { key }),
        Err(source) => Err(StoreError::Api { key, source }),
    }
}
