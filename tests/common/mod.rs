//! Common test utilities
//!
//! In-memory doubles for the reconciler seams plus fixtures for the objects
//! the controller works on. Every double writes into a shared [`Journal`] so
//! tests can assert the order in which things happened.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use cluster_api_cleaner_vsphere::cancel::CancelScope;
use cluster_api_cleaner_vsphere::cleaner::Cleaner;
use cluster_api_cleaner_vsphere::config::ControllerConfig;
use cluster_api_cleaner_vsphere::constants::CLEANER_FINALIZER;
use cluster_api_cleaner_vsphere::controller::reconciler::{
    AnnotationPausePredicate, KubeCredentialResolver, KubeOwnerResolver, Reconciler,
};
use cluster_api_cleaner_vsphere::crd::{
    Cluster, ClusterSpec, IdentityRef, VSphereCluster, VSphereClusterIdentity, VSphereClusterSpec,
};
use cluster_api_cleaner_vsphere::provider::{CnsVolume, TaskRef, TaskState, VCenterApi};
use cluster_api_cleaner_vsphere::session::{Session, SessionParams, SessionProvider};
use cluster_api_cleaner_vsphere::store::{ObjectKey, ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
use k8s_openapi::ByteString;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::sync::Once;

pub const NAMESPACE: &str = "org-acme";
pub const CLUSTER_NAME: &str = "demo";
pub const SECRET_NAME: &str = "demo-credentials";

static RUSTLS_INIT: Once = Once::new();

/// Install the rustls crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Ordered record of observable side effects
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// In-memory object store with the API server's optimistic concurrency
///
/// Updates must carry the stored `resourceVersion`. An object that is being
/// deleted disappears once its last finalizer is removed.
pub struct MemoryStore<K> {
    objects: Mutex<HashMap<ObjectKey, K>>,
    journal: Journal,
    updates: AtomicUsize,
    pending_conflicts: AtomicUsize,
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    pub fn new(journal: Journal) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            journal,
            updates: AtomicUsize::new(0),
            pending_conflicts: AtomicUsize::new(0),
        }
    }

    /// Store `object` as-is, assigning an initial resource version
    pub fn insert(&self, mut object: K) {
        if object.meta().resource_version.is_none() {
            object.meta_mut().resource_version = Some("1".to_string());
        }
        let key = ObjectKey::from_resource(&object).unwrap();
        self.objects.lock().unwrap().insert(key, object);
    }

    pub fn get_now(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Change the stored object behind the reconciler's back
    pub fn modify(&self, key: &ObjectKey, change: impl FnOnce(&mut K)) {
        let mut objects = self.objects.lock().unwrap();
        let object = objects.get_mut(key).unwrap();
        change(object);
        bump_resource_version(object);
    }

    pub fn remove(&self, key: &ObjectKey) {
        self.objects.lock().unwrap().remove(key);
    }

    /// Number of successful updates
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Reject the next `n` updates with a conflict
    pub fn fail_next_updates_with_conflict(&self, n: usize) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }
}

fn bump_resource_version<K: Resource>(object: &mut K) {
    let next = object
        .meta()
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    object.meta_mut().resource_version = Some(next.to_string());
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        let key = ObjectKey::from_resource(object).ok_or(StoreError::MissingName)?;

        if self
            .pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Conflict { key });
        }

        let mut objects = self.objects.lock().unwrap();
        let stored = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        if stored.meta().resource_version != object.meta().resource_version {
            return Err(StoreError::Conflict { key });
        }

        let mut updated = object.clone();
        bump_resource_version(&mut updated);
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!(
            "update {} {} finalizers={:?}",
            K::kind(&()),
            key,
            updated.finalizers()
        ));

        let released = updated.meta().deletion_timestamp.is_some() && updated.finalizers().is_empty();
        if released {
            objects.remove(&key);
            self.journal.record(format!("gone {} {}", K::kind(&()), key));
        } else {
            objects.insert(key, updated.clone());
        }
        Ok(updated)
    }
}

/// Session provider handing out sessions backed by [`NoopVCenter`]
#[derive(Default)]
pub struct CountingSessions {
    pub calls: AtomicUsize,
    pub fail: bool,
    journal: Journal,
}

impl CountingSessions {
    pub fn new(journal: Journal) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            journal,
        }
    }

    pub fn failing(journal: Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(journal)
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for CountingSessions {
    async fn get_or_create(&self, params: &SessionParams) -> anyhow::Result<Arc<Session>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!("session {}", params.key()));
        if self.fail {
            anyhow::bail!("vCenter {} unreachable", params.server);
        }
        let api: Arc<dyn VCenterApi> = Arc::new(NoopVCenter);
        Ok(Arc::new(Session::new(params.key(), api)))
    }
}

/// vCenter with nothing in it
#[derive(Debug, Default)]
pub struct NoopVCenter;

#[async_trait]
impl VCenterApi for NoopVCenter {
    async fn is_active(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn query_volumes(&self, _cluster_id: &str) -> anyhow::Result<Vec<CnsVolume>> {
        Ok(Vec::new())
    }

    async fn delete_volume(&self, volume_id: &str, _delete_disk: bool) -> anyhow::Result<TaskRef> {
        Ok(TaskRef(format!("task-{volume_id}")))
    }

    async fn task_state(&self, _task: &TaskRef) -> anyhow::Result<TaskState> {
        Ok(TaskState::Succeeded)
    }
}

/// What a [`ScriptedCleaner`] does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Done,
    Requeue,
    Fail(&'static str),
    /// Never finishes; only cancellation ends the call
    Hang,
}

/// Cleaner that plays back a script, then reports `Done`
pub struct ScriptedCleaner {
    name: &'static str,
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    journal: Journal,
}

impl ScriptedCleaner {
    pub fn new(name: &'static str, script: Vec<Step>, journal: Journal) -> Self {
        Self {
            name,
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            journal,
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cleaner for ScriptedCleaner {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn clean(
        &self,
        _scope: &CancelScope,
        _session: &Session,
        cluster: &VSphereCluster,
    ) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.journal
            .record(format!("clean {} {}", self.name, cluster.name_any()));
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Done);
        match step {
            Step::Done => Ok(false),
            Step::Requeue => Ok(true),
            Step::Fail(message) => Err(anyhow::anyhow!(message)),
            Step::Hang => {
                std::future::pending::<()>().await;
                Ok(false)
            }
        }
    }
}

/// A reconciler wired to in-memory doubles, plus handles to inspect them
pub struct Harness {
    pub journal: Journal,
    pub clusters: Arc<MemoryStore<VSphereCluster>>,
    pub secrets: Arc<MemoryStore<Secret>>,
    pub owners: Arc<MemoryStore<Cluster>>,
    pub identities: Arc<MemoryStore<VSphereClusterIdentity>>,
    pub sessions: Arc<CountingSessions>,
    pub cleaners: Vec<Arc<ScriptedCleaner>>,
    pub reconciler: Reconciler,
}

impl Harness {
    /// Harness with one scripted cleaner per `(name, script)` entry, run in that order
    pub fn new(cleaners: Vec<(&'static str, Vec<Step>)>) -> Self {
        Self::build(cleaners, false)
    }

    /// Harness whose session provider always fails
    pub fn with_failing_sessions(cleaners: Vec<(&'static str, Vec<Step>)>) -> Self {
        Self::build(cleaners, true)
    }

    fn build(cleaners: Vec<(&'static str, Vec<Step>)>, failing_sessions: bool) -> Self {
        let journal = Journal::default();
        let clusters = Arc::new(MemoryStore::<VSphereCluster>::new(journal.clone()));
        let secrets = Arc::new(MemoryStore::<Secret>::new(journal.clone()));
        let owners = Arc::new(MemoryStore::<Cluster>::new(journal.clone()));
        let identities = Arc::new(MemoryStore::<VSphereClusterIdentity>::new(journal.clone()));
        let sessions = Arc::new(if failing_sessions {
            CountingSessions::failing(journal.clone())
        } else {
            CountingSessions::new(journal.clone())
        });
        let cleaners: Vec<Arc<ScriptedCleaner>> = cleaners
            .into_iter()
            .map(|(name, script)| Arc::new(ScriptedCleaner::new(name, script, journal.clone())))
            .collect();

        let config = Arc::new(ControllerConfig::default());
        let credentials = KubeCredentialResolver::new(
            Arc::<MemoryStore<Secret>>::clone(&secrets),
            Arc::<MemoryStore<VSphereClusterIdentity>>::clone(&identities),
            config.controller_namespace.clone(),
            None,
        );

        let reconciler = Reconciler {
            clusters: Arc::<MemoryStore<VSphereCluster>>::clone(&clusters),
            secrets: Arc::<MemoryStore<Secret>>::clone(&secrets),
            owners: Arc::new(KubeOwnerResolver::new(
                Arc::<MemoryStore<Cluster>>::clone(&owners),
            )),
            pause: Arc::new(AnnotationPausePredicate),
            credentials: Arc::new(credentials),
            sessions: Arc::<CountingSessions>::clone(&sessions),
            cleaners: cleaners
                .iter()
                .map(|c| Arc::<ScriptedCleaner>::clone(c) as Arc<dyn Cleaner>)
                .collect(),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            config,
        };

        Self {
            journal,
            clusters,
            secrets,
            owners,
            identities,
            sessions,
            cleaners,
            reconciler,
        }
    }

    /// Store the owner `Cluster`, the identity secret and `cluster`
    pub fn seed(&self, cluster: VSphereCluster) {
        self.owners.insert(owner_cluster());
        self.secrets.insert(identity_secret());
        self.clusters.insert(cluster);
    }

    pub fn cluster(&self) -> Option<VSphereCluster> {
        self.clusters.get_now(&cluster_key())
    }

    pub fn secret(&self) -> Option<Secret> {
        self.secrets.get_now(&secret_key())
    }

    pub fn total_clean_calls(&self) -> usize {
        self.cleaners.iter().map(|c| c.count()).sum()
    }
}

pub fn cluster_key() -> ObjectKey {
    ObjectKey::new(NAMESPACE, CLUSTER_NAME)
}

pub fn secret_key() -> ObjectKey {
    ObjectKey::new(NAMESPACE, SECRET_NAME)
}

/// Live `VSphereCluster` owned by the `demo` Cluster, with a secret identity
pub fn vsphere_cluster() -> VSphereCluster {
    let mut cluster = VSphereCluster::new(
        CLUSTER_NAME,
        VSphereClusterSpec {
            server: "vcenter.example.com".to_string(),
            thumbprint: None,
            identity_ref: Some(IdentityRef {
                kind: "Secret".to_string(),
                name: SECRET_NAME.to_string(),
            }),
        },
    );
    cluster.metadata.namespace = Some(NAMESPACE.to_string());
    cluster.metadata.labels = Some(BTreeMap::from([(
        "cluster.x-k8s.io/cluster-name".to_string(),
        CLUSTER_NAME.to_string(),
    )]));
    cluster.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "cluster.x-k8s.io/v1beta1".to_string(),
        kind: "Cluster".to_string(),
        name: CLUSTER_NAME.to_string(),
        uid: "5b1c2f1e-0000-4000-8000-000000000001".to_string(),
        controller: Some(true),
        ..OwnerReference::default()
    }]);
    cluster
}

/// `cluster` with the cleaner finalizer and a deletion timestamp
pub fn deleting(mut cluster: VSphereCluster) -> VSphereCluster {
    cluster.metadata.finalizers = Some(vec![CLEANER_FINALIZER.to_string()]);
    cluster.metadata.deletion_timestamp = Some(deletion_time());
    cluster
}

pub fn deletion_time() -> Time {
    serde_json::from_value(serde_json::json!("2024-05-01T12:00:00Z")).unwrap()
}

pub fn owner_cluster() -> Cluster {
    let mut owner = Cluster::new(CLUSTER_NAME, ClusterSpec::default());
    owner.metadata.namespace = Some(NAMESPACE.to_string());
    owner
}

/// Identity secret carrying the cleaner finalizer
pub fn identity_secret() -> Secret {
    let mut secret = Secret::default();
    secret.metadata.name = Some(SECRET_NAME.to_string());
    secret.metadata.namespace = Some(NAMESPACE.to_string());
    secret.metadata.finalizers = Some(vec![CLEANER_FINALIZER.to_string()]);
    secret.data = Some(BTreeMap::from([
        ("username".to_string(), ByteString(b"cleaner@vsphere.local".to_vec())),
        ("password".to_string(), ByteString(b"hunter2".to_vec())),
    ]));
    secret
}

/// Scope that ends after `timeout`
pub fn short_scope(timeout: Duration) -> CancelScope {
    CancelScope::with_timeout(tokio_util::sync::CancellationToken::new(), timeout)
}
