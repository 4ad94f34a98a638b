//! # Session Cache
//!
//! Process-wide cache of vCenter sessions keyed by [`SessionKey`].
//!
//! A cached entry is dropped and re-created when:
//!
//! 1. its keep-alive probe fails or reports the session as expired
//! 2. the requested password differs from the one it was created with
//! 3. it is removed explicitly through [`CachingSessionProvider::invalidate`]

use super::{Session, SessionKey, SessionParams, SessionProvider};
use crate::observability::metrics;
use crate::provider::vsphere::VCenterClient;
use crate::provider::VCenterApi;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Opens new authenticated connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &SessionParams) -> Result<Arc<dyn VCenterApi>>;
}

/// Connects through the vCenter REST API
#[derive(Debug, Clone, Copy, Default)]
pub struct RestConnector;

#[async_trait]
impl Connector for RestConnector {
    async fn connect(&self, params: &SessionParams) -> Result<Arc<dyn VCenterApi>> {
        let client = VCenterClient::login(
            &params.server,
            params.thumbprint.as_deref(),
            &params.credentials,
        )
        .await?;
        Ok(Arc::new(client))
    }
}

struct CachedSession {
    session: Arc<Session>,
    password_fingerprint: [u8; 32],
    thumbprint: Option<String>,
}

pub struct CachingSessionProvider {
    connector: Arc<dyn Connector>,
    sessions: Mutex<HashMap<SessionKey, CachedSession>>,
}

impl std::fmt::Debug for CachingSessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingSessionProvider")
            .field("cached", &self.len())
            .finish_non_exhaustive()
    }
}

impl CachingSessionProvider {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Provider backed by the vCenter REST API
    #[must_use]
    pub fn rest() -> Self {
        Self::new(Arc::new(RestConnector))
    }

    /// Drop the cached session for `key`; returns whether one was cached
    pub fn invalidate(&self, key: &SessionKey) -> bool {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        if removed {
            debug!(session = %key, "Invalidated cached vCenter session");
        }
        removed
    }

    /// Number of cached sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached session for `params`, if one exists with matching password and thumbprint
    ///
    /// Entries created with different credentials are evicted here.
    fn lookup(&self, key: &SessionKey, params: &SessionParams) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let cached = sessions.get(key)?;
        if cached.password_fingerprint == params.credentials.password_fingerprint()
            && cached.thumbprint == params.thumbprint
        {
            return Some(Arc::clone(&cached.session));
        }
        debug!(session = %key, "Credentials changed, dropping cached vCenter session");
        sessions.remove(key);
        None
    }
}

#[async_trait]
impl SessionProvider for CachingSessionProvider {
    async fn get_or_create(&self, params: &SessionParams) -> Result<Arc<Session>> {
        let key = params.key();

        if let Some(session) = self.lookup(&key, params) {
            match session.api().is_active().await {
                Ok(true) => return Ok(session),
                Ok(false) => debug!(session = %key, "Cached vCenter session expired"),
                Err(e) => debug!(session = %key, error = %e, "Keep-alive for cached vCenter session failed"),
            }
            self.invalidate(&key);
        }

        let api = self
            .connector
            .connect(params)
            .await
            .with_context(|| format!("Failed to create vCenter session for {key}"))?;
        let session = Arc::new(Session::new(key.clone(), api));

        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.clone(),
                CachedSession {
                    session: Arc::clone(&session),
                    password_fingerprint: params.credentials.password_fingerprint(),
                    thumbprint: params.thumbprint.clone(),
                },
            );

        metrics::increment_sessions_created();
        info!(session = %key, "Created vCenter session");
        Ok(session)
    }
}
