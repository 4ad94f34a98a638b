//! # Sessions
//!
//! Authenticated access to vCenter, resolved per reconciliation.
//!
//! A [`Session`] is keyed by server address and username. Sessions are owned
//! by a [`SessionProvider`]; the orchestrator only asks for one and uses it
//! for the duration of a deletion pass.

mod cache;

pub use cache::{CachingSessionProvider, Connector, RestConnector};

use crate::provider::VCenterApi;
use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// vCenter username and password
///
/// Wiped from memory on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// SHA-256 of the password, used to notice rotated credentials without keeping them around
    #[must_use]
    pub fn password_fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.password.as_bytes()).into()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to open a session
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub server: String,
    pub thumbprint: Option<String>,
    pub credentials: Credentials,
}

impl SessionParams {
    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey {
            server: self.server.clone(),
            username: self.credentials.username().to_string(),
        }
    }
}

/// Cache identity of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub server: String,
    pub username: String,
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.username, self.server)
    }
}

/// Authenticated handle to a vCenter
pub struct Session {
    key: SessionKey,
    api: Arc<dyn VCenterApi>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(key: SessionKey, api: Arc<dyn VCenterApi>) -> Self {
        Self { key, api }
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    #[must_use]
    pub fn api(&self) -> &dyn VCenterApi {
        self.api.as_ref()
    }
}

/// Source of authenticated sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Return a usable session for `params`, creating one if needed
    async fn get_or_create(&self, params: &SessionParams) -> Result<Arc<Session>>;
}
