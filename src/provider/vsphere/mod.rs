//! # vCenter REST Client
//!
//! Authenticated client for the vCenter REST API.
//!
//! ## Endpoints
//!
//! - `POST /api/session` - log in with basic auth, returns a session token
//! - `GET /api/session` - session keep-alive probe
//! - `GET /api/vcenter/cns/volumes?cluster_id=` - CNS volumes of a cluster
//! - `DELETE /api/vcenter/cns/volumes/{id}?delete_disk=true` - start a delete task
//! - `GET /api/cis/tasks/{task}` - task status
//!
//! The session token travels in the `vmware-api-session-id` header.

pub mod responses;
pub mod tls;

use crate::provider::{CnsVolume, TaskRef, TaskState, VCenterApi};
use crate::session::Credentials;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use responses::{TaskInfo, VolumeListResponse};
use std::time::Duration;
use tls::{pinned_client_config, Thumbprint};
use tracing::{debug, debug_span, info, Instrument};
use zeroize::Zeroizing;

const SESSION_HEADER: &str = "vmware-api-session-id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// vCenter REST client bound to one session token
pub struct VCenterClient {
    http_client: Client,
    base_url: String,
    session_token: Zeroizing<String>,
}

impl std::fmt::Debug for VCenterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VCenterClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Base URL for a `VSphereCluster.spec.server` value
///
/// Bare host names get `https://`; explicit `http://` / `https://` URLs are kept.
#[must_use]
pub fn base_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("https://") || server.starts_with("http://") {
        server.to_string()
    } else {
        format!("https://{server}")
    }
}

/// Join `segments` onto `base_url`, percent-encoding each one
fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url).with_context(|| format!("Invalid vCenter URL {base_url}"))?;
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("vCenter URL {base_url} cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// HTTP client for `base_url`, pinned to `thumbprint` when one is given
pub fn http_client(base_url: &str, thumbprint: Option<&str>) -> Result<Client> {
    let builder = Client::builder().timeout(REQUEST_TIMEOUT);
    let thumbprint = thumbprint.map(str::trim).filter(|t| !t.is_empty());

    let builder = match thumbprint {
        Some(thumbprint) if base_url.starts_with("https://") => {
            let thumbprint = Thumbprint::parse(thumbprint).context("Invalid vCenter thumbprint")?;
            builder.use_preconfigured_tls(pinned_client_config(thumbprint)?)
        }
        _ => builder.use_rustls_tls(),
    };

    builder.build().context("Failed to build vCenter HTTP client")
}

impl VCenterClient {
    /// Log in and return a client holding the new session token
    pub async fn login(
        server: &str,
        thumbprint: Option<&str>,
        credentials: &Credentials,
    ) -> Result<Self> {
        let base_url = base_url(server);
        let http_client = http_client(&base_url, thumbprint)?;

        let response = http_client
            .post(format!("{base_url}/api/session"))
            .basic_auth(credentials.username(), Some(credentials.password()))
            .send()
            .await
            .with_context(|| format!("Failed to reach vCenter at {base_url}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(handle_error_response(status, &error_text))
                .with_context(|| format!("vCenter login to {base_url} failed"));
        }

        let token: String = response
            .json()
            .await
            .context("Failed to parse vCenter session token")?;

        info!(server = %base_url, username = %credentials.username(), "Logged in to vCenter");
        Ok(Self {
            http_client,
            base_url,
            session_token: Zeroizing::new(token),
        })
    }

    fn make_request(&self, method: Method, segments: &[&str]) -> Result<reqwest::RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        Ok(self
            .http_client
            .request(method, url)
            .header(SESSION_HEADER, self.session_token.as_str()))
    }

    /// Send a request and fail on non-2xx statuses
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {what}"))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        Err(handle_error_response(status, &error_text)).with_context(|| format!("Failed to {what}"))
    }

    /// Base URL (for testing)
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn handle_error_response(status: StatusCode, error_text: &str) -> anyhow::Error {
    match status.as_u16() {
        404 => anyhow::anyhow!("Not found: {error_text}"),
        403 => anyhow::anyhow!("Permission denied: {error_text}"),
        401 => anyhow::anyhow!("Unauthorized: {error_text}"),
        400 => anyhow::anyhow!("Bad request: {error_text}"),
        _ => anyhow::anyhow!("API error ({status}): {error_text}"),
    }
}

#[async_trait]
impl VCenterApi for VCenterClient {
    async fn is_active(&self) -> Result<bool> {
        let response = self
            .make_request(Method::GET, &["api", "session"])?
            .send()
            .await
            .context("Failed to probe vCenter session")?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(handle_error_response(status, &error_text))
            }
        }
    }

    async fn query_volumes(&self, cluster_id: &str) -> Result<Vec<CnsVolume>> {
        let span = debug_span!("vcenter.cns.query_volumes", cluster.id = cluster_id);
        async move {
            let request = self
                .make_request(Method::GET, &["api", "vcenter", "cns", "volumes"])?
                .query(&[("cluster_id", cluster_id)]);
            let response = self.send(request, "query CNS volumes").await?;
            let list: VolumeListResponse = response
                .json()
                .await
                .context("Failed to parse CNS volume list")?;
            debug!(count = list.volumes.len(), "Queried CNS volumes");
            Ok(list.volumes.into_iter().map(CnsVolume::from).collect())
        }
        .instrument(span)
        .await
    }

    async fn delete_volume(&self, volume_id: &str, delete_disk: bool) -> Result<TaskRef> {
        let request = self
            .make_request(Method::DELETE, &["api", "vcenter", "cns", "volumes", volume_id])?
            .query(&[("delete_disk", delete_disk)]);
        let response = self
            .send(request, &format!("delete CNS volume {volume_id}"))
            .await?;
        let task: String = response
            .json()
            .await
            .context("Failed to parse delete task id")?;
        Ok(TaskRef(task))
    }

    async fn task_state(&self, task: &TaskRef) -> Result<TaskState> {
        let request = self.make_request(Method::GET, &["api", "cis", "tasks", task.0.as_str()])?;
        let response = self.send(request, &format!("get task {task}")).await?;
        let info: TaskInfo = response
            .json()
            .await
            .context("Failed to parse task info")?;
        Ok(info.state())
    }
}
