//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{LogFormat, SharedControllerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::VSphereCluster;
use crate::observability;
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for `VSphereCluster` across all namespaces
    pub clusters: Api<VSphereCluster>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Root cancellation token; cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize(config: SharedControllerConfig) -> Result<InitializationResult> {
    // rustls 0.23 needs a process-wide provider before the first TLS handshake.
    // An error means one is already installed, which is just as good.
    let _ = rustls::crypto::ring::default_provider().install_default();

    init_tracing(&config);

    info!("Starting vSphere cleaner controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let shutdown = CancellationToken::new();

    let server_state_clone = Arc::clone(&server_state);
    let server_shutdown = shutdown.clone();
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone, server_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Readiness probes should pass as soon as the watch starts
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let clusters: Api<VSphereCluster> = Api::all(client.clone());
    check_crd_available(&clusters).await;

    let reconciler = Arc::new(Reconciler::new(client.clone(), Arc::clone(&config)));
    info!(
        cleaners = ?reconciler.cleaners.iter().map(|c| c.name()).collect::<Vec<_>>(),
        max_concurrent_reconciliations = config.max_concurrent_reconciliations,
        "Controller initialized, starting watch loop..."
    );

    Ok(InitializationResult {
        client,
        clusters,
        reconciler,
        server_state,
        shutdown,
    })
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to this crate.
fn init_tracing(config: &SharedControllerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cluster_api_cleaner_vsphere={}",
            config.log_level.to_lowercase()
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if let Err(e) = result {
        warn!("Tracing subscriber already initialized: {}", e);
    }
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &SharedControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log whether the `VSphereCluster` CRD can be listed
///
/// Not fatal: the watcher keeps retrying until the CRD shows up.
async fn check_crd_available(clusters: &Api<VSphereCluster>) {
    match clusters.list(&ListParams::default().limit(1)).await {
        Ok(_) => info!("VSphereCluster CRD is queryable"),
        Err(e) => warn!(
            "VSphereCluster CRD is not queryable yet ({}); is Cluster API Provider vSphere installed?",
            e
        ),
    }
}
