//! # vSphere Cleaner Controller
//!
//! A Kubernetes controller that keeps Cluster API `VSphereCluster` objects
//! from disappearing before the vSphere resources created for them are gone.
//!
//! ## Overview
//!
//! 1. **Protects live clusters** - Adds a finalizer to every `VSphereCluster` and its identity secret
//! 2. **Cleans up on deletion** - Deletes the cluster's CNS volumes (disks included) through the vCenter REST API
//! 3. **Releases finalizers** - Strips the secret finalizer, then the cluster finalizer, once nothing is left
//!
//! Configuration comes from environment variables (see `ControllerConfig`);
//! the command-line flags below override them.

use anyhow::Result;
use clap::Parser;
use cluster_api_cleaner_vsphere::config::{ControllerConfig, LogFormat};
use cluster_api_cleaner_vsphere::runtime::{initialization, watch_loop};
use std::sync::Arc;

/// Cluster API vSphere cleaner controller
#[derive(Debug, Parser)]
#[command(name = "cluster-api-cleaner-vsphere", version, long_about = None)]
struct Cli {
    /// Port for /metrics, /healthz and /readyz
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    log_format: Option<String>,

    /// Seconds between deletion passes while cleanup is still running
    #[arg(long)]
    cleanup_requeue_secs: Option<u64>,

    /// Label key naming the owning cluster
    #[arg(long)]
    cluster_name_label: Option<String>,

    /// Maximum number of clusters reconciled at the same time
    #[arg(long)]
    max_concurrent_reconciliations: Option<u16>,

    /// Upper bound for a single reconciliation in seconds
    #[arg(long)]
    reconcile_timeout_secs: Option<u64>,
}

impl Cli {
    /// Apply flags on top of the environment-derived configuration
    fn apply(self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = LogFormat::parse(&format);
        }
        if let Some(secs) = self.cleanup_requeue_secs {
            config.cleanup_requeue_secs = secs;
        }
        if let Some(label) = self.cluster_name_label.filter(|l| !l.is_empty()) {
            config.cluster_name_label = label;
        }
        if let Some(limit) = self.max_concurrent_reconciliations {
            config.max_concurrent_reconciliations = limit;
        }
        if let Some(secs) = self.reconcile_timeout_secs {
            config.reconcile_timeout_secs = secs;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(cli.apply(ControllerConfig::from_env()));

    let init = initialization::initialize(config).await?;
    watch_loop::run_watch_loop(
        init.clusters,
        init.reconciler,
        init.server_state,
        init.shutdown,
    )
    .await
}
