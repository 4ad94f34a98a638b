//! # CNS Volume Cleaner
//!
//! Deletes the CNS volumes (and their backing disks) provisioned for a
//! workload cluster. Volumes are found by their container cluster id, which
//! the vSphere CSI driver sets to the cluster name.

use super::Cleaner;
use crate::cancel::CancelScope;
use crate::crd::VSphereCluster;
use crate::observability::metrics;
use crate::provider::wait_for_task;
use crate::session::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Clone)]
pub struct VolumeCleaner {
    task_poll_interval: Duration,
}

impl VolumeCleaner {
    #[must_use]
    pub fn new(task_poll_interval: Duration) -> Self {
        Self { task_poll_interval }
    }
}

#[async_trait]
impl Cleaner for VolumeCleaner {
    fn name(&self) -> &'static str {
        "volumes"
    }

    async fn clean(
        &self,
        scope: &CancelScope,
        session: &Session,
        cluster: &VSphereCluster,
    ) -> Result<bool> {
        let cluster_id = cluster.name_any();
        let span = info_span!("cleaner.volumes", cluster.id = %cluster_id);

        async move {
            let api = session.api();
            let volumes = scope
                .run(api.query_volumes(&cluster_id))
                .await?
                .context("Failed to list CNS volumes")?;

            if volumes.is_empty() {
                debug!("No CNS volumes left for cluster");
                return Ok(false);
            }

            info!(count = volumes.len(), "Deleting CNS volumes");
            for volume in &volumes {
                let task = scope
                    .run(api.delete_volume(&volume.volume_id, true))
                    .await?
                    .with_context(|| format!("Failed to delete CNS volume {}", volume.volume_id))?;

                wait_for_task(api, &task, scope, self.task_poll_interval)
                    .await
                    .with_context(|| {
                        format!("Deletion of CNS volume {} did not finish", volume.volume_id)
                    })?;

                metrics::increment_volumes_deleted(1);
                info!(
                    volume.id = %volume.volume_id,
                    volume.name = %volume.name,
                    "Deleted CNS volume"
                );
            }

            Ok(false)
        }
        .instrument(span)
        .await
    }
}
