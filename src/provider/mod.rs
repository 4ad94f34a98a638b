//! # Provider Modules
//!
//! Access to the remote resource provider (vCenter).
//!
//! The cleaners only depend on the [`VCenterApi`] trait; `vsphere` contains
//! the REST implementation used in production.

use crate::cancel::CancelScope;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub mod vsphere;

/// A CNS volume as reported by vCenter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnsVolume {
    pub volume_id: String,
    pub name: String,
}

/// Handle of an asynchronous vCenter task
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef(pub String);

impl std::fmt::Display for TaskRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of an asynchronous vCenter task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Queued or still executing
    Running,
    Succeeded,
    /// Finished with an error message
    Failed(String),
}

/// Operations the cleaners need from an authenticated vCenter session
#[async_trait]
pub trait VCenterApi: Send + Sync {
    /// Whether the session is still authenticated
    async fn is_active(&self) -> Result<bool>;

    /// CNS volumes whose container cluster id equals `cluster_id`
    async fn query_volumes(&self, cluster_id: &str) -> Result<Vec<CnsVolume>>;

    /// Start deleting a volume; returns the task tracking the deletion
    async fn delete_volume(&self, volume_id: &str, delete_disk: bool) -> Result<TaskRef>;

    /// Current state of a task
    async fn task_state(&self, task: &TaskRef) -> Result<TaskState>;
}

/// Poll `task` until it finishes
///
/// Every poll and every sleep between polls runs inside `scope`, so a
/// cancelled reconciliation stops waiting immediately and reports
/// [`crate::cancel::Cancelled`].
pub async fn wait_for_task(
    api: &dyn VCenterApi,
    task: &TaskRef,
    scope: &CancelScope,
    poll_interval: Duration,
) -> Result<()> {
    loop {
        match scope.run(api.task_state(task)).await?? {
            TaskState::Succeeded => return Ok(()),
            TaskState::Failed(message) => bail!("vCenter task {task} failed: {message}"),
            TaskState::Running => {
                debug!(task = %task, "vCenter task still running");
                scope.sleep(poll_interval).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancelled;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Replays a fixed sequence of task states
    struct ScriptedTask {
        states: Mutex<Vec<TaskState>>,
    }

    impl ScriptedTask {
        fn new(mut states: Vec<TaskState>) -> Self {
            states.reverse();
            Self {
                states: Mutex::new(states),
            }
        }
    }

    #[async_trait]
    impl VCenterApi for ScriptedTask {
        async fn is_active(&self) -> Result<bool> {
            Ok(true)
        }

        async fn query_volumes(&self, _cluster_id: &str) -> Result<Vec<CnsVolume>> {
            Ok(Vec::new())
        }

        async fn delete_volume(&self, _volume_id: &str, _delete_disk: bool) -> Result<TaskRef> {
            Ok(TaskRef("task-1".to_string()))
        }

        async fn task_state(&self, _task: &TaskRef) -> Result<TaskState> {
            Ok(self
                .states
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(TaskState::Running))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_task_until_success() {
        let api = ScriptedTask::new(vec![TaskState::Running, TaskState::Running, TaskState::Succeeded]);
        let scope = CancelScope::unbounded();
        let task = TaskRef("task-1".to_string());
        wait_for_task(&api, &task, &scope, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(api.states.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_task_failure() {
        let api = ScriptedTask::new(vec![
            TaskState::Running,
            TaskState::Failed("disk busy".to_string()),
        ]);
        let scope = CancelScope::unbounded();
        let err = wait_for_task(&api, &TaskRef("t".to_string()), &scope, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk busy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_task_honours_deadline() {
        let api = ScriptedTask::new(Vec::new());
        let scope = CancelScope::with_timeout(CancellationToken::new(), Duration::from_secs(5));
        let err = wait_for_task(&api, &TaskRef("t".to_string()), &scope, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<Cancelled>(),
            Some(&Cancelled::DeadlineExceeded)
        );
    }
}
