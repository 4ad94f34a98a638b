//! # Response Types
//!
//! vCenter REST API response structures.

use crate::provider::{CnsVolume, TaskState};
use serde::Deserialize;

/// Body of `GET /api/vcenter/cns/volumes`
#[derive(Debug, Deserialize)]
pub struct VolumeListResponse {
    #[serde(default)]
    pub volumes: Vec<VolumeInfo>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeInfo {
    pub volume_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<VolumeInfo> for CnsVolume {
    fn from(info: VolumeInfo) -> Self {
        Self {
            name: info.name.unwrap_or_default(),
            volume_id: info.volume_id,
        }
    }
}

/// Body of `GET /api/cis/tasks/{task}`
#[derive(Debug, Deserialize)]
pub struct TaskInfo {
    /// `PENDING`, `RUNNING`, `BLOCKED`, `SUCCEEDED` or `FAILED`
    pub status: String,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl TaskInfo {
    #[must_use]
    pub fn state(&self) -> TaskState {
        match self.status.as_str() {
            "SUCCEEDED" => TaskState::Succeeded,
            "FAILED" => TaskState::Failed(
                self.error
                    .as_ref()
                    .map_or_else(|| "no error details".to_string(), error_message),
            ),
            _ => TaskState::Running,
        }
    }
}

/// Pull a readable message out of a vCenter error structure
///
/// Errors look like `{"messages": [{"default_message": "..."}], ...}`; anything
/// else is rendered as JSON.
fn error_message(error: &serde_json::Value) -> String {
    error
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|m| m.first())
        .and_then(|m| m.get("default_message"))
        .and_then(|m| m.as_str())
        .map_or_else(|| error.to_string(), str::to_string)
}
