//! The remote execution platform, as seen by the benchmark.
//!
//! Every method is a single request. Waiting for builds and batches to
//! finish is layered on top by `wait::poll_until`, which owns the timeout and
//! cancellation policy.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{FileTree, RunRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Queued,
    Building,
    Succeeded,
    Failed,
    Cancelled,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildStatus::Succeeded | BuildStatus::Failed | BuildStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Queued => "queued",
            BuildStatus::Building => "building",
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::Failed => "failed",
            BuildStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Crashed,
    TimedOut,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Queued | RunStatus::Running)
    }
}

/// One run of a submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunHandle {
    /// Name of the `RunRequest` that produced this run.
    pub name: String,
    pub run_id: String,
    pub status: RunStatus,
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Create a task and return its id.
    async fn create_task(&self, name: &str) -> Result<String>;

    /// Publish `files` as version `label` of the task and return the version id.
    async fn publish_version(&self, task_id: &str, label: &str, files: &FileTree)
    -> Result<String>;

    /// Trigger a build of a published version and return the build id.
    async fn start_build(&self, task_id: &str, version_id: &str) -> Result<String>;

    async fn build_status(&self, build_id: &str) -> Result<BuildStatus>;

    /// Submit named runs as one batch and return the batch id. Retrying runs
    /// that could not get resources is the platform's job.
    async fn submit_batch(&self, task_id: &str, runs: &[RunRequest]) -> Result<String>;

    async fn batch_status(&self, batch_id: &str) -> Result<Vec<RunHandle>>;

    /// Abort all runs of a batch that have not finished.
    async fn cancel_batch(&self, batch_id: &str) -> Result<()>;

    async fn fetch_log(&self, run_id: &str) -> Result<String>;

    async fn delete_task(&self, task_id: &str) -> Result<()>;
}
