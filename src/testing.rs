//! Recording fakes for the remote collaborators.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::catalog::{CatalogManifest, TemplateCatalog, TemplateEntry};
use crate::platform::{BuildStatus, Platform, RunHandle, RunStatus};
use crate::types::{FileTree, RunRequest};

#[derive(Default)]
struct Inner {
    calls: Vec<String>,
    batches: Vec<Vec<RunRequest>>,
    published: Vec<FileTree>,
    logs: HashMap<String, String>,
    build_polls_before_done: usize,
    build_outcome: Option<BuildStatus>,
    batch_never_finishes: bool,
    fail_on: Option<&'static str>,
}

/// A platform that answers from canned data and records every call by name.
#[derive(Default)]
pub struct FakePlatform {
    inner: Mutex<Inner>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log text returned for the run produced by request `name`.
    pub fn with_log(self, name: &str, log: &str) -> Self {
        self.lock().logs.insert(name.to_string(), log.to_string());
        self
    }

    pub fn with_build_outcome(self, status: BuildStatus, polls_before_done: usize) -> Self {
        {
            let mut inner = self.lock();
            inner.build_outcome = Some(status);
            inner.build_polls_before_done = polls_before_done;
        }
        self
    }

    pub fn with_stuck_batches(self) -> Self {
        self.lock().batch_never_finishes = true;
        self
    }

    /// Make the named operation fail.
    pub fn failing_on(self, operation: &'static str) -> Self {
        self.lock().fail_on = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    pub fn batches(&self) -> Vec<Vec<RunRequest>> {
        self.lock().batches.clone()
    }

    pub fn published(&self) -> Vec<FileTree> {
        self.lock().published.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(operation.to_string());
        if inner.fail_on == Some(operation) {
            return Err(anyhow!("{operation} failed"));
        }
        Ok(())
    }
}

fn run_id_for(name: &str) -> String {
    format!("run_{name}")
}

#[async_trait]
impl Platform for FakePlatform {
    async fn create_task(&self, _name: &str) -> Result<String> {
        self.record("create_task")?;
        Ok("task_1".to_string())
    }

    async fn publish_version(&self, _task_id: &str, _label: &str, files: &FileTree) -> Result<String> {
        self.record("publish_version")?;
        self.lock().published.push(files.clone());
        Ok("ver_1".to_string())
    }

    async fn start_build(&self, _task_id: &str, _version_id: &str) -> Result<String> {
        self.record("start_build")?;
        Ok("build_1".to_string())
    }

    async fn build_status(&self, _build_id: &str) -> Result<BuildStatus> {
        self.record("build_status")?;
        let mut inner = self.lock();
        if inner.build_polls_before_done > 0 {
            inner.build_polls_before_done -= 1;
            return Ok(BuildStatus::Building);
        }
        Ok(inner.build_outcome.unwrap_or(BuildStatus::Succeeded))
    }

    async fn submit_batch(&self, _task_id: &str, runs: &[RunRequest]) -> Result<String> {
        self.record("submit_batch")?;
        let mut inner = self.lock();
        inner.batches.push(runs.to_vec());
        Ok(format!("batch_{}", inner.batches.len()))
    }

    async fn batch_status(&self, batch_id: &str) -> Result<Vec<RunHandle>> {
        self.record("batch_status")?;
        let inner = self.lock();
        let index: usize = batch_id
            .trim_start_matches("batch_")
            .parse()
            .map_err(|_| anyhow!("unknown batch {batch_id}"))?;
        let runs = inner
            .batches
            .get(index - 1)
            .ok_or_else(|| anyhow!("unknown batch {batch_id}"))?;
        let status = if inner.batch_never_finishes {
            RunStatus::Running
        } else {
            RunStatus::Completed
        };
        Ok(runs
            .iter()
            .map(|r| RunHandle {
                name: r.name.clone(),
                run_id: run_id_for(&r.name),
                status,
            })
            .collect())
    }

    async fn cancel_batch(&self, _batch_id: &str) -> Result<()> {
        self.record("cancel_batch")
    }

    async fn fetch_log(&self, run_id: &str) -> Result<String> {
        self.record("fetch_log")?;
        let name = run_id.trim_start_matches("run_");
        Ok(self.lock().logs.get(name).cloned().unwrap_or_default())
    }

    async fn delete_task(&self, _task_id: &str) -> Result<()> {
        self.record("delete_task")
    }
}

/// A catalog holding one in-memory template.
pub struct FakeCatalog {
    pub id: String,
    pub tree: FileTree,
}

impl FakeCatalog {
    pub fn node() -> Self {
        let mut tree = FileTree::new();
        tree.insert(
            "package.json".into(),
            r#"{"name":"startup-task","type":"module"}"#.into(),
        );
        tree.insert(
            "task.json".into(),
            r#"{"entry":"src/index.mjs"}"#.into(),
        );
        Self {
            id: "node-startup".into(),
            tree,
        }
    }
}

#[async_trait]
impl TemplateCatalog for FakeCatalog {
    async fn manifest(&self) -> Result<CatalogManifest> {
        Ok(CatalogManifest {
            templates: vec![TemplateEntry {
                id: self.id.clone(),
                path: self.id.clone(),
                description: None,
            }],
        })
    }

    async fn download(&self, _entry: &TemplateEntry) -> Result<FileTree> {
        Ok(self.tree.clone())
    }
}
