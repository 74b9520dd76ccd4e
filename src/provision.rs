//! Idempotent provisioning of the disposable task.
//!
//! Three steps, each guarded by its checkpoint in `ProvisioningState`:
//! create the task, publish the materialized sources as a version, build
//! that version. A step whose checkpoint is already set is skipped; a step
//! that succeeds is persisted before the next one starts. Remote failures
//! are fatal and not retried here.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::{TemplateCatalog, fetch_template};
use crate::config::Settings;
use crate::errors::BenchError;
use crate::platform::{BuildStatus, Platform};
use crate::state::StateStore;
use crate::template::materialize;
use crate::types::{BenchmarkInput, FileTree, ProvisionedTask, ProvisioningState};
use crate::wait::{PollOptions, poll_until};

pub struct Provisioner<'a> {
    pub platform: &'a dyn Platform,
    pub catalog: &'a dyn TemplateCatalog,
    pub store: &'a dyn StateStore,
    pub settings: &'a Settings,
    pub cancel: CancellationToken,
}

/// A task name unlikely to collide with concurrent benchmark runs.
pub fn random_task_name() -> String {
    format!("coldstart-{:08x}", rand::random::<u32>())
}

/// Fetch the base template and rewrite it for `input`.
pub async fn prepare_sources(
    catalog: &dyn TemplateCatalog,
    settings: &Settings,
    input: &BenchmarkInput,
) -> Result<FileTree> {
    let base = fetch_template(catalog, &settings.template_id).await?;
    materialize(&base, input, &settings.layout)
}

impl Provisioner<'_> {
    /// Drive `state` to `BuildComplete`, persisting after every step.
    pub async fn provision(
        &self,
        input: &BenchmarkInput,
        state: &mut ProvisioningState,
    ) -> Result<ProvisionedTask> {
        info!(stage = %state.stage(), "provisioning");

        // Sources are prepared up front so a missing template aborts before
        // any remote call.
        let sources = match state.version_id {
            None => Some(prepare_sources(self.catalog, self.settings, input).await?),
            Some(_) => None,
        };

        let task_id = match state.task_id.clone() {
            Some(id) => {
                info!(task_id = %id, "task already created, skipping");
                id
            }
            None => {
                let name = random_task_name();
                let id = self.platform.create_task(&name).await?;
                info!(task_id = %id, %name, "created task");
                state.task_id = Some(id.clone());
                self.store.save(state).await?;
                id
            }
        };

        let version_id = match (state.version_id.clone(), sources) {
            (Some(id), _) => {
                info!(version_id = %id, "version already published, skipping");
                id
            }
            (None, files) => {
                let files = match files {
                    Some(files) => files,
                    None => prepare_sources(self.catalog, self.settings, input).await?,
                };
                let id = self
                    .platform
                    .publish_version(&task_id, &self.settings.version_label, &files)
                    .await?;
                info!(version_id = %id, files = files.len(), "published version");
                state.version_id = Some(id.clone());
                self.store.save(state).await?;
                id
            }
        };

        let build_id = match state.build_id.clone() {
            Some(id) => {
                info!(build_id = %id, "build already complete, skipping");
                id
            }
            None => {
                let id = self.build(&task_id, &version_id).await?;
                state.build_id = Some(id.clone());
                self.store.save(state).await?;
                id
            }
        };

        Ok(ProvisionedTask {
            task_id,
            version_id,
            build_id,
        })
    }

    /// Trigger a build and wait for it to finish. Only a successful build is
    /// returned; any other terminal status is fatal.
    async fn build(&self, task_id: &str, version_id: &str) -> Result<String> {
        let build_id = self.platform.start_build(task_id, version_id).await?;
        info!(%build_id, "build started");

        let options = PollOptions {
            interval: self.settings.poll_interval(),
            timeout: self.settings.build_timeout(),
        };
        let platform = self.platform;
        let id = build_id.as_str();
        let status = poll_until("build", options, &self.cancel, move || async move {
            let status = platform.build_status(id).await?;
            Ok::<_, anyhow::Error>(status.is_terminal().then_some(status))
        })
        .await?;

        if status != BuildStatus::Succeeded {
            return Err(BenchError::BuildFailed {
                build_id,
                status: status.as_str().to_string(),
            }
            .into());
        }

        info!(%build_id, "build finished");
        Ok(build_id)
    }
}
