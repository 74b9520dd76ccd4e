//! The benchmark pipeline: provision, then for each memory configuration
//! dispatch a batch, extract timings, aggregate and emit, then tear down.

use anyhow::{Result, anyhow};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::TemplateCatalog;
use crate::config::Settings;
use crate::dispatch::{Dispatcher, build_requests};
use crate::errors::BenchError;
use crate::extract::extract_timings;
use crate::input::validate;
use crate::platform::Platform;
use crate::provision::Provisioner;
use crate::sink::ResultSink;
use crate::state::StateStore;
use crate::stats::summarize;
use crate::types::{AggregateRecord, BenchmarkInput, MemoryConfig, ProvisionedTask};
use crate::wait::PollOptions;

pub struct Benchmark<'a> {
    pub platform: &'a dyn Platform,
    pub catalog: &'a dyn TemplateCatalog,
    pub store: &'a dyn StateStore,
    pub settings: &'a Settings,
    pub cancel: CancellationToken,
    /// Leave the provisioned task in place instead of deleting it.
    pub keep_task: bool,
}

impl Benchmark<'_> {
    /// Run the whole benchmark, emitting one record per configuration to
    /// `sink` as soon as it is available. Returns the emitted records.
    ///
    /// Once the task is built it is torn down on every exit path, unless
    /// `keep_task` is set. A failure during provisioning leaves the
    /// persisted checkpoints in place so the next invocation resumes.
    pub async fn run(
        &self,
        input: &BenchmarkInput,
        sink: &mut dyn ResultSink,
    ) -> Result<Vec<AggregateRecord>> {
        let configs = validate(input)?;

        let mut state = self.store.load().await?;
        let provisioner = Provisioner {
            platform: self.platform,
            catalog: self.catalog,
            store: self.store,
            settings: self.settings,
            cancel: self.cancel.clone(),
        };
        let task = provisioner.provision(input, &mut state).await?;

        let result = self.measure_all(&task, input, &configs, sink).await;

        if self.keep_task {
            info!(task_id = %task.task_id, "keeping task");
        } else if let Err(e) = teardown(self.platform, self.store, &task.task_id).await {
            warn!(task_id = %task.task_id, "teardown failed: {e:#}");
        }

        result
    }

    async fn measure_all(
        &self,
        task: &ProvisionedTask,
        input: &BenchmarkInput,
        configs: &[MemoryConfig],
        sink: &mut dyn ResultSink,
    ) -> Result<Vec<AggregateRecord>> {
        let mut records = Vec::with_capacity(configs.len());

        for config in configs {
            if self.cancel.is_cancelled() {
                return Err(BenchError::Cancelled {
                    operation: "benchmark",
                }
                .into());
            }

            let record = self.measure(task, input, config).await?;
            sink.emit(&record)?;
            info!(
                memory = %record.memory_mbs,
                mean = record.mean,
                median = record.median,
                "record emitted"
            );
            records.push(record);
        }

        Ok(records)
    }

    async fn measure(
        &self,
        task: &ProvisionedTask,
        input: &BenchmarkInput,
        config: &MemoryConfig,
    ) -> Result<AggregateRecord> {
        info!(memory = config.mb, iterations = input.iterations, "measuring configuration");

        let requests = build_requests(config, input.iterations);
        let dispatcher = Dispatcher {
            platform: self.platform,
            options: PollOptions {
                interval: self.settings.poll_interval(),
                timeout: self.settings.batch_timeout(),
            },
            cancel: self.cancel.clone(),
        };
        let results = dispatcher.dispatch(&task.task_id, &requests).await?;

        let expect_dynamic = input.has_lazy();
        let mut startup = Vec::with_capacity(requests.len());
        let mut dynamic = Vec::new();
        for request in &requests {
            let result = results
                .get(&request.name)
                .ok_or_else(|| anyhow!("Run {} is missing from the batch results", request.name))?;
            let timings = extract_timings(&request.name, &result.log, expect_dynamic)?;
            startup.push(timings.startup);
            if let Some(d) = timings.dynamic_imports {
                dynamic.push(d);
            }
        }

        let stats = summarize(&startup).ok_or_else(|| BenchError::EmptySamples {
            memory: config.label.clone(),
        })?;
        let dyn_stats = summarize(&dynamic);
        if expect_dynamic && dyn_stats.is_none() {
            warn!(memory = config.mb, "no run reported dynamic import timings");
        }

        Ok(AggregateRecord {
            mean: stats.mean,
            median: stats.median,
            min: stats.min,
            max: stats.max,
            memory_mbs: config.label.clone(),
            iterations: input.iterations,
            all_startup_times: startup,
            dependencies_json: input.dependencies.to_json().to_string(),
            dyn_mean: dyn_stats.map(|s| s.mean),
            dyn_median: dyn_stats.map(|s| s.median),
            dyn_min: dyn_stats.map(|s| s.min),
            dyn_max: dyn_stats.map(|s| s.max),
            bundled: input.bundle,
            created_at: Utc::now(),
        })
    }
}

/// Delete the task and forget the provisioning state.
pub async fn teardown(platform: &dyn Platform, store: &dyn StateStore, task_id: &str) -> Result<()> {
    platform.delete_task(task_id).await?;
    info!(%task_id, "task deleted");
    store.clear().await?;
    Ok(())
}
