use std::collections::HashMap;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::platform::{Platform, RunHandle, RunStatus};
use crate::types::{MemoryConfig, RunRequest, RunResult};
use crate::wait::{PollOptions, poll_until};

/// Name of the `iteration`th (1-based) run of a configuration. Unique within
/// a batch and readable in platform logs.
pub fn run_name(config: &MemoryConfig, iteration: u32) -> String {
    format!("mem{}-run{}", config.mb, iteration)
}

pub fn build_requests(config: &MemoryConfig, iterations: u32) -> Vec<RunRequest> {
    (1..=iterations)
        .map(|i| RunRequest {
            name: run_name(config, i),
            input: serde_json::json!({}),
            memory_limit_mb: config.mb,
        })
        .collect()
}

/// Submits one batch per configuration and waits for all of its runs.
pub struct Dispatcher<'a> {
    pub platform: &'a dyn Platform,
    pub options: PollOptions,
    pub cancel: CancellationToken,
}

impl Dispatcher<'_> {
    /// Submit `requests` as one batch, wait until every run is terminal, then
    /// fetch each run's log. Results are keyed by request name.
    ///
    /// If waiting fails (timeout, cancellation, platform error) the batch is
    /// cancelled on the platform before the error is returned.
    pub async fn dispatch(
        &self,
        task_id: &str,
        requests: &[RunRequest],
    ) -> Result<HashMap<String, RunResult>> {
        let batch_id = self.platform.submit_batch(task_id, requests).await?;
        info!(%batch_id, runs = requests.len(), "batch submitted");

        let runs = match self.await_batch(&batch_id, requests).await {
            Ok(runs) => runs,
            Err(e) => {
                warn!(%batch_id, "abandoning batch: {e:#}");
                if let Err(cancel_err) = self.platform.cancel_batch(&batch_id).await {
                    warn!(%batch_id, "failed to cancel batch: {cancel_err:#}");
                }
                return Err(e);
            }
        };
        info!(%batch_id, "batch finished");

        let mut results = HashMap::with_capacity(requests.len());
        for request in requests {
            let Some(run) = runs.iter().find(|r| r.name == request.name) else {
                continue;
            };
            if run.status != RunStatus::Completed {
                warn!(run = %run.name, status = ?run.status, "run did not complete cleanly");
            }
            let log = self.platform.fetch_log(&run.run_id).await?;
            debug!(run = %run.name, bytes = log.len(), "fetched log");
            results.insert(
                run.name.clone(),
                RunResult {
                    run_id: run.run_id.clone(),
                    log,
                },
            );
        }

        Ok(results)
    }

    async fn await_batch(&self, batch_id: &str, requests: &[RunRequest]) -> Result<Vec<RunHandle>> {
        let platform = self.platform;
        poll_until("batch", self.options, &self.cancel, move || async move {
            let runs = platform.batch_status(batch_id).await?;
            let done = requests.iter().all(|req| {
                runs.iter()
                    .any(|run| run.name == req.name && run.status.is_terminal())
            });
            Ok::<_, anyhow::Error>(done.then_some(runs))
        })
        .await
    }
}
