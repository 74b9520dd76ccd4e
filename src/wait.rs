use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::BenchError;

/// How long to wait for a remote operation and how often to ask.
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Call `probe` every `interval` until it yields a value.
///
/// Fails with `BenchError::Timeout` once `timeout` has elapsed, or
/// `BenchError::Cancelled` as soon as `cancel` fires, even while a probe is
/// still in flight. Errors from `probe` propagate immediately.
pub async fn poll_until<T, F, Fut>(
    operation: &'static str,
    options: PollOptions,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + options.timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(BenchError::Cancelled { operation }.into());
        }

        // An in-flight probe is raced against the deadline and the token.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(BenchError::Cancelled { operation }.into());
            }
            result = probe() => result?,
            _ = tokio::time::sleep_until(deadline) => {
                return Err(timed_out(operation, options));
            }
        };

        if let Some(value) = outcome {
            return Ok(value);
        }

        if Instant::now() >= deadline {
            return Err(timed_out(operation, options));
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(BenchError::Cancelled { operation }.into());
            }
            _ = tokio::time::sleep_until(deadline.min(Instant::now() + options.interval)) => {}
        }
    }
}

fn timed_out(operation: &'static str, options: PollOptions) -> anyhow::Error {
    BenchError::Timeout {
        operation,
        after: options.timeout,
    }
    .into()
}
