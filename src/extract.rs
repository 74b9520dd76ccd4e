use std::sync::LazyLock;

use regex::Regex;

use crate::errors::BenchError;
use crate::types::RunTimings;

/// Printed by every instrumented entry point once eager imports have loaded.
pub const STARTUP_MARKER: &str = "startup:";
/// Printed after all lazy imports complete. Only emitted when lazy
/// dependencies were configured.
pub const DYNAMIC_IMPORT_MARKER: &str = "dynamic imports done:";

/// A number directly after a marker, allowing leading whitespace.
static TIMING_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)")
        .unwrap_or_else(|e| panic!("invalid timing pattern: {e}"))
});

/// Pull the timing markers out of one run's log.
///
/// The startup marker is mandatory. The dynamic-import marker is only looked
/// for when `expect_dynamic` is set, and its absence is not an error.
pub fn extract_timings(run: &str, log: &str, expect_dynamic: bool) -> Result<RunTimings, BenchError> {
    let startup = match find_marker(log, STARTUP_MARKER) {
        None => {
            return Err(BenchError::MissingStartupMarker {
                run: run.to_string(),
            });
        }
        Some(Err(line)) => {
            return Err(BenchError::MalformedTimingLine {
                run: run.to_string(),
                line,
            });
        }
        Some(Ok(value)) => value,
    };

    let dynamic_imports = if expect_dynamic {
        match find_marker(log, DYNAMIC_IMPORT_MARKER) {
            Some(Ok(value)) => Some(value),
            Some(Err(line)) => {
                return Err(BenchError::MalformedTimingLine {
                    run: run.to_string(),
                    line,
                });
            }
            None => None,
        }
    } else {
        None
    };

    Ok(RunTimings {
        startup,
        dynamic_imports,
    })
}

/// Look at the first occurrence of `marker` on the first line containing it.
/// `None` if there is no such line, `Some(Err(line))` if no number directly
/// follows that occurrence.
fn find_marker(log: &str, marker: &str) -> Option<Result<f64, String>> {
    let (line, idx) = log
        .lines()
        .find_map(|line| line.find(marker).map(|idx| (line, idx)))?;
    let parsed = TIMING_VALUE
        .captures(&line[idx + marker.len()..])
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());
    Some(parsed.ok_or_else(|| line.to_string()))
}
