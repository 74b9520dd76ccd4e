use std::path::PathBuf;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("Template '{id}' not found in the template catalog")]
    TemplateNotFound { id: String },

    #[error("Run {run} produced no 'startup:' line. Is the entry point instrumented?")]
    MissingStartupMarker { run: String },

    #[error("Run {run} has a malformed timing line: {line:?}")]
    MalformedTimingLine { run: String, line: String },

    #[error("No startup samples collected for the {memory} MB configuration")]
    EmptySamples { memory: String },

    #[error("Memory limit '{value}' is not a positive integer number of megabytes")]
    InvalidMemoryLimit { value: String },

    #[error("Lazy dependency '{name}' is not listed under [dependencies]")]
    UnknownLazyDependency { name: String },

    #[error("Iteration count must be at least 1")]
    NoIterations,

    #[error("At least one memory configuration is required")]
    NoConfigurations,

    #[error("Build {build_id} finished with status '{status}'")]
    BuildFailed { build_id: String, status: String },

    #[error("Timed out after {after:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Cancelled while waiting for {operation}")]
    Cancelled { operation: &'static str },

    #[error("Platform request '{operation}' failed with HTTP {status}: {body}")]
    Platform {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to read provisioning state {path}: {source}")]
    StateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Provisioning state {path} is corrupt: {detail}")]
    StateParse { path: PathBuf, detail: String },

    #[error("Failed to write provisioning state {path}: {source}")]
    StateWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },
}
