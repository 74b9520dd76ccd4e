use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::errors::BenchError;

pub const ENV_API_URL: &str = "COLDSTART_API_URL";
pub const ENV_API_TOKEN: &str = "COLDSTART_API_TOKEN";
pub const ENV_STATE_DIR: &str = "COLDSTART_STATE_DIR";

/// Where the pieces of a task live inside its source tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateLayout {
    /// Dependency manifest whose `dependencies` section is replaced.
    pub manifest: String,
    /// Deployment descriptor that names the entry file to run.
    pub descriptor: String,
    /// Generated entry point.
    pub entry_source: String,
    /// Where the bundler writes its output when bundling is requested.
    pub bundle_output: String,
    pub bundler: String,
    pub bundler_version: String,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            manifest: "package.json".to_string(),
            descriptor: "task.json".to_string(),
            entry_source: "src/index.mjs".to_string(),
            bundle_output: "dist/index.mjs".to_string(),
            bundler: "esbuild".to_string(),
            bundler_version: "0.19.11".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_url: String,
    pub api_token: Option<String>,
    pub template_catalog: PathBuf,
    pub template_id: String,
    pub state_dir: PathBuf,
    pub version_label: String,
    pub build_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Upper bound on any single platform request.
    pub request_timeout_secs: u64,
    pub retry_on_resource_exhaustion: bool,
    pub layout: TemplateLayout,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            api_url: "http://localhost:8080/api/v1".to_string(),
            api_token: None,
            template_catalog: data_dir.join("coldstart").join("templates"),
            template_id: "node-startup".to_string(),
            state_dir: data_dir.join("coldstart"),
            version_label: "benchmark".to_string(),
            build_timeout_secs: 600,
            batch_timeout_secs: 1800,
            poll_interval_ms: 2000,
            request_timeout_secs: 30,
            retry_on_resource_exhaustion: true,
            layout: TemplateLayout::default(),
        }
    }
}

impl Settings {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Apply `COLDSTART_*` environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(token) = lookup(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(dir) = lookup(ENV_STATE_DIR) {
            self.state_dir = PathBuf::from(dir);
        }
    }
}

/// Default config location: `<config_dir>/coldstart/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("coldstart").join("config.toml"))
}

/// Load settings from `path` (or the default location if it exists), then
/// apply environment overrides. An explicit path that does not exist is an
/// error; a missing default file is not.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(p) => read_settings(p)?,
        None => match default_config_path() {
            Some(p) if p.is_file() => read_settings(&p)?,
            _ => Settings::default(),
        },
    };
    settings.apply_env(|key| std::env::var(key).ok());
    tracing::debug!(api_url = %settings.api_url, state_dir = %settings.state_dir.display(), "loaded settings");
    Ok(settings)
}

fn read_settings(path: &Path) -> Result<Settings> {
    let text = std::fs::read_to_string(path).map_err(|source| BenchError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = toml::from_str(&text).map_err(|e| BenchError::ConfigParse {
        path: path.to_path_buf(),
        detail: e.message().to_string(),
    })?;
    Ok(settings)
}
