//! Persistence for the provisioning checkpoints.
//!
//! The store holds a single `ProvisioningState` slot. It is read once when a
//! benchmark starts and written after every provisioning step that succeeds,
//! so a restarted process resumes at the first step not yet recorded.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::errors::BenchError;
use crate::types::ProvisioningState;

/// Namespace of the state slot; also the file stem of `FileStateStore`.
pub const STATE_NAMESPACE: &str = "coldstart";

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the persisted state, or an empty one if nothing was stored.
    async fn load(&self) -> Result<ProvisioningState>;

    async fn save(&self, state: &ProvisioningState) -> Result<()>;

    /// Drop the slot entirely.
    async fn clear(&self) -> Result<()>;
}

/// Stores the state as pretty JSON at `<dir>/coldstart.json`.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STATE_NAMESPACE}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<ProvisioningState> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProvisioningState::default());
            }
            Err(source) => {
                return Err(BenchError::StateRead {
                    path: self.path.clone(),
                    source,
                }
                .into());
            }
        };

        let state = serde_json::from_str(&text).map_err(|e| BenchError::StateParse {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        Ok(state)
    }

    async fn save(&self, state: &ProvisioningState) -> Result<()> {
        let write_err = |source| BenchError::StateWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        // Write-then-rename so a crash never leaves a truncated checkpoint.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state)?).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;

        tracing::debug!("saved provisioning state to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BenchError::StateWrite {
                path: self.path.clone(),
                source,
            }
            .into()),
        }
    }
}

/// In-memory store. Counts saves so callers can check checkpointing.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<ProvisioningState>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    pub fn new(state: ProvisioningState) -> Self {
        Self {
            state: Mutex::new(state),
            saves: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> ProvisioningState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<ProvisioningState> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &ProvisioningState) -> Result<()> {
        let mut slot = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?;
        *slot = state.clone();
        if let Ok(mut n) = self.saves.lock() {
            *n += 1;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.save(&ProvisioningState::default()).await
    }
}
