//! JSON state file on the local filesystem

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend, check_lineage};
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "maasform.state.json";

    /// `maasform.state.json` in the working directory
    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: PathBuf) -> Self {
        Self { state_path }
    }

    /// Reads the optional `path` attribute
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        Ok(match config.get_string("path") {
            Some("") => return Err(BackendError::configuration("path must not be empty")),
            Some(path) => Self::with_path(PathBuf::from(path)),
            None => Self::new(),
        })
    }

    pub fn state_path(&self) -> &PathBuf {
        &self.state_path
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> BackendError {
        BackendError::Io(format!("{} {}: {}", action, self.state_path.display(), e))
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match tokio::fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error("reading", e)),
        };

        let state = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("{}: {}", self.state_path.display(), e))
        })?;
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(stored) = self.read_state().await? {
            check_lineage(&stored, state)?;
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| BackendError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.state_path, content)
            .await
            .map_err(|e| self.io_error("writing", e))?;

        debug!(
            "wrote state serial {} to {}",
            state.serial,
            self.state_path.display()
        );
        Ok(())
    }

    async fn init(&self) -> BackendResult<()> {
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error("creating the directory of", e))?;
        }
        Ok(())
    }
}
