//! Where recorded state lives between runs

use std::collections::HashMap;

use async_trait::async_trait;
use maasform_core::resource::Value;
use thiserror::Error;

use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no state backend named {0:?}")]
    UnsupportedBackend(String),

    #[error("state backend misconfigured: {0}")]
    Configuration(String),

    #[error("state file is unreadable: {0}")]
    InvalidState(String),

    /// Another configuration's state is already stored here
    #[error("state belongs to lineage {expected}, refusing to overwrite it with {actual}")]
    LineageMismatch { expected: String, actual: String },

    #[error("state I/O failed: {0}")]
    Io(String),

    #[error("state could not be encoded: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn unsupported_backend(name: impl Into<String>) -> Self {
        Self::UnsupportedBackend(name.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for the recorded state of one configuration
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Stored state, or `None` before the first write
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Replace the stored state
    ///
    /// Bump the serial first. A state from another lineage is rejected.
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    async fn init(&self) -> BackendResult<()>;

    async fn read_or_new(&self) -> BackendResult<StateFile> {
        Ok(self.read_state().await?.unwrap_or_default())
    }
}

pub(crate) fn check_lineage(stored: &StateFile, incoming: &StateFile) -> BackendResult<()> {
    if stored.lineage == incoming.lineage {
        return Ok(());
    }
    Err(BackendError::LineageMismatch {
        expected: stored.lineage.clone(),
        actual: incoming.lineage.clone(),
    })
}

/// Backend selection plus its settings (`path` for "local")
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub backend_type: String,
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    pub fn new(backend_type: impl Into<String>) -> Self {
        Self {
            backend_type: backend_type.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert_eq!(
            BackendError::unsupported_backend("s3").to_string(),
            "no state backend named \"s3\""
        );

        let error = BackendError::LineageMismatch {
            expected: "a".into(),
            actual: "b".into(),
        };
        assert_eq!(
            error.to_string(),
            "state belongs to lineage a, refusing to overwrite it with b"
        );
    }

    #[test]
    fn lineage_must_match() {
        let stored = StateFile::with_lineage("one".into());
        assert!(check_lineage(&stored, &StateFile::with_lineage("one".into())).is_ok());
        assert!(matches!(
            check_lineage(&stored, &StateFile::with_lineage("two".into())),
            Err(BackendError::LineageMismatch { .. })
        ));
    }

    #[test]
    fn config_reads_string_attributes() {
        let config = BackendConfig::new("local")
            .with_attribute("path", Value::from("state/maas.json"))
            .with_attribute("retries", Value::Int(3));
        assert_eq!(config.get_string("path"), Some("state/maas.json"));
        assert_eq!(config.get_string("retries"), None);
        assert_eq!(config.get_string("missing"), None);
    }
}
