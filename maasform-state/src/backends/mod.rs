//! Backend implementations for state storage

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};

/// Backend named by `config.backend_type` ("local" or "memory")
pub fn create_backend(config: &BackendConfig) -> BackendResult<Box<dyn StateBackend>> {
    match config.backend_type.as_str() {
        "local" => Ok(Box::new(LocalBackend::from_config(config)?)),
        "memory" => Ok(Box::new(MemoryBackend::new())),
        other => Err(BackendError::unsupported_backend(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maasform_core::resource::Value;

    #[test]
    fn unknown_backend_is_unsupported() {
        match create_backend(&BackendConfig::new("s3")) {
            Err(BackendError::UnsupportedBackend(name)) => assert_eq!(name, "s3"),
            _ => panic!("expected UnsupportedBackend"),
        }
    }

    #[test]
    fn local_and_memory_are_known() {
        assert!(create_backend(&BackendConfig::new("local")).is_ok());
        assert!(create_backend(&BackendConfig::new("memory")).is_ok());
    }

    #[test]
    fn local_backend_rejects_empty_path() {
        let config = BackendConfig::new("local").with_attribute("path", Value::from(""));
        assert!(matches!(
            create_backend(&config),
            Err(BackendError::Configuration(_))
        ));
    }
}
