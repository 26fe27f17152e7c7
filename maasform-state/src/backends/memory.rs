//! In-memory backend, used by the lifecycle verifier and tests

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backend::{BackendResult, StateBackend, check_lineage};
use crate::state::StateFile;

/// Backend that keeps the state in process memory
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<Option<StateFile>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        Ok(self.state.lock().await.clone())
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        let mut stored = self.state.lock().await;
        if let Some(existing) = stored.as_ref() {
            check_lineage(existing, state)?;
        }
        *stored = Some(state.clone());
        Ok(())
    }

    async fn init(&self) -> BackendResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_or_new_returns_last_write() {
        let backend = MemoryBackend::new();
        let fresh = backend.read_or_new().await.unwrap();
        assert_eq!(fresh.serial, 0);

        let mut state = fresh.clone();
        state.increment_serial();
        backend.write_state(&state).await.unwrap();

        let stored = backend.read_or_new().await.unwrap();
        assert_eq!(stored.serial, 1);
        assert_eq!(stored.lineage, fresh.lineage);
    }
}
