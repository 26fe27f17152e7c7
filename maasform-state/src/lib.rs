//! maasform State Management
//!
//! This crate keeps the engine's recorded state: the last known attributes
//! and server-assigned identifiers of every managed resource.
//!
//! # Overview
//!
//! - **StateFile**: the persisted state containing all managed resources
//! - **StateBackend**: a trait for state storage backends (local file, memory)
//!
//! # Example
//!
//! ```ignore
//! use maasform_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::new("local"))?;
//! backend.init().await?;
//!
//! let mut state = backend.read_or_new().await?;
//! let mut recorded = state.to_recorded();
//!
//! // ... apply a plan against `recorded` ...
//!
//! state.replace_recorded("maas", &recorded);
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, MemoryBackend, create_backend};
pub use state::{ResourceState, StateFile};
