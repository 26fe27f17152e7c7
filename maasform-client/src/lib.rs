//! maasform MAAS client
//!
//! Typed access to the boot source endpoints of the MAAS API, over HTTP
//! ([`MaasClient`]) or against an in-memory region controller
//! ([`SimulatedMaas`]).

pub mod api;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod http;
pub mod sim;

pub use api::MaasApi;
pub use config::ClientConfig;
pub use entity::{BootSource, BootSourceParams, BootSourceSelection, BootSourceSelectionParams};
pub use error::{ClientError, ClientResult};
pub use http::MaasClient;
pub use sim::SimulatedMaas;
