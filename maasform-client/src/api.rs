//! MaasApi - the remote operations the provider relies on

use async_trait::async_trait;

use crate::entity::{BootSource, BootSourceParams, BootSourceSelection, BootSourceSelectionParams};
use crate::error::{ClientError, ClientResult};

/// Name of the server setting holding the default Ubuntu release
pub const DEFAULT_DISTRO_SERIES: &str = "default_distro_series";

/// Boot source and boot source selection endpoints of the MAAS API
///
/// Implemented over HTTP by [`MaasClient`](crate::http::MaasClient) and in
/// memory by [`SimulatedMaas`](crate::sim::SimulatedMaas).
#[async_trait]
pub trait MaasApi: Send + Sync {
    async fn boot_sources(&self) -> ClientResult<Vec<BootSource>>;

    async fn boot_source(&self, id: i64) -> ClientResult<BootSource>;

    async fn create_boot_source(&self, params: &BootSourceParams) -> ClientResult<BootSource>;

    async fn update_boot_source(
        &self,
        id: i64,
        params: &BootSourceParams,
    ) -> ClientResult<BootSource>;

    async fn delete_boot_source(&self, id: i64) -> ClientResult<()>;

    async fn boot_source_selections(
        &self,
        boot_source: i64,
    ) -> ClientResult<Vec<BootSourceSelection>>;

    async fn boot_source_selection(
        &self,
        boot_source: i64,
        id: i64,
    ) -> ClientResult<BootSourceSelection>;

    async fn create_boot_source_selection(
        &self,
        boot_source: i64,
        params: &BootSourceSelectionParams,
    ) -> ClientResult<BootSourceSelection>;

    async fn update_boot_source_selection(
        &self,
        boot_source: i64,
        id: i64,
        params: &BootSourceSelectionParams,
    ) -> ClientResult<BootSourceSelection>;

    async fn delete_boot_source_selection(&self, boot_source: i64, id: i64) -> ClientResult<()>;

    /// Raw JSON value of a server configuration setting
    async fn get_config(&self, name: &str) -> ClientResult<Vec<u8>>;

    /// The server's default Ubuntu release, e.g. `noble`
    async fn default_distro_series(&self) -> ClientResult<String> {
        let raw = self.get_config(DEFAULT_DISTRO_SERIES).await?;
        serde_json::from_slice(&raw).map_err(ClientError::from)
    }
}
