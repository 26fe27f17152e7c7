//! maasform MAAS Provider
//!
//! Resource adapters for MAAS boot sources and boot source selections, and
//! the lifecycle verifier that drives them through apply and destroy.

pub mod config;
mod error;
pub mod resources;
pub mod verifier;

#[cfg(test)]
mod acceptance;

use std::sync::Arc;

use maasform_client::{ClientConfig, MaasApi, MaasClient};
use maasform_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use maasform_core::resource::{Resource, ResourceId, State};

use resources::boot_source::{self, BootSourceType};
use resources::boot_source_selection::{self, BootSourceSelectionType};

pub use resources::boot_source::BootSourceConfig;
pub use resources::boot_source_selection::BootSourceSelectionConfig;
pub use verifier::{AttributeCheck, LifecycleVerifier, TestStep, VerifyError};

/// MAAS Provider
pub struct MaasProvider {
    api: Arc<dyn MaasApi>,
}

impl MaasProvider {
    /// Create a provider on top of an existing API handle
    pub fn new(api: Arc<dyn MaasApi>) -> Self {
        Self { api }
    }

    /// Create a provider talking HTTP to the configured region controller
    pub fn from_config(config: &ClientConfig) -> ProviderResult<Self> {
        let client = MaasClient::new(config).map_err(|e| {
            ProviderError::invalid_config(format!("Failed to create MAAS client: {}", e))
                .with_cause(e)
        })?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn api(&self) -> Arc<dyn MaasApi> {
        Arc::clone(&self.api)
    }
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::invalid_config(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

impl Provider for MaasProvider {
    fn name(&self) -> &'static str {
        "maas"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![Box::new(BootSourceType), Box::new(BootSourceSelectionType)]
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: &str,
        recorded: &State,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let recorded = recorded.clone();
        Box::pin(async move {
            let api = self.api.as_ref();
            match id.resource_type.as_str() {
                boot_source::RESOURCE_TYPE => boot_source::read(api, &id, &identifier).await,
                boot_source_selection::RESOURCE_TYPE => {
                    boot_source_selection::read(api, &id, &identifier, &recorded).await
                }
                _ => Err(unknown_type(&id)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let api = self.api.as_ref();
            match resource.id.resource_type.as_str() {
                boot_source::RESOURCE_TYPE => boot_source::create(api, &resource).await,
                boot_source_selection::RESOURCE_TYPE => {
                    boot_source_selection::create(api, &resource).await
                }
                _ => Err(unknown_type(&resource.id)),
            }
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move {
            let api = self.api.as_ref();
            match id.resource_type.as_str() {
                boot_source::RESOURCE_TYPE => boot_source::update(api, &id, &identifier, &to).await,
                boot_source_selection::RESOURCE_TYPE => {
                    boot_source_selection::update(api, &id, &identifier, &to).await
                }
                _ => Err(unknown_type(&id)),
            }
        })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        recorded: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let recorded = recorded.clone();
        Box::pin(async move {
            let api = self.api.as_ref();
            match id.resource_type.as_str() {
                boot_source::RESOURCE_TYPE => boot_source::delete(api, &id, &identifier).await,
                boot_source_selection::RESOURCE_TYPE => {
                    boot_source_selection::delete(api, &id, &identifier, &recorded).await
                }
                _ => Err(unknown_type(&id)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maasform_client::SimulatedMaas;
    use maasform_core::provider::ErrorKind;

    #[test]
    fn exposes_both_resource_types() {
        let provider = MaasProvider::new(Arc::new(SimulatedMaas::new("noble")));
        let names: Vec<&str> = provider.resource_types().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["maas_boot_source", "maas_boot_source_selection"]);
    }

    #[tokio::test]
    async fn unknown_resource_type_is_invalid_config() {
        let provider = MaasProvider::new(Arc::new(SimulatedMaas::new("noble")));
        let resource = Resource::new("maas_machine", "node");
        let err = provider.create(&resource).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
    }

    #[test]
    fn from_config_rejects_bad_key() {
        let config = ClientConfig::new("http://maas:5240/MAAS", "not-a-key");
        let err = MaasProvider::from_config(&config).err().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
    }
}
