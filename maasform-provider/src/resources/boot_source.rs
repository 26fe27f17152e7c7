//! `maas_boot_source` - a remote image mirror

use std::collections::HashMap;

use log::debug;
use maasform_client::{BootSource, BootSourceParams, MaasApi};
use maasform_core::provider::{ProviderResult, ResourceType};
use maasform_core::resource::{Resource, ResourceId, State, Value};
use maasform_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{optional_str, parse_identifier, required_str};
use crate::error::from_client;

pub const RESOURCE_TYPE: &str = "maas_boot_source";

pub struct BootSourceType;

impl ResourceType for BootSourceType {
    fn name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(RESOURCE_TYPE)
            .with_description("Image mirror MAAS syncs boot images from")
            .attribute(
                AttributeSchema::new("url", AttributeType::String)
                    .required()
                    .with_description("URL of the simplestreams mirror"),
            )
            .attribute(AttributeSchema::new("keyring_filename", AttributeType::String))
            .attribute(
                AttributeSchema::new("keyring_data", AttributeType::String)
                    .with_description("Base64-encoded GPG keyring"),
            )
            .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
    }
}

/// Typed configuration of a `maas_boot_source` resource
#[derive(Debug, Clone)]
pub struct BootSourceConfig {
    url: String,
    keyring_filename: Option<String>,
    keyring_data: Option<String>,
}

impl BootSourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            keyring_filename: None,
            keyring_data: None,
        }
    }

    pub fn keyring_filename(mut self, path: impl Into<String>) -> Self {
        self.keyring_filename = Some(path.into());
        self
    }

    pub fn keyring_data(mut self, data: impl Into<String>) -> Self {
        self.keyring_data = Some(data.into());
        self
    }

    pub fn into_resource(self, name: impl Into<String>) -> Resource {
        let mut resource =
            Resource::new(RESOURCE_TYPE, name).with_attribute("url", self.url.into());
        if let Some(filename) = self.keyring_filename {
            resource = resource.with_attribute("keyring_filename", filename.into());
        }
        if let Some(data) = self.keyring_data {
            resource = resource.with_attribute("keyring_data", data.into());
        }
        resource
    }
}

fn params(resource: &Resource) -> ProviderResult<BootSourceParams> {
    Ok(BootSourceParams {
        url: required_str(&resource.id, &resource.attributes, "url")?,
        keyring_filename: optional_str(&resource.attributes, "keyring_filename"),
        keyring_data: optional_str(&resource.attributes, "keyring_data"),
    })
}

fn to_state(id: &ResourceId, source: &BootSource) -> State {
    let mut attributes = HashMap::new();
    attributes.insert("id".to_string(), Value::Int(source.id));
    attributes.insert("url".to_string(), Value::String(source.url.clone()));
    attributes.insert(
        "keyring_filename".to_string(),
        Value::String(source.keyring_filename.clone()),
    );
    attributes.insert(
        "keyring_data".to_string(),
        Value::String(source.keyring_data.clone()),
    );
    State::existing(id.clone(), attributes).with_identifier(source.id.to_string())
}

pub(crate) async fn read(
    api: &dyn MaasApi,
    id: &ResourceId,
    identifier: &str,
) -> ProviderResult<State> {
    let source_id = parse_identifier(id, identifier)?;
    let source = api.boot_source(source_id).await.map_err(from_client(id))?;
    Ok(to_state(id, &source))
}

pub(crate) async fn create(api: &dyn MaasApi, resource: &Resource) -> ProviderResult<State> {
    let params = params(resource)?;
    let source = api
        .create_boot_source(&params)
        .await
        .map_err(from_client(&resource.id))?;
    debug!("{}: created boot source {}", resource.id, source.id);
    Ok(to_state(&resource.id, &source))
}

pub(crate) async fn update(
    api: &dyn MaasApi,
    id: &ResourceId,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    let source_id = parse_identifier(id, identifier)?;
    let params = params(to)?;
    let source = api
        .update_boot_source(source_id, &params)
        .await
        .map_err(from_client(id))?;
    Ok(to_state(id, &source))
}

pub(crate) async fn delete(
    api: &dyn MaasApi,
    id: &ResourceId,
    identifier: &str,
) -> ProviderResult<()> {
    let source_id = parse_identifier(id, identifier)?;
    match api.delete_boot_source(source_id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!("{}: boot source {} already deleted", id, source_id);
            Ok(())
        }
        Err(e) => Err(from_client(id)(e)),
    }
}
