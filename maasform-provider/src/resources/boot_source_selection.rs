//! `maas_boot_source_selection` - which OS releases and architectures a
//! boot source syncs
//!
//! Selections are addressed through their parent boot source, so every
//! operation after create needs the `boot_source` attribute from recorded
//! state alongside the server-assigned ID.
//!
//! MAAS keeps one selection per (boot source, os, release). Create adopts a
//! selection that already exists for the same pair, which is always the case
//! for the default Ubuntu release. Deleting the default selection does not
//! remove it: MAAS resets it to `amd64` with wildcard subarches and labels.

use std::collections::HashMap;

use log::{debug, info};
use maasform_client::{BootSourceSelection, BootSourceSelectionParams, MaasApi};
use maasform_core::provider::{ProviderResult, ResourceType};
use maasform_core::resource::{Resource, ResourceId, State, Value};
use maasform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{parse_identifier, required_int, required_str, string_list};
use crate::error::{from_client, from_client_with_parent};

pub const RESOURCE_TYPE: &str = "maas_boot_source_selection";

pub struct BootSourceSelectionType;

impl ResourceType for BootSourceSelectionType {
    fn name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(RESOURCE_TYPE)
            .with_description("Images a boot source syncs")
            .attribute(
                AttributeSchema::new("boot_source", types::positive_int())
                    .required()
                    .force_new()
                    .with_description("ID of the parent boot source"),
            )
            .attribute(AttributeSchema::new("os", AttributeType::String).required())
            .attribute(AttributeSchema::new("release", AttributeType::String).required())
            .attribute(AttributeSchema::new("arches", types::non_empty_string_list()).required())
            .attribute(AttributeSchema::new("subarches", types::non_empty_string_list()))
            .attribute(AttributeSchema::new("labels", types::non_empty_string_list()))
            .attribute(AttributeSchema::new("id", AttributeType::Int).computed())
    }
}

/// Typed configuration of a `maas_boot_source_selection` resource
///
/// `boot_source` is either a literal ID or a reference such as
/// `Value::reference(&boot_source_id, "id")`.
#[derive(Debug, Clone)]
pub struct BootSourceSelectionConfig {
    boot_source: Value,
    os: String,
    release: String,
    arches: Vec<String>,
    subarches: Option<Vec<String>>,
    labels: Option<Vec<String>>,
}

impl BootSourceSelectionConfig {
    pub fn new(
        boot_source: impl Into<Value>,
        os: impl Into<String>,
        release: impl Into<String>,
    ) -> Self {
        Self {
            boot_source: boot_source.into(),
            os: os.into(),
            release: release.into(),
            arches: Vec::new(),
            subarches: None,
            labels: None,
        }
    }

    pub fn arches<I, S>(mut self, arches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arches = arches.into_iter().map(Into::into).collect();
        self
    }

    pub fn subarches<I, S>(mut self, subarches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subarches = non_empty(subarches);
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = non_empty(labels);
        self
    }

    pub fn into_resource(self, name: impl Into<String>) -> Resource {
        let mut resource = Resource::new(RESOURCE_TYPE, name)
            .with_attribute("boot_source", self.boot_source)
            .with_attribute("os", self.os.into())
            .with_attribute("release", self.release.into())
            .with_attribute("arches", Value::string_list(self.arches));
        if let Some(subarches) = self.subarches {
            resource = resource.with_attribute("subarches", Value::string_list(subarches));
        }
        if let Some(labels) = self.labels {
            resource = resource.with_attribute("labels", Value::string_list(labels));
        }
        resource
    }
}

/// An empty list leaves the attribute to MAAS, which fills in `*`
fn non_empty<I, S>(items: I) -> Option<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let items: Vec<String> = items.into_iter().map(Into::into).collect();
    (!items.is_empty()).then_some(items)
}

fn params(resource: &Resource) -> ProviderResult<(i64, BootSourceSelectionParams)> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let boot_source = required_int(id, attrs, "boot_source")?;
    let params = BootSourceSelectionParams {
        os: required_str(id, attrs, "os")?,
        release: required_str(id, attrs, "release")?,
        arches: string_list(id, attrs, "arches")?,
        subarches: string_list(id, attrs, "subarches")?,
        labels: string_list(id, attrs, "labels")?,
    };
    Ok((boot_source, params))
}

fn to_state(id: &ResourceId, boot_source: i64, selection: &BootSourceSelection) -> State {
    let mut attributes = HashMap::new();
    attributes.insert("id".to_string(), Value::Int(selection.id));
    attributes.insert("boot_source".to_string(), Value::Int(boot_source));
    attributes.insert("os".to_string(), Value::String(selection.os.clone()));
    attributes.insert("release".to_string(), Value::String(selection.release.clone()));
    attributes.insert("arches".to_string(), Value::string_list(selection.arches.clone()));
    attributes.insert(
        "subarches".to_string(),
        Value::string_list(selection.subarches.clone()),
    );
    attributes.insert("labels".to_string(), Value::string_list(selection.labels.clone()));
    State::existing(id.clone(), attributes).with_identifier(selection.id.to_string())
}

pub(crate) async fn read(
    api: &dyn MaasApi,
    id: &ResourceId,
    identifier: &str,
    recorded: &State,
) -> ProviderResult<State> {
    let selection_id = parse_identifier(id, identifier)?;
    let boot_source = required_int(id, &recorded.attributes, "boot_source")?;
    let selection = api
        .boot_source_selection(boot_source, selection_id)
        .await
        .map_err(from_client(id))?;
    Ok(to_state(id, boot_source, &selection))
}

pub(crate) async fn create(api: &dyn MaasApi, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let (boot_source, params) = params(resource)?;

    let existing = api
        .boot_source_selections(boot_source)
        .await
        .map_err(from_client_with_parent(id, boot_source))?;

    let selection = match existing
        .iter()
        .find(|s| s.os == params.os && s.release == params.release)
    {
        Some(found) => {
            info!(
                "{}: adopting existing selection {} for {}/{}",
                id, found.id, found.os, found.release
            );
            api.update_boot_source_selection(boot_source, found.id, &params)
                .await
                .map_err(from_client(id))?
        }
        None => api
            .create_boot_source_selection(boot_source, &params)
            .await
            .map_err(from_client_with_parent(id, boot_source))?,
    };

    debug!("{}: selection {} under boot source {}", id, selection.id, boot_source);
    Ok(to_state(id, boot_source, &selection))
}

pub(crate) async fn update(
    api: &dyn MaasApi,
    id: &ResourceId,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    let selection_id = parse_identifier(id, identifier)?;
    let (boot_source, params) = params(to)?;
    let selection = api
        .update_boot_source_selection(boot_source, selection_id, &params)
        .await
        .map_err(from_client(id))?;
    Ok(to_state(id, boot_source, &selection))
}

/// Delete the selection; for the default selection MAAS turns this into a reset
pub(crate) async fn delete(
    api: &dyn MaasApi,
    id: &ResourceId,
    identifier: &str,
    recorded: &State,
) -> ProviderResult<()> {
    let selection_id = parse_identifier(id, identifier)?;
    let boot_source = required_int(id, &recorded.attributes, "boot_source")?;
    match api.delete_boot_source_selection(boot_source, selection_id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!("{}: selection {} already deleted", id, selection_id);
            Ok(())
        }
        Err(e) => Err(from_client(id)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maasform_client::SimulatedMaas;
    use maasform_core::provider::ErrorKind;

    fn oracular() -> Resource {
        BootSourceSelectionConfig::new(1_i64, "ubuntu", "oracular")
            .arches(["amd64"])
            .into_resource("test")
    }

    #[test]
    fn schema_rejects_empty_arches() {
        let resource =
            BootSourceSelectionConfig::new(1_i64, "ubuntu", "oracular").into_resource("test");
        let errors = BootSourceSelectionType
            .schema()
            .validate(&resource.attributes)
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn schema_rejects_non_positive_boot_source() {
        let resource = BootSourceSelectionConfig::new(0_i64, "ubuntu", "oracular")
            .arches(["amd64"])
            .into_resource("test");
        assert!(BootSourceSelectionType.schema().validate(&resource.attributes).is_err());
    }

    #[test]
    fn empty_subarches_and_labels_are_left_to_maas() {
        let resource = BootSourceSelectionConfig::new(1_i64, "ubuntu", "oracular")
            .arches(["amd64"])
            .subarches(Vec::<String>::new())
            .labels(Vec::<String>::new())
            .into_resource("test");
        assert_eq!(resource.get("subarches"), None);
        assert_eq!(resource.get("labels"), None);
        assert!(BootSourceSelectionType.schema().validate(&resource.attributes).is_ok());

        let explicit = resource.with_attribute("subarches", Value::List(vec![]));
        let errors = BootSourceSelectionType
            .schema()
            .validate(&explicit.attributes)
            .unwrap_err();
        assert_eq!(errors[0].to_string(), "subarches: at least one entry is required");
    }

    #[test]
    fn boot_source_forces_replacement() {
        let schema = BootSourceSelectionType.schema();
        let force_new: Vec<&str> = schema.force_new_attributes().collect();
        assert_eq!(force_new, vec!["boot_source"]);
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let maas = SimulatedMaas::with_default_boot_source("noble");
        let resource = oracular();

        let created = create(&maas, &resource).await.unwrap();
        let identifier = created.identifier.clone().unwrap();
        assert!(identifier.parse::<i64>().unwrap() > 0);
        assert_eq!(created.get("os"), Some(&Value::from("ubuntu")));
        assert_eq!(created.get("release"), Some(&Value::from("oracular")));
        assert_eq!(created.get("arches"), Some(&Value::string_list(["amd64"])));
        assert_eq!(created.get("subarches"), Some(&Value::string_list(["*"])));

        let first = read(&maas, &resource.id, &identifier, &created).await.unwrap();
        let second = read(&maas, &resource.id, &identifier, &created).await.unwrap();
        assert_eq!(first, created);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn create_under_missing_boot_source_is_rejected() {
        let maas = SimulatedMaas::with_default_boot_source("noble");
        let resource = BootSourceSelectionConfig::new(7_i64, "ubuntu", "oracular")
            .arches(["amd64"])
            .into_resource("test");

        let err = create(&maas, &resource).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RemoteRejected);
    }

    #[tokio::test]
    async fn create_adopts_default_selection() {
        let maas = SimulatedMaas::with_default_boot_source("noble");
        let default_id = maas.boot_source_selections(1).await.unwrap()[0].id;

        let resource = BootSourceSelectionConfig::new(1_i64, "ubuntu", "noble")
            .arches(["amd64", "arm64"])
            .into_resource("default");
        let created = create(&maas, &resource).await.unwrap();

        assert_eq!(created.identifier, Some(default_id.to_string()));
        assert_eq!(created.get("arches"), Some(&Value::string_list(["amd64", "arm64"])));
        assert_eq!(maas.boot_source_selections(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_changes_arches() {
        let maas = SimulatedMaas::with_default_boot_source("noble");
        let created = create(&maas, &oracular()).await.unwrap();
        let identifier = created.identifier.clone().unwrap();

        let to = BootSourceSelectionConfig::new(1_i64, "ubuntu", "oracular")
            .arches(["amd64", "arm64"])
            .labels(["candidate"])
            .into_resource("test");
        let updated = update(&maas, &to.id, &identifier, &to).await.unwrap();
        assert_eq!(updated.get("arches"), Some(&Value::string_list(["amd64", "arm64"])));
        assert_eq!(updated.get("labels"), Some(&Value::string_list(["candidate"])));
    }

    #[tokio::test]
    async fn update_into_duplicate_is_rejected() {
        let maas = SimulatedMaas::with_default_boot_source("noble");
        let created = create(&maas, &oracular()).await.unwrap();
        let identifier = created.identifier.clone().unwrap();

        let to = BootSourceSelectionConfig::new(1_i64, "ubuntu", "noble")
            .arches(["amd64"])
            .into_resource("test");
        let err = update(&maas, &to.id, &identifier, &to).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RemoteRejected);
    }

    #[tokio::test]
    async fn delete_removes_non_default_selection() {
        let maas = SimulatedMaas::with_default_boot_source("noble");
        let resource = oracular();
        let created = create(&maas, &resource).await.unwrap();
        let identifier = created.identifier.clone().unwrap();

        delete(&maas, &resource.id, &identifier, &created).await.unwrap();
        let err = read(&maas, &resource.id, &identifier, &created).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_resets_default_selection() {
        let maas = SimulatedMaas::with_default_boot_source("noble");
        let resource = BootSourceSelectionConfig::new(1_i64, "ubuntu", "noble")
            .arches(["arm64"])
            .labels(["candidate"])
            .into_resource("default");
        let created = create(&maas, &resource).await.unwrap();
        let identifier = created.identifier.clone().unwrap();

        delete(&maas, &resource.id, &identifier, &created).await.unwrap();

        let after = read(&maas, &resource.id, &identifier, &created).await.unwrap();
        assert_eq!(after.get("arches"), Some(&Value::string_list(["amd64"])));
        assert_eq!(after.get("subarches"), Some(&Value::string_list(["*"])));
        assert_eq!(after.get("labels"), Some(&Value::string_list(["*"])));
    }

    #[tokio::test]
    async fn read_requires_recorded_boot_source() {
        let maas = SimulatedMaas::with_default_boot_source("noble");
        let id = ResourceId::new(RESOURCE_TYPE, "test");
        let err = read(&maas, &id, "1", &State::not_found(id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
    }
}
