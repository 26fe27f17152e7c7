//! Recorded state as it is persisted
//!
//! The engine keeps `State` values keyed by `ResourceId`; on disk they become
//! a list of `ResourceState` entries with JSON attributes so that flat-map
//! checks (`arches.#`, `arches.0`) can be evaluated directly on the file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use maasform_core::interpreter::RecordedStates;
use maasform_core::resource::{ResourceId, State, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Bumped on every write
    pub serial: u64,
    /// Random ID fixed when the file is first created
    pub lineage: String,
    pub maasform_version: String,
    /// Sorted by address
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    /// Empty state with a fresh lineage
    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            maasform_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.maasform_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Look up a resource by its `type.name` address
    pub fn resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.address() == address)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a ResourceState> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    /// Insert `resource`, replacing any entry at the same address
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        let address = resource.address();
        if let Some(existing) = self.resources.iter_mut().find(|r| r.address() == address) {
            *existing = resource;
            return;
        }
        let pos = self.resources.partition_point(|r| r.address() < address);
        self.resources.insert(pos, resource);
    }

    /// Recorded states in the shape the interpreter works with
    pub fn to_recorded(&self) -> RecordedStates {
        self.resources
            .iter()
            .map(|r| {
                let state = r.to_state();
                (state.id.clone(), state)
            })
            .collect()
    }

    /// Replace every entry with the interpreter's existing resources
    pub fn replace_recorded(&mut self, provider: &str, recorded: &RecordedStates) {
        self.resources.clear();
        for state in recorded.values().filter(|s| s.exists) {
            self.upsert_resource(ResourceState::from_state(state, provider));
        }
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// One managed resource: where it lives in MAAS and what it looked like
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,
    pub name: String,
    pub provider: String,
    /// MAAS ID rendered as a string
    #[serde(default)]
    pub identifier: Option<String>,
    pub attributes: HashMap<String, serde_json::Value>,
    /// Addresses this resource referenced when it was applied
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: None,
            attributes: HashMap::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// Attribute rendered the way it would appear in a flat attribute map
    ///
    /// Strings are returned bare, numbers and booleans in their JSON form.
    pub fn attribute_string(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn from_state(state: &State, provider: &str) -> Self {
        Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.to_string(),
            identifier: state.identifier.clone(),
            attributes: state
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
            dependencies: state.dependencies.iter().cloned().collect(),
        }
    }

    pub fn to_state(&self) -> State {
        let attributes = self
            .attributes
            .iter()
            .filter_map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
            .collect();
        let id = ResourceId::new(&self.resource_type, &self.name);
        let mut state = State::existing(id, attributes)
            .with_dependencies(self.dependencies.iter().cloned());
        state.identifier = self.identifier.clone();
        state
    }
}

pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::String(s) => Json::from(s.as_str()),
        Value::Int(n) => Json::from(*n),
        Value::Bool(b) => Json::from(*b),
        Value::List(items) => items.iter().map(value_to_json).collect(),
        Value::Map(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        // unreachable once references are resolved; kept legible if one slips through
        Value::ResourceRef(address, attr) => Json::from(format!("${{{}.{}}}", address, attr)),
    }
}

/// `None` for null and for numbers outside i64
pub fn json_to_value(json: &Json) -> Option<Value> {
    Some(match json {
        Json::Null => return None,
        Json::String(s) => Value::String(s.clone()),
        Json::Number(n) => Value::Int(n.as_i64()?),
        Json::Bool(b) => Value::Bool(*b),
        Json::Array(items) => Value::List(items.iter().filter_map(json_to_value).collect()),
        Json::Object(map) => Value::Map(
            map.iter()
                .filter_map(|(k, v)| Some((k.clone(), json_to_value(v)?)))
                .collect(),
        ),
    })
}
