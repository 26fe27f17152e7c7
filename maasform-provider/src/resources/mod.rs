//! MAAS resource adapters

pub mod boot_source;
pub mod boot_source_selection;

use maasform_core::provider::{ProviderError, ProviderResult};
use maasform_core::resource::{ResourceId, Value};
use std::collections::HashMap;

/// Parse the server-assigned ID recorded for `id`
pub(crate) fn parse_identifier(id: &ResourceId, identifier: &str) -> ProviderResult<i64> {
    identifier.parse().map_err(|_| {
        ProviderError::invalid_config(format!("invalid resource id {:?}", identifier))
            .for_resource(id.clone())
    })
}

pub(crate) fn required_str(
    id: &ResourceId,
    attributes: &HashMap<String, Value>,
    key: &str,
) -> ProviderResult<String> {
    match attributes.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(
            ProviderError::invalid_config(format!("{} is required", key)).for_resource(id.clone()),
        ),
    }
}

pub(crate) fn optional_str(attributes: &HashMap<String, Value>, key: &str) -> Option<String> {
    attributes.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn required_int(
    id: &ResourceId,
    attributes: &HashMap<String, Value>,
    key: &str,
) -> ProviderResult<i64> {
    attributes.get(key).and_then(Value::as_int).ok_or_else(|| {
        ProviderError::invalid_config(format!("{} must be an integer", key))
            .for_resource(id.clone())
    })
}

/// String list attribute; absent means empty
pub(crate) fn string_list(
    id: &ResourceId,
    attributes: &HashMap<String, Value>,
    key: &str,
) -> ProviderResult<Vec<String>> {
    match attributes.get(key) {
        None => Ok(Vec::new()),
        Some(value) => value.as_string_list().ok_or_else(|| {
            ProviderError::invalid_config(format!("{} must be a list of strings", key))
                .for_resource(id.clone())
        }),
    }
}
