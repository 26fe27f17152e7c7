//! Provider configuration
//!
//! The `maas` provider block accepts `api_url`, `api_key`, `api_version`,
//! `insecure_skip_verify` and `timeout_seconds`. Unset connection settings
//! fall back to the `MAAS_*` environment variables.

use std::collections::HashMap;
use std::time::Duration;

use maasform_client::config::{
    DEFAULT_API_VERSION, ENV_API_KEY, ENV_API_URL, ENV_API_VERSION, ENV_INSECURE_SKIP_VERIFY,
    parse_flag,
};
use maasform_client::ClientConfig;
use maasform_core::provider::{ProviderError, ProviderResult};
use maasform_core::resource::Value;
use maasform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

/// Schema of the provider block
pub fn provider_schema() -> ResourceSchema {
    ResourceSchema::new("maas")
        .attribute(AttributeSchema::new("api_url", AttributeType::String))
        .attribute(AttributeSchema::new("api_key", AttributeType::String))
        .attribute(
            AttributeSchema::new("api_version", AttributeType::String)
                .with_default(Value::from(DEFAULT_API_VERSION)),
        )
        .attribute(AttributeSchema::new("insecure_skip_verify", AttributeType::Bool))
        .attribute(AttributeSchema::new("timeout_seconds", types::positive_int()))
}

/// Build the client configuration from provider attributes and the environment
pub fn client_config(attributes: &HashMap<String, Value>) -> ProviderResult<ClientConfig> {
    client_config_with(attributes, |name| std::env::var(name).ok())
}

fn client_config_with(
    attributes: &HashMap<String, Value>,
    env: impl Fn(&str) -> Option<String>,
) -> ProviderResult<ClientConfig> {
    let schema = provider_schema();
    if let Err(errors) = schema.validate(attributes) {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(ProviderError::invalid_config(format!(
            "provider \"maas\": {}",
            messages.join("; ")
        )));
    }
    let mut attributes = attributes.clone();
    schema.apply_defaults(&mut attributes);

    let setting = |key: &str, var: &str| -> Option<String> {
        attributes
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| env(var))
            .filter(|v| !v.is_empty())
    };

    let api_url = setting("api_url", ENV_API_URL).ok_or_else(|| {
        ProviderError::invalid_config(format!("api_url is required (or set {})", ENV_API_URL))
    })?;
    let api_key = setting("api_key", ENV_API_KEY).ok_or_else(|| {
        ProviderError::invalid_config(format!("api_key is required (or set {})", ENV_API_KEY))
    })?;

    let mut config = ClientConfig::new(api_url, api_key);

    // an explicit attribute wins over the environment, the default loses to both
    let version = match attributes.get("api_version").and_then(Value::as_str) {
        Some(v) if v != DEFAULT_API_VERSION => Some(v.to_string()),
        _ => env(ENV_API_VERSION).filter(|v| !v.is_empty()),
    };
    if let Some(version) = version {
        config = config.with_api_version(version);
    }

    let insecure = match attributes.get("insecure_skip_verify") {
        Some(Value::Bool(b)) => *b,
        _ => match env(ENV_INSECURE_SKIP_VERIFY) {
            Some(flag) => parse_flag(ENV_INSECURE_SKIP_VERIFY, &flag).map_err(|e| {
                ProviderError::invalid_config(e.to_string()).with_cause(e)
            })?,
            None => false,
        },
    };
    config = config.with_insecure_skip_verify(insecure);

    if let Some(seconds) = attributes.get("timeout_seconds").and_then(Value::as_int) {
        config = config.with_timeout(Duration::from_secs(seconds.unsigned_abs()));
    }

    Ok(config)
}
