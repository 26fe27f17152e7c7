//! Client configuration

use std::time::Duration;

use crate::error::{ClientError, ClientResult};

pub const ENV_API_URL: &str = "MAAS_API_URL";
pub const ENV_API_KEY: &str = "MAAS_API_KEY";
pub const ENV_API_VERSION: &str = "MAAS_API_VERSION";
pub const ENV_INSECURE_SKIP_VERIFY: &str = "MAAS_INSECURE_SKIP_VERIFY";

pub const DEFAULT_API_VERSION: &str = "2.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a MAAS region controller
#[derive(Clone)]
pub struct ClientConfig {
    /// e.g. `http://maas.example:5240/MAAS`
    pub api_url: String,
    pub api_key: String,
    pub api_version: String,
    pub insecure_skip_verify: bool,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            insecure_skip_verify: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_insecure_skip_verify(mut self, insecure: bool) -> Self {
        self.insecure_skip_verify = insecure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the configuration from `MAAS_*` environment variables
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let api_url = lookup(ENV_API_URL)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ClientError::Config(format!("{} is not set", ENV_API_URL)))?;
        let api_key = lookup(ENV_API_KEY)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ClientError::Config(format!("{} is not set", ENV_API_KEY)))?;

        let mut config = Self::new(api_url, api_key);
        if let Some(version) = lookup(ENV_API_VERSION).filter(|v| !v.is_empty()) {
            config.api_version = version;
        }
        if let Some(flag) = lookup(ENV_INSECURE_SKIP_VERIFY) {
            config.insecure_skip_verify = parse_flag(ENV_INSECURE_SKIP_VERIFY, &flag)?;
        }
        Ok(config)
    }

    /// Root of the versioned API, always ending in `/`
    pub fn base_url(&self) -> String {
        format!(
            "{}/api/{}/",
            self.api_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Parse a boolean setting given as text
pub fn parse_flag(name: &str, value: &str) -> ClientResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        other => Err(ClientError::Config(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}
