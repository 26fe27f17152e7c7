//! OAuth 1.0 PLAINTEXT authentication
//!
//! MAAS API keys have the form `consumer_key:token_key:token_secret`. The
//! consumer secret is always empty, so the PLAINTEXT signature is
//! `&{token_secret}`.

use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

/// A parsed MAAS API key
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    consumer_key: String,
    token_key: String,
    token_secret: String,
}

impl ApiKey {
    /// `Authorization` header value with a fresh nonce and the current time
    pub fn authorization_header(&self) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        self.header_with(&nonce, chrono::Utc::now().timestamp())
    }

    fn header_with(&self, nonce: &str, timestamp: i64) -> String {
        format!(
            "OAuth oauth_version=\"1.0\", oauth_signature_method=\"PLAINTEXT\", \
             oauth_consumer_key=\"{}\", oauth_token=\"{}\", oauth_signature=\"&{}\", \
             oauth_nonce=\"{}\", oauth_timestamp=\"{}\"",
            self.consumer_key, self.token_key, self.token_secret, nonce, timestamp
        )
    }
}

impl FromStr for ApiKey {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [consumer, token, secret]
                if !consumer.is_empty() && !token.is_empty() && !secret.is_empty() =>
            {
                Ok(Self {
                    consumer_key: consumer.to_string(),
                    token_key: token.to_string(),
                    token_secret: secret.to_string(),
                })
            }
            _ => Err(ClientError::Config(
                "API key must have the form consumer_key:token_key:token_secret".to_string(),
            )),
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("consumer_key", &self.consumer_key)
            .field("token_key", &self.token_key)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}
