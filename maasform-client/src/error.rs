//! Client error type

use thiserror::Error;

/// Errors returned by a [`MaasApi`](crate::api::MaasApi) implementation
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered 404
    #[error("not found: {0}")]
    NotFound(String),

    /// The server refused the request with a non-2xx status other than 404
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Connection, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The client could not be configured
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
