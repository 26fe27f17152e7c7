//! The contract between the engine and a remote management API
//!
//! The interpreter turns each Effect into one call on a [`Provider`]; the
//! provider owns everything about how that call reaches the server.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Classification of a provider failure
///
/// The engine only recovers from `NotFound`; every other kind aborts the
/// current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote entity is absent
    NotFound,
    /// The remote API refused the request (invalid input combination, unknown parent, ...)
    RemoteRejected,
    /// Network or (de)serialization failure
    Transport,
    /// Configuration or recorded state could not be turned into a request
    InvalidConfig,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::RemoteRejected => "rejected",
            ErrorKind::Transport => "transport error",
            ErrorKind::InvalidConfig => "invalid configuration",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub kind: ErrorKind,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_id {
            Some(id) => write!(f, "[{}] {}", id, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let cause: &(dyn std::error::Error + 'static) = self.cause.as_deref()?;
        Some(cause)
    }
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            resource_id: None,
            cause: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteRejected, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, message)
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One kind of remote entity a provider manages
pub trait ResourceType: Send + Sync {
    /// Type prefix of addresses, e.g. `maas_boot_source`
    fn name(&self) -> &'static str;

    /// Attribute schema used to validate configuration before any remote call
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
    }
}

/// Each operation is a self-contained exchange with the remote API.
/// `identifier` is always the server-assigned ID recorded from a previous
/// create; `recorded` is the last state the engine holds for the resource,
/// which carries parent references needed to address the remote entity.
pub trait Provider: Send + Sync {
    /// Recorded in state next to every resource it created
    fn name(&self) -> &'static str;

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Fails with `ErrorKind::NotFound` if the remote entity no longer exists.
    fn read(
        &self,
        id: &ResourceId,
        identifier: &str,
        recorded: &State,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// The returned state carries the server-assigned identifier
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        recorded: &State,
    ) -> BoxFuture<'_, ProviderResult<()>>;
}
