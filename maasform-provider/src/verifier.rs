//! Lifecycle verifier
//!
//! Drives the MAAS provider through the same cycle an acceptance test does:
//! apply a configuration, check the recorded attributes and the remote
//! entities, then destroy everything and check that MAAS was cleaned up.
//!
//! Attribute checks address recorded state with flat-map keys: `os` for a
//! scalar, `arches.#` for the length of a list and `arches.0` for an element.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{info, warn};
use maasform_client::{BootSourceSelection, ClientError, MaasApi};
use maasform_core::interpreter::{ApplyResult, EffectOutcome, Interpreter};
use maasform_core::provider::{Provider, ProviderError};
use maasform_core::resource::Resource;
use maasform_state::{BackendError, MemoryBackend, ResourceState, StateBackend, StateFile};
use thiserror::Error;

use crate::MaasProvider;
use crate::resources::boot_source_selection;

/// A failed verification
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("error getting boot source selection: {0}")]
    Api(#[from] ClientError),

    #[error("resource not found in state: {0}")]
    NotInState(String),

    #[error("{0}: resource id not set")]
    MissingId(String),

    #[error("{address}: invalid {attribute} {value:?}")]
    InvalidAttribute {
        address: String,
        attribute: String,
        value: String,
    },

    #[error("{address}: attribute {key} expected {expected:?}, got {}", describe(.actual))]
    AttributeMismatch {
        address: String,
        key: String,
        expected: String,
        actual: Option<String>,
    },

    #[error("MAAS Boot Source Selection ({id}) still exists")]
    StillExists { address: String, id: i64 },

    #[error("MAAS Boot Source Selection ({id}) {field} not reset to default. Returned value: {actual:?}")]
    NotReset {
        id: i64,
        field: &'static str,
        actual: Vec<String>,
    },

    #[error("{0}: consecutive reads returned different state")]
    NotIdempotent(String),

    #[error("expected no changes after apply, but plan is not empty: {0}")]
    PendingChanges(String),

    #[error("{} checks failed: {}", .0.len(), join(.0))]
    Checks(Vec<VerifyError>),
}

fn describe(actual: &Option<String>) -> String {
    match actual {
        Some(value) => format!("{:?}", value),
        None => "no value".to_string(),
    }
}

fn join(errors: &[VerifyError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type VerifyResult<T> = Result<T, VerifyError>;

fn aggregate(mut failures: Vec<VerifyError>) -> VerifyResult<()> {
    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0)),
        _ => Err(VerifyError::Checks(failures)),
    }
}

/// Expected value of one flat-map attribute key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCheck {
    pub address: String,
    pub key: String,
    pub expected: String,
}

impl AttributeCheck {
    pub fn new(
        address: impl Into<String>,
        key: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            key: key.into(),
            expected: expected.into(),
        }
    }
}

/// One apply of a configuration and the checks to run after it
#[derive(Debug, Clone, Default)]
pub struct TestStep {
    pub resources: Vec<Resource>,
    pub checks: Vec<AttributeCheck>,
    pub exists: Vec<String>,
}

impl TestStep {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }

    pub fn check_attr(
        mut self,
        address: impl Into<String>,
        key: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        self.checks.push(AttributeCheck::new(address, key, expected));
        self
    }

    /// Require the selection at `address` to be fetchable from MAAS
    pub fn check_exists(mut self, address: impl Into<String>) -> Self {
        self.exists.push(address.into());
        self
    }
}

/// Flatten recorded attributes into flat-map keys
pub fn flatten(attributes: &HashMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();
    for (key, value) in attributes {
        flatten_into(&mut flat, key, value);
    }
    flat
}

fn flatten_into(flat: &mut BTreeMap<String, String>, prefix: &str, value: &serde_json::Value) {
    use serde_json::Value as Json;

    match value {
        Json::Null => {}
        Json::Bool(b) => {
            flat.insert(prefix.to_string(), b.to_string());
        }
        Json::Number(n) => {
            flat.insert(prefix.to_string(), n.to_string());
        }
        Json::String(s) => {
            flat.insert(prefix.to_string(), s.clone());
        }
        Json::Array(items) => {
            flat.insert(format!("{}.#", prefix), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_into(flat, &format!("{}.{}", prefix, i), item);
            }
        }
        Json::Object(map) => {
            flat.insert(format!("{}.%", prefix), map.len().to_string());
            for (k, v) in map {
                flatten_into(flat, &format!("{}.{}", prefix, k), v);
            }
        }
    }
}

/// Runs apply/check/destroy cycles against a MAAS API
pub struct LifecycleVerifier {
    api: Arc<dyn MaasApi>,
    interpreter: Interpreter<MaasProvider>,
    backend: Box<dyn StateBackend>,
}

impl LifecycleVerifier {
    /// Verifier keeping recorded state in memory
    pub fn new(api: Arc<dyn MaasApi>) -> Self {
        Self::with_backend(api, Box::new(MemoryBackend::new()))
    }

    pub fn with_backend(api: Arc<dyn MaasApi>, backend: Box<dyn StateBackend>) -> Self {
        let interpreter = Interpreter::new(MaasProvider::new(Arc::clone(&api)));
        Self {
            api,
            interpreter,
            backend,
        }
    }

    /// The recorded state as last persisted
    pub async fn recorded_state(&self) -> VerifyResult<StateFile> {
        Ok(self.backend.read_or_new().await?)
    }

    async fn save(
        &self,
        file: &mut StateFile,
        states: &maasform_core::interpreter::RecordedStates,
    ) -> VerifyResult<()> {
        file.replace_recorded(self.interpreter.provider().name(), states);
        file.increment_serial();
        self.backend.write_state(file).await?;
        Ok(())
    }

    /// Apply `desired` through the engine and persist the outcome
    ///
    /// Recorded state is saved even when an effect fails, so resources
    /// created before the failure are still destroyed later.
    pub async fn provision(&self, desired: &[Resource]) -> VerifyResult<()> {
        let mut file = self.backend.read_or_new().await?;
        let mut states = file.to_recorded();

        self.interpreter.refresh(&mut states).await?;
        let plan = self.interpreter.plan(desired, &states)?;
        info!("{}", plan.summary());

        let result = self.interpreter.apply(&plan, &mut states).await;
        report(&result);
        self.save(&mut file, &states).await?;
        result.into_result()?;
        Ok(())
    }

    /// Compare recorded attributes with expected literals
    pub async fn check_attributes(&self, checks: &[AttributeCheck]) -> VerifyResult<()> {
        let file = self.recorded_state().await?;
        aggregate(attribute_failures(&file, checks))
    }

    /// Fetch the selection recorded at `address` directly from MAAS
    pub async fn check_exists(&self, address: &str) -> VerifyResult<BootSourceSelection> {
        let file = self.recorded_state().await?;
        let recorded = file
            .resource(address)
            .ok_or_else(|| VerifyError::NotInState(address.to_string()))?;
        let (boot_source, id) = selection_key(recorded)?;

        let selection = self.api.boot_source_selection(boot_source, id).await?;
        info!("{}: selection {} exists", address, selection.id);
        Ok(selection)
    }

    /// Read every recorded resource twice and require identical results
    pub async fn assert_idempotent(&self) -> VerifyResult<()> {
        let file = self.recorded_state().await?;
        let provider = self.interpreter.provider();

        for recorded in &file.resources {
            let state = recorded.to_state();
            let identifier = state
                .identifier
                .clone()
                .ok_or_else(|| VerifyError::MissingId(recorded.address()))?;
            let first = provider.read(&state.id, &identifier, &state).await?;
            let second = provider.read(&state.id, &identifier, &state).await?;
            if first.attributes != second.attributes {
                return Err(VerifyError::NotIdempotent(recorded.address()));
            }
        }
        Ok(())
    }

    /// Planning `desired` again must produce no effects
    pub async fn assert_no_changes(&self, desired: &[Resource]) -> VerifyResult<()> {
        let mut states = self.recorded_state().await?.to_recorded();
        self.interpreter.refresh(&mut states).await?;
        let plan = self.interpreter.plan(desired, &states)?;
        if plan.is_empty() {
            return Ok(());
        }

        let effects: Vec<String> = plan.effects().iter().map(ToString::to_string).collect();
        Err(VerifyError::PendingChanges(format!(
            "{} ({})",
            plan.summary(),
            effects.join(", ")
        )))
    }

    /// Destroy every recorded resource, returning the state as it was before
    pub async fn destroy(&self) -> VerifyResult<StateFile> {
        let mut file = self.recorded_state().await?;
        let snapshot = file.clone();
        let mut states = file.to_recorded();

        let result = self.interpreter.destroy(&mut states).await;
        report(&result);
        self.save(&mut file, &states).await?;
        result.into_result()?;
        Ok(snapshot)
    }

    /// Check that every selection in `snapshot` is gone from MAAS
    ///
    /// The default selection cannot be deleted; it must instead carry the
    /// values MAAS resets it to.
    pub async fn check_destroyed(&self, snapshot: &StateFile) -> VerifyResult<()> {
        let default_release = self.api.default_distro_series().await?;

        for recorded in snapshot.resources_of_type(boot_source_selection::RESOURCE_TYPE) {
            let (boot_source, id) = selection_key(recorded)?;

            let selection = match self.api.boot_source_selection(boot_source, id).await {
                Ok(selection) => selection,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };

            if selection.os == "ubuntu" && selection.release == default_release {
                check_reset(&selection)?;
            } else if selection.id == id {
                return Err(VerifyError::StillExists {
                    address: recorded.address(),
                    id,
                });
            }
        }
        Ok(())
    }

    /// Apply each step in turn, then destroy and check the cleanup
    ///
    /// Teardown runs even when a step fails; the step's error wins.
    pub async fn run(&self, steps: &[TestStep]) -> VerifyResult<()> {
        let outcome = self.run_steps(steps).await;
        let teardown = self.teardown().await;

        match (outcome, teardown) {
            (Err(e), Err(teardown_err)) => {
                warn!("teardown failed after step error: {}", teardown_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), teardown) => teardown,
        }
    }

    async fn run_steps(&self, steps: &[TestStep]) -> VerifyResult<()> {
        for (i, step) in steps.iter().enumerate() {
            info!("step {}/{}: apply", i + 1, steps.len());
            self.provision(&step.resources).await?;

            let mut failures = Vec::new();
            for address in &step.exists {
                if let Err(e) = self.check_exists(address).await {
                    failures.push(e);
                }
            }
            let file = self.recorded_state().await?;
            failures.extend(attribute_failures(&file, &step.checks));
            aggregate(failures)?;

            self.assert_idempotent().await?;
            self.assert_no_changes(&step.resources).await?;
        }
        Ok(())
    }

    async fn teardown(&self) -> VerifyResult<()> {
        info!("destroy");
        let snapshot = self.destroy().await?;
        self.check_destroyed(&snapshot).await
    }
}

fn report(result: &ApplyResult) {
    for line in outcome_lines(result) {
        info!("{}", line);
    }
    info!(
        "{} applied, {} failed",
        result.success_count, result.failure_count
    );
}

/// One line per successful effect, naming the MAAS ID it left behind
fn outcome_lines(result: &ApplyResult) -> Vec<String> {
    let describe = |verb: &str, state: &maasform_core::resource::State| {
        format!(
            "{} {} (id {})",
            verb,
            state.id,
            state.identifier.as_deref().unwrap_or("?")
        )
    };
    result
        .outcomes
        .iter()
        .flatten()
        .map(|outcome| match outcome {
            EffectOutcome::Created { state } => describe("created", state),
            EffectOutcome::Updated { state } => describe("updated", state),
            EffectOutcome::Replaced { state } => describe("replaced", state),
            EffectOutcome::Deleted { id } => format!("deleted {}", id),
        })
        .collect()
}

fn attribute_failures(file: &StateFile, checks: &[AttributeCheck]) -> Vec<VerifyError> {
    let mut failures = Vec::new();
    for check in checks {
        let Some(recorded) = file.resource(&check.address) else {
            failures.push(VerifyError::NotInState(check.address.clone()));
            continue;
        };
        let actual = flatten(&recorded.attributes).remove(&check.key);
        if actual.as_deref() != Some(check.expected.as_str()) {
            failures.push(VerifyError::AttributeMismatch {
                address: check.address.clone(),
                key: check.key.clone(),
                expected: check.expected.clone(),
                actual,
            });
        }
    }
    failures
}

/// (boot source ID, selection ID) of a recorded selection
fn selection_key(recorded: &ResourceState) -> VerifyResult<(i64, i64)> {
    let address = recorded.address();
    let identifier = recorded
        .identifier
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| VerifyError::MissingId(address.clone()))?;
    let id = identifier
        .parse()
        .map_err(|_| VerifyError::InvalidAttribute {
            address: address.clone(),
            attribute: "id".to_string(),
            value: identifier.to_string(),
        })?;

    let raw = recorded.attribute_string("boot_source").unwrap_or_default();
    let boot_source = raw.parse().map_err(|_| VerifyError::InvalidAttribute {
        address,
        attribute: "boot_source".to_string(),
        value: raw.clone(),
    })?;
    Ok((boot_source, id))
}

fn check_reset(selection: &BootSourceSelection) -> VerifyResult<()> {
    let fields: [(&'static str, &Vec<String>, &str); 3] = [
        ("Arches", &selection.arches, "amd64"),
        ("Subarches", &selection.subarches, "*"),
        ("Labels", &selection.labels, "*"),
    ];
    for (field, actual, expected) in fields {
        if actual.len() != 1 || actual[0] != expected {
            return Err(VerifyError::NotReset {
                id: selection.id,
                field,
                actual: actual.clone(),
            });
        }
    }
    Ok(())
}
