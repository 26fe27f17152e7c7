//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter refreshes recorded state, executes the Effects contained
//! in a Plan in order and writes each outcome back into the recorded state.
//! This is where side effects actually occur.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::differ::{create_plan, destroy_plan};
use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::reference::{
    Bindings, bindings_from_states, dependencies, resolve_resource, sort_resources_by_dependencies,
};
use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// The engine's view of every managed resource, keyed by resource ID
pub type RecordedStates = HashMap<ResourceId, State>;

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete followed by create succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
}

/// Result of executing the entire Plan
#[derive(Debug, Default)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    /// Collapse into the first failure, if any
    pub fn into_result(self) -> ProviderResult<()> {
        match self.outcomes.into_iter().find_map(Result::err) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn schemas(&self) -> HashMap<String, ResourceSchema> {
        self.provider
            .resource_types()
            .into_iter()
            .map(|t| (t.name().to_string(), t.schema()))
            .collect()
    }

    /// Validate desired resources against the provider's schemas
    pub fn validate(&self, desired: &[Resource]) -> ProviderResult<()> {
        let schemas = self.schemas();
        let mut messages = Vec::new();

        for resource in desired {
            match schemas.get(&resource.id.resource_type) {
                Some(schema) => {
                    if let Err(errors) = schema.validate(&resource.attributes) {
                        for error in errors {
                            messages.push(format!("{}: {}", resource.id, error));
                        }
                    }
                }
                None => messages.push(format!(
                    "{}: unsupported resource type for provider {}",
                    resource.id,
                    self.provider.name()
                )),
            }
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::invalid_config(messages.join("\n")))
        }
    }

    /// Re-read every recorded resource from the remote API
    ///
    /// Resources whose read fails with `NotFound` are removed from the
    /// recorded state; their IDs are returned. Any other failure aborts.
    pub async fn refresh(&self, states: &mut RecordedStates) -> ProviderResult<Vec<ResourceId>> {
        let mut pruned = Vec::new();
        let mut ids: Vec<ResourceId> = states.keys().cloned().collect();
        ids.sort();

        for id in ids {
            let Some(recorded) = states.get(&id).cloned() else {
                continue;
            };
            let Some(identifier) = recorded.identifier.clone() else {
                states.remove(&id);
                pruned.push(id);
                continue;
            };

            match self.provider.read(&id, &identifier, &recorded).await {
                Ok(state) => {
                    debug!("refreshed {} ({})", id, identifier);
                    states.insert(id, state.with_dependencies(recorded.dependencies));
                }
                Err(e) if e.is_not_found() => {
                    warn!("{} ({}) no longer exists, removing from state", id, identifier);
                    states.remove(&id);
                    pruned.push(id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(pruned)
    }

    /// Validate the desired resources and compute the Effects needed to reach them
    pub fn plan(&self, desired: &[Resource], states: &RecordedStates) -> ProviderResult<Plan> {
        self.validate(desired)?;
        let sorted = sort_resources_by_dependencies(desired);
        Ok(create_plan(&sorted, states, &self.schemas()))
    }

    /// Execute a Plan, stopping at the first failed Effect
    pub async fn apply(&self, plan: &Plan, states: &mut RecordedStates) -> ApplyResult {
        let mut result = ApplyResult::default();

        for effect in plan.effects() {
            let outcome = self.execute_effect(effect, states).await;
            let failed = outcome.is_err();

            match &outcome {
                Ok(_) => {
                    info!("{}", effect);
                    result.success_count += 1;
                }
                Err(e) => {
                    warn!("{} failed: {}", effect, e);
                    result.failure_count += 1;
                }
            }

            result.outcomes.push(outcome);
            if failed {
                break;
            }
        }

        result
    }

    /// Delete every recorded resource, dependents first
    pub async fn destroy(&self, states: &mut RecordedStates) -> ApplyResult {
        let plan = destroy_plan(states);
        self.apply(&plan, states).await
    }

    /// Execute a single Effect and record its outcome
    async fn execute_effect(
        &self,
        effect: &Effect,
        states: &mut RecordedStates,
    ) -> ProviderResult<EffectOutcome> {
        let bindings = bindings_from_states(states.values());

        match effect {
            Effect::Create(resource) => {
                let resolved = resolve_for_provider(resource, &bindings)?;
                let state = self.provider.create(&resolved).await?;
                let state = state.with_dependencies(dependencies(resource));
                states.insert(resource.id.clone(), state.clone());
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to, .. } => {
                let resolved = resolve_for_provider(to, &bindings)?;
                let identifier = recorded_identifier(from)?;
                let state = self
                    .provider
                    .update(id, identifier, from, &resolved)
                    .await?;
                let state = state.with_dependencies(dependencies(to));
                states.insert(id.clone(), state.clone());
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { id, from, to, .. } => {
                let identifier = recorded_identifier(from)?;
                self.provider.delete(id, identifier, from).await?;
                states.remove(id);

                let bindings = bindings_from_states(states.values());
                let resolved = resolve_for_provider(to, &bindings)?;
                let state = self.provider.create(&resolved).await?;
                let state = state.with_dependencies(dependencies(to));
                states.insert(id.clone(), state.clone());
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete(recorded) => {
                let identifier = recorded_identifier(recorded)?;
                self.provider
                    .delete(&recorded.id, identifier, recorded)
                    .await?;
                states.remove(&recorded.id);
                Ok(EffectOutcome::Deleted {
                    id: recorded.id.clone(),
                })
            }
        }
    }
}

fn resolve_for_provider(resource: &Resource, bindings: &Bindings) -> ProviderResult<Resource> {
    let resolved = resolve_resource(resource, bindings);
    let mut unresolved: Vec<&String> = resolved
        .attributes
        .iter()
        .filter(|(_, v)| v.has_unresolved_ref())
        .map(|(k, _)| k)
        .collect();
    if unresolved.is_empty() {
        return Ok(resolved);
    }
    unresolved.sort();
    Err(ProviderError::invalid_config(format!(
        "unresolved reference in attribute(s): {}",
        unresolved
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ))
    .for_resource(resource.id.clone()))
}

fn recorded_identifier(state: &State) -> ProviderResult<&str> {
    state.identifier.as_deref().ok_or_else(|| {
        ProviderError::invalid_config("resource id not set").for_resource(state.id.clone())
    })
}
