//! Desired resources against recorded state

use std::collections::{HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::reference::{bindings_from_states, destroy_order, resolve_resource};
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    Create(Resource),
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute changed
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    NoChange(ResourceId),
}

impl Diff {
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = changed_keys(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let force_new: HashSet<&str> = schema
        .map(|s| s.force_new_attributes().collect())
        .unwrap_or_default();

    if changed.iter().any(|c| force_new.contains(c.as_str())) {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Sorted keys whose desired value differs from the recorded one
///
/// Keys absent from `desired` are never compared, so server-applied defaults
/// such as `labels = ["*"]` do not count as drift.
fn changed_keys(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed: Vec<String> = desired
        .iter()
        .filter(|(key, value)| current.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect();
    changed.sort();
    changed
}

/// `desired` must already be sorted by dependencies. Recorded resources that
/// are no longer declared are deleted first, dependents before dependencies.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    let declared: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    let orphans: Vec<State> = current_states
        .values()
        .filter(|s| s.exists && !declared.contains(&s.id))
        .cloned()
        .collect();
    for state in destroy_order(&orphans) {
        plan.add(Effect::Delete(state));
    }

    let bindings = bindings_from_states(current_states.values());

    for resource in desired {
        let current = match current_states.get(&resource.id) {
            Some(state) => state.clone(),
            None => State::not_found(resource.id.clone()),
        };

        let resolved = resolve_resource(resource, &bindings);
        let schema = schemas.get(&resource.id.resource_type);

        match diff(&resolved, &current, schema) {
            Diff::Create(_) => plan.add(Effect::Create(resource.clone())),
            Diff::Update {
                id,
                from,
                changed_attributes,
                ..
            } => plan.add(Effect::Update {
                id,
                from,
                to: resource.clone(),
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                changed_attributes,
                ..
            } => plan.add(Effect::Replace {
                id,
                from,
                to: resource.clone(),
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    plan
}

/// Plan deleting every recorded resource
pub fn destroy_plan(current_states: &HashMap<ResourceId, State>) -> Plan {
    let existing: Vec<State> = current_states
        .values()
        .filter(|s| s.exists)
        .cloned()
        .collect();

    let mut plan = Plan::new();
    for state in destroy_order(&existing) {
        plan.add(Effect::Delete(state));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    fn selection_schema() -> ResourceSchema {
        ResourceSchema::new("maas_boot_source_selection")
            .attribute(AttributeSchema::new("boot_source", AttributeType::Int).force_new())
            .attribute(AttributeSchema::new("os", AttributeType::String))
    }

    fn recorded(name: &str, attrs: &[(&str, Value)]) -> State {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        State::existing(ResourceId::new("maas_boot_source_selection", name), attrs)
            .with_identifier("1")
    }

    #[test]
    fn missing_resource_is_created() {
        let desired = Resource::new("maas_boot_source", "test");
        let current = State::not_found(ResourceId::new("maas_boot_source", "test"));

        assert!(matches!(diff(&desired, &current, None), Diff::Create(_)));
    }

    #[test]
    fn diff_ignores_server_defaults_not_in_config() {
        let desired = Resource::new("maas_boot_source_selection", "test")
            .with_attribute("os", Value::from("ubuntu"));
        let current = recorded(
            "test",
            &[
                ("os", Value::from("ubuntu")),
                ("labels", Value::string_list(["*"])),
            ],
        );

        assert!(!diff(&desired, &current, None).is_change());
    }

    #[test]
    fn changed_os_is_an_update() {
        let desired = Resource::new("maas_boot_source_selection", "test")
            .with_attribute("os", Value::from("centos"));
        let current = recorded("test", &[("os", Value::from("ubuntu"))]);

        match diff(&desired, &current, Some(&selection_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["os".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_on_force_new_change() {
        let desired = Resource::new("maas_boot_source_selection", "test")
            .with_attribute("boot_source", Value::Int(2));
        let current = recorded("test", &[("boot_source", Value::Int(1))]);

        assert!(matches!(
            diff(&desired, &current, Some(&selection_schema())),
            Diff::Replace { .. }
        ));
    }

    #[test]
    fn plan_resolves_references_before_comparing() {
        let src_id = ResourceId::new("maas_boot_source", "src");
        let desired = vec![
            Resource::new("maas_boot_source_selection", "sel")
                .with_attribute("boot_source", Value::reference(&src_id, "id")),
        ];

        let mut current = HashMap::new();
        current.insert(
            src_id.clone(),
            State::existing(src_id.clone(), HashMap::from([("id".into(), Value::Int(1))])),
        );
        let sel = recorded("sel", &[("boot_source", Value::Int(1))]);
        current.insert(sel.id.clone(), sel);

        let schemas = HashMap::from([(
            "maas_boot_source_selection".to_string(),
            selection_schema(),
        )]);
        let plan = create_plan(&desired, &current, &schemas);

        // The boot source is no longer declared; the selection is unchanged
        assert_eq!(plan.effects().len(), 1);
        assert!(matches!(&plan.effects()[0], Effect::Delete(s) if s.id == src_id));
    }

    #[test]
    fn destroy_plan_deletes_dependents_first() {
        let src_id = ResourceId::new("maas_boot_source", "src");
        let sel = recorded("sel", &[]).with_dependencies([src_id.address()]);
        let mut current = HashMap::new();
        current.insert(src_id.clone(), State::existing(src_id.clone(), HashMap::new()));
        current.insert(sel.id.clone(), sel);

        let plan = destroy_plan(&current);
        let order: Vec<_> = plan.effects().iter().map(|e| e.resource_id().name.clone()).collect();
        assert_eq!(order, vec!["sel", "src"]);
    }
}
