//! Reference resolution and dependency ordering
//!
//! Resources refer to each other with `Value::ResourceRef(address, attribute)`.
//! Before a resource is handed to a Provider every reference must be replaced
//! by the concrete value recorded for the referenced resource.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::resource::{Resource, State, Value};

/// Address -> attributes known for that resource
pub type Bindings = HashMap<String, HashMap<String, Value>>;

/// Build bindings from the states the engine currently holds
pub fn bindings_from_states<'a>(states: impl IntoIterator<Item = &'a State>) -> Bindings {
    states
        .into_iter()
        .filter(|s| s.exists)
        .map(|s| (s.id.address(), s.attributes.clone()))
        .collect()
}

/// Resolve a single value against the bindings
///
/// References that cannot be resolved yet are kept as-is.
pub fn resolve_value(value: &Value, bindings: &Bindings) -> Value {
    match value {
        Value::ResourceRef(address, attr_name) => {
            if let Some(attrs) = bindings.get(address)
                && let Some(attr_value) = attrs.get(attr_name)
            {
                return resolve_value(attr_value, bindings);
            }
            value.clone()
        }
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|v| resolve_value(v, bindings))
                .collect(),
        ),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, bindings)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Copy of `resource` with every resolvable reference replaced
pub fn resolve_resource(resource: &Resource, bindings: &Bindings) -> Resource {
    Resource {
        id: resource.id.clone(),
        attributes: resource
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), resolve_value(v, bindings)))
            .collect(),
    }
}

/// Addresses that a resource depends on
pub fn dependencies(resource: &Resource) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

fn collect_dependencies(value: &Value, deps: &mut BTreeSet<String>) {
    match value {
        Value::ResourceRef(address, _) => {
            deps.insert(address.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_dependencies(item, deps);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_dependencies(v, deps);
            }
        }
        _ => {}
    }
}

/// Order node indices so that every node comes after the nodes it depends on
///
/// Cycles are broken at the first revisited node; dependencies on unknown
/// addresses are ignored.
fn topological_order(nodes: &[(String, BTreeSet<String>)]) -> Vec<usize> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (address, _))| (address.as_str(), i))
        .collect();

    let mut sorted = Vec::with_capacity(nodes.len());
    let mut visited: HashSet<usize> = HashSet::new();
    let mut visiting: HashSet<usize> = HashSet::new();

    fn visit(
        i: usize,
        nodes: &[(String, BTreeSet<String>)],
        index: &HashMap<&str, usize>,
        visited: &mut HashSet<usize>,
        visiting: &mut HashSet<usize>,
        sorted: &mut Vec<usize>,
    ) {
        if visited.contains(&i) || !visiting.insert(i) {
            return;
        }
        for dep in &nodes[i].1 {
            if let Some(&j) = index.get(dep.as_str()) {
                visit(j, nodes, index, visited, visiting, sorted);
            }
        }
        visiting.remove(&i);
        visited.insert(i);
        sorted.push(i);
    }

    for i in 0..nodes.len() {
        visit(i, nodes, &index, &mut visited, &mut visiting, &mut sorted);
    }
    sorted
}

/// Sort resources topologically based on their references
pub fn sort_resources_by_dependencies(resources: &[Resource]) -> Vec<Resource> {
    let nodes: Vec<_> = resources
        .iter()
        .map(|r| (r.id.address(), dependencies(r)))
        .collect();
    topological_order(&nodes)
        .into_iter()
        .map(|i| resources[i].clone())
        .collect()
}

/// Order recorded states for destruction: dependents first, then dependencies
pub fn destroy_order(states: &[State]) -> Vec<State> {
    let nodes: Vec<_> = states
        .iter()
        .map(|s| (s.id.address(), s.dependencies.clone()))
        .collect();
    let mut order: Vec<State> = topological_order(&nodes)
        .into_iter()
        .map(|i| states[i].clone())
        .collect();
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;

    fn boot_source(name: &str) -> Resource {
        Resource::new("maas_boot_source", name)
            .with_attribute("url", Value::from("http://mirror/"))
    }

    fn selection(name: &str, parent: &str) -> Resource {
        Resource::new("maas_boot_source_selection", name).with_attribute(
            "boot_source",
            Value::ResourceRef(format!("maas_boot_source.{}", parent), "id".into()),
        )
    }

    #[test]
    fn dependencies_come_first() {
        let resources = vec![selection("sel", "src"), boot_source("src")];
        let sorted = sort_resources_by_dependencies(&resources);
        assert_eq!(sorted[0].id.name, "src");
        assert_eq!(sorted[1].id.name, "sel");
    }

    #[test]
    fn cycles_do_not_loop_forever() {
        let a = Resource::new("t", "a")
            .with_attribute("x", Value::ResourceRef("t.b".into(), "id".into()));
        let b = Resource::new("t", "b")
            .with_attribute("x", Value::ResourceRef("t.a".into(), "id".into()));
        assert_eq!(sort_resources_by_dependencies(&[a, b]).len(), 2);
    }

    #[test]
    fn resolve_reference_from_bindings() {
        let mut bindings = Bindings::new();
        bindings.insert(
            "maas_boot_source.src".into(),
            HashMap::from([("id".to_string(), Value::Int(4))]),
        );
        let resolved = resolve_resource(&selection("sel", "src"), &bindings);
        assert_eq!(resolved.attributes["boot_source"], Value::Int(4));

        let unresolved = resolve_resource(&selection("sel", "other"), &bindings);
        assert!(unresolved.attributes["boot_source"].has_unresolved_ref());
    }

    #[test]
    fn destroy_order_puts_dependents_first() {
        let src = State::existing(ResourceId::new("maas_boot_source", "src"), HashMap::new());
        let sel = State::existing(
            ResourceId::new("maas_boot_source_selection", "sel"),
            HashMap::new(),
        )
        .with_dependencies(["maas_boot_source.src"]);
        let order = destroy_order(&[src, sel]);
        assert_eq!(order[0].id.name, "sel");
        assert_eq!(order[1].id.name, "src");
    }
}
