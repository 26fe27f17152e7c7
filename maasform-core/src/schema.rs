//! Attribute schemas
//!
//! Every resource type declares the attributes it accepts. Configuration is
//! checked against the schema before a plan is built, so a bad `arches` list
//! or a missing `os` never reaches MAAS.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Predicate run after the base type matched
pub type Check = fn(&Value) -> Result<(), String>;

#[derive(Debug, Clone)]
pub enum AttributeType {
    String,
    Int,
    Bool,
    List(Box<AttributeType>),
    Map(Box<AttributeType>),
    /// A base type narrowed by an extra check, e.g. positive IDs
    Refined {
        label: &'static str,
        base: Box<AttributeType>,
        check: Check,
    },
}

impl AttributeType {
    /// Check `value` against this type
    ///
    /// Unresolved references always pass; they are checked again once the
    /// referenced resource has been applied and the reference substituted.
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        if matches!(value, Value::ResourceRef(_, _)) {
            return Ok(());
        }

        match self {
            AttributeType::Refined { base, check, .. } => {
                base.validate(value)?;
                check(value).map_err(TypeError::Rejected)
            }
            AttributeType::List(element) => {
                let Value::List(items) = value else {
                    return Err(self.mismatch(value));
                };
                items.iter().enumerate().try_for_each(|(index, item)| {
                    element.validate(item).map_err(|e| TypeError::Element {
                        index: index.to_string(),
                        source: Box::new(e),
                    })
                })
            }
            AttributeType::Map(element) => {
                let Value::Map(entries) = value else {
                    return Err(self.mismatch(value));
                };
                entries.iter().try_for_each(|(key, item)| {
                    element.validate(item).map_err(|e| TypeError::Element {
                        index: key.clone(),
                        source: Box::new(e),
                    })
                })
            }
            AttributeType::String if matches!(value, Value::String(_)) => Ok(()),
            AttributeType::Int if matches!(value, Value::Int(_)) => Ok(()),
            AttributeType::Bool if matches!(value, Value::Bool(_)) => Ok(()),
            _ => Err(self.mismatch(value)),
        }
    }

    fn mismatch(&self, value: &Value) -> TypeError {
        TypeError::Mismatch {
            expected: self.to_string(),
            found: value_kind(value),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => f.write_str("string"),
            AttributeType::Int => f.write_str("integer"),
            AttributeType::Bool => f.write_str("bool"),
            AttributeType::List(element) => write!(f, "list of {}", element),
            AttributeType::Map(element) => write!(f, "map of {}", element),
            AttributeType::Refined { label, .. } => f.write_str(label),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Int(_) => "integer",
        Value::Bool(_) => "bool",
        Value::List(_) => "list",
        Value::Map(_) => "map",
        Value::ResourceRef(_, _) => "reference",
    }
}

/// Schema violation, reported per attribute
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: String,
        found: &'static str,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("[{index}]: {source}")]
    Element {
        index: String,
        source: Box<TypeError>,
    },

    #[error("{name}: {source}")]
    Attribute {
        name: String,
        source: Box<TypeError>,
    },

    #[error("{0} must be set")]
    Missing(String),

    #[error("{0} is assigned by MAAS and cannot be configured")]
    ComputedOnly(String),

    #[error("{0} is not a known attribute")]
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Filled in by the server; may not be set in configuration
    pub computed: bool,
    /// Changing this attribute replaces the resource instead of updating it
    pub force_new: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            force_new: false,
            default: None,
            description: None,
        }
    }

    pub fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub fn computed(self) -> Self {
        Self {
            computed: true,
            ..self
        }
    }

    pub fn force_new(self) -> Self {
        Self {
            force_new: true,
            ..self
        }
    }

    pub fn with_default(self, value: Value) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    fn check(&self, value: &Value) -> Result<(), TypeError> {
        if self.computed && !self.required {
            return Err(TypeError::ComputedOnly(self.name.clone()));
        }
        self.attr_type
            .validate(value)
            .map_err(|e| TypeError::Attribute {
                name: self.name.clone(),
                source: Box::new(e),
            })
    }
}

/// Attributes accepted by one resource type
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Names of attributes whose change forces replacement
    pub fn force_new_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .values()
            .filter(|a| a.force_new)
            .map(|a| a.name.as_str())
    }

    /// Collect every violation in `attributes`, sorted by attribute name
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let missing = self
            .attributes
            .values()
            .filter(|a| a.required && a.default.is_none() && !attributes.contains_key(&a.name))
            .map(|a| (a.name.as_str(), TypeError::Missing(a.name.clone())));

        let invalid = attributes.iter().filter_map(|(name, value)| {
            let result = match self.attributes.get(name) {
                Some(attribute) => attribute.check(value),
                None => Err(TypeError::Unknown(name.clone())),
            };
            result.err().map(|e| (name.as_str(), e))
        });

        let mut errors: Vec<(&str, TypeError)> = missing.chain(invalid).collect();
        if errors.is_empty() {
            return Ok(());
        }
        errors.sort_by(|a, b| a.0.cmp(b.0));
        Err(errors.into_iter().map(|(_, e)| e).collect())
    }

    /// Fill in declared defaults for attributes missing from `attributes`
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        for attribute in self.attributes.values() {
            if let Some(default) = &attribute.default {
                attributes
                    .entry(attribute.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }
}

/// Attribute types shared by the MAAS resources
pub mod types {
    use super::{AttributeType, Value};

    /// Server-assigned IDs start at 1
    pub fn positive_int() -> AttributeType {
        AttributeType::Refined {
            label: "positive integer",
            base: Box::new(AttributeType::Int),
            check: |value| match value {
                Value::Int(n) if *n < 1 => Err(format!("{} is not a valid ID", n)),
                _ => Ok(()),
            },
        }
    }

    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    pub fn non_empty_string_list() -> AttributeType {
        AttributeType::Refined {
            label: "non-empty list of string",
            base: Box::new(string_list()),
            check: |value| match value {
                Value::List(items) if items.is_empty() => {
                    Err("at least one entry is required".to_string())
                }
                _ => Ok(()),
            },
        }
    }
}
