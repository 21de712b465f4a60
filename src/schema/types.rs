//! Schema definition types
//!
//! A definition is what callers write: per-attribute defaults, validators and
//! transformers, plus the name of the identity attribute. It is compiled once
//! into a [`CompiledSchema`](super::CompiledSchema).

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::adapter::TaskFn;

/// Attribute name to value
pub type Attrs = Map<String, Value>;

/// Validator body: resolves `true` when the value is acceptable
pub type Validator = TaskFn<bool>;

/// Transformer body: resolves the replacement value
pub type Transformer = TaskFn<Value>;

/// Identity attribute used when a definition does not name one
pub const DEFAULT_ID_KEY: &str = "id";

/// Definition of a single attribute
#[derive(Debug, Clone, Default)]
pub struct AttributeDef {
    /// Value used when construction does not supply one
    pub default: Option<Value>,
    /// Checks run in declared order
    pub validators: Vec<Validator>,
    /// Rewrites run in declared order after every validator passed
    pub transformers: Vec<Transformer>,
}

impl AttributeDef {
    /// An attribute with no default and no tasks
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default value
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Add one validator
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Add several validators
    pub fn validators(mut self, validators: impl IntoIterator<Item = Validator>) -> Self {
        self.validators.extend(validators);
        self
    }

    /// Add one transformer
    pub fn transformer(mut self, transformer: Transformer) -> Self {
        self.transformers.push(transformer);
        self
    }

    /// Add several transformers
    pub fn transformers(mut self, transformers: impl IntoIterator<Item = Transformer>) -> Self {
        self.transformers.extend(transformers);
        self
    }
}

/// Raw schema definition
#[derive(Debug, Clone)]
pub struct SchemaDef {
    /// Identity attribute name
    pub id_key: String,
    /// Attribute definitions by name
    pub attributes: BTreeMap<String, AttributeDef>,
}

impl Default for SchemaDef {
    fn default() -> Self {
        Self {
            id_key: DEFAULT_ID_KEY.to_string(),
            attributes: BTreeMap::new(),
        }
    }
}

impl SchemaDef {
    /// Empty definition keyed on `id`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different identity attribute
    pub fn id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    /// Declare or replace an attribute
    pub fn attribute(mut self, name: impl Into<String>, def: AttributeDef) -> Self {
        self.attributes.insert(name.into(), def);
        self
    }

    /// Mutable access to an attribute, declaring it if absent
    pub fn attribute_mut(&mut self, name: &str) -> &mut AttributeDef {
        self.attributes.entry(name.to_string()).or_default()
    }

    /// Append a transformer to an attribute, declaring it if absent
    pub fn with_transformer(mut self, name: &str, transformer: Transformer) -> Self {
        self.attribute_mut(name).transformers.push(transformer);
        self
    }

    /// Append a validator to an attribute, declaring it if absent
    pub fn with_validator(mut self, name: &str, validator: Validator) -> Self {
        self.attribute_mut(name).validators.push(validator);
        self
    }

    /// Returns true if the attribute is declared
    pub fn declares(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_builder() {
        let def = AttributeDef::new()
            .default_value(json!("anon"))
            .validator(TaskFn::sync(|v: &Value| v.is_string()))
            .transformers([TaskFn::sync(|v: &Value| v.clone())]);

        assert_eq!(def.default, Some(json!("anon")));
        assert_eq!(def.validators.len(), 1);
        assert_eq!(def.transformers.len(), 1);
    }

    #[test]
    fn test_schema_defaults_to_id_key() {
        let def = SchemaDef::new();
        assert_eq!(def.id_key, "id");
        assert!(def.attributes.is_empty());
    }

    #[test]
    fn test_with_transformer_declares_attribute() {
        let def = SchemaDef::new().with_transformer("m", TaskFn::sync(|v: &Value| v.clone()));
        assert!(def.declares("m"));
        assert_eq!(def.attributes["m"].transformers.len(), 1);
    }

    #[test]
    fn test_with_validator_appends_to_declared_attribute() {
        let def = SchemaDef::new()
            .attribute("n", AttributeDef::new().default_value(json!(3)))
            .with_validator("n", TaskFn::sync(|v: &Value| v.is_number()))
            .with_validator("fresh", TaskFn::sync(|v: &Value| v.is_string()));

        assert_eq!(def.attributes["n"].validators.len(), 1);
        assert_eq!(def.attributes["n"].default, Some(json!(3)));
        assert!(def.declares("fresh"));
        assert_eq!(def.attributes["fresh"].validators.len(), 1);
    }
}
