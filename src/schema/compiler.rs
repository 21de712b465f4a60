//! Schema compiler
//!
//! Turns a [`SchemaDef`] into the normalized per-attribute tables the record
//! engine runs on. Compilation is pure and never fails.

use std::collections::BTreeSet;

use serde_json::Value;

use super::types::{Attrs, SchemaDef};
use crate::adapter::adapt;
use crate::tasks::TaskGroup;

/// Immutable, compiled description of a record type's attributes
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    id_key: String,
    keys: BTreeSet<String>,
    defaults: Attrs,
    validators: TaskGroup<bool>,
    transformers: TaskGroup<Value>,
}

/// Compile a definition.
///
/// The identity attribute is always present in the result. When the
/// definition gives it no default, its default is `null`.
pub fn compile(def: SchemaDef) -> CompiledSchema {
    let SchemaDef {
        id_key,
        mut attributes,
    } = def;

    attributes.entry(id_key.clone()).or_default();

    let mut keys = BTreeSet::new();
    let mut defaults = Attrs::new();
    let mut validators = TaskGroup::new();
    let mut transformers = TaskGroup::new();

    for (key, attribute) in attributes {
        if let Some(default) = attribute.default {
            defaults.insert(key.clone(), default);
        } else if key == id_key {
            defaults.insert(key.clone(), Value::Null);
        }

        validators.insert(
            key.clone(),
            attribute.validators.into_iter().map(adapt).collect(),
        );
        transformers.insert(
            key.clone(),
            attribute.transformers.into_iter().map(adapt).collect(),
        );

        keys.insert(key);
    }

    CompiledSchema {
        id_key,
        keys,
        defaults,
        validators,
        transformers,
    }
}

impl CompiledSchema {
    /// Identity attribute name
    pub fn id_key(&self) -> &str {
        &self.id_key
    }

    /// Declared attribute names, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Returns true if `key` is declared
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Default values by attribute
    pub fn defaults(&self) -> &Attrs {
        &self.defaults
    }

    /// Validator tasks by attribute
    pub fn validators(&self) -> &TaskGroup<bool> {
        &self.validators
    }

    /// Transformer tasks by attribute
    pub fn transformers(&self) -> &TaskGroup<Value> {
        &self.transformers
    }

    /// Drop every attribute the schema does not declare
    pub fn restrict(&self, attrs: Attrs) -> Attrs {
        attrs
            .into_iter()
            .filter(|(key, _)| self.contains(key))
            .collect()
    }

    /// Defaults overridden by the declared subset of `attrs`
    pub fn with_defaults(&self, attrs: Attrs) -> Attrs {
        let mut merged = self.defaults.clone();
        merged.extend(self.restrict(attrs));
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::TaskFn;
    use crate::schema::AttributeDef;
    use serde_json::json;

    fn sample() -> SchemaDef {
        SchemaDef::new()
            .attribute(
                "name",
                AttributeDef::new()
                    .default_value(json!("anon"))
                    .validator(TaskFn::sync(|v: &Value| v.is_string())),
            )
            .attribute(
                "tags",
                AttributeDef::new().validators([
                    TaskFn::sync(|v: &Value| v.is_array()),
                    TaskFn::sync(|_: &Value| true),
                ]),
            )
            .attribute(
                "slug",
                AttributeDef::new().transformer(TaskFn::sync(|v: &Value| v.clone())),
            )
    }

    #[test]
    fn test_identity_key_added() {
        let schema = compile(sample());
        assert!(schema.contains("id"));
        assert_eq!(schema.defaults()["id"], Value::Null);
        assert!(schema.validators().tasks_for("id").is_empty());
        assert!(schema.transformers().tasks_for("id").is_empty());
    }

    #[test]
    fn test_custom_identity_key() {
        let schema = compile(SchemaDef::new().id_key("uuid"));
        assert_eq!(schema.id_key(), "uuid");
        assert_eq!(schema.keys().collect::<Vec<_>>(), vec!["uuid"]);
    }

    #[test]
    fn test_declared_identity_default_kept() {
        let def = SchemaDef::new().attribute("id", AttributeDef::new().default_value(json!("")));
        let schema = compile(def);
        assert_eq!(schema.defaults()["id"], json!(""));
    }

    #[test]
    fn test_tasks_grouped_by_key() {
        let schema = compile(sample());
        assert_eq!(schema.validators().tasks_for("name").len(), 1);
        assert_eq!(schema.validators().tasks_for("tags").len(), 2);
        assert_eq!(schema.transformers().tasks_for("slug").len(), 1);
        assert_eq!(schema.validators().len(), 2);
    }

    #[test]
    fn test_defaults_only_for_declared_values() {
        let schema = compile(sample());
        assert_eq!(schema.defaults().len(), 2);
        assert_eq!(schema.defaults()["name"], json!("anon"));
        assert!(!schema.defaults().contains_key("tags"));
    }

    #[test]
    fn test_with_defaults_drops_unknown_keys() {
        let schema = compile(sample());
        let supplied = json!({"name": "ada", "unknown": 1}).as_object().cloned().unwrap();
        let merged = schema.with_defaults(supplied);

        assert_eq!(merged["name"], json!("ada"));
        assert!(!merged.contains_key("unknown"));
        assert!(merged.contains_key("id"));
    }
}
