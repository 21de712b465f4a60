//! Schema loader for declarative JSON definitions
//!
//! A definition file describes defaults and library validators:
//!
//! ```json
//! {
//!   "idKey": "id",
//!   "attributes": {
//!     "email": { "default": "", "validators": ["isString", "isFuzzyEmail"] },
//!     "name":  { "validators": { "name": "minmax", "args": [1, 40] } }
//!   }
//! }
//! ```
//!
//! Transformers are code and are attached to the loaded [`SchemaDef`] afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::errors::{SchemaError, SchemaResult};
use super::types::{AttributeDef, SchemaDef};
use crate::observability::{Event, Logger};
use crate::validators;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchemaDoc {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id_key: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttributeDoc {
    /// Absent means no default; explicit `null` is a default of `null`
    #[serde(default, deserialize_with = "present")]
    default: Option<Value>,
    #[serde(default)]
    validators: Option<OneOrMany<ValidatorDoc>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ValidatorDoc {
    Name(String),
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Parse one JSON definition
pub fn parse_definition(origin: &str, json: &str) -> SchemaResult<SchemaDef> {
    parse_document(origin, json).map(|(_, def)| def)
}

fn parse_document(origin: &str, json: &str) -> SchemaResult<(Option<String>, SchemaDef)> {
    let doc: SchemaDoc =
        serde_json::from_str(json).map_err(|e| SchemaError::malformed(origin, e))?;

    let mut def = SchemaDef::new();
    if let Some(id_key) = doc.id_key {
        if id_key.is_empty() {
            return Err(SchemaError::malformed(origin, "idKey must not be empty"));
        }
        def = def.id_key(id_key);
    }

    for (key, attribute) in doc.attributes {
        let mut built = AttributeDef::new();
        built.default = attribute.default;

        for entry in attribute.validators.map(OneOrMany::into_vec).unwrap_or_default() {
            let (name, args) = match entry {
                ValidatorDoc::Name(name) => (name, Vec::new()),
                ValidatorDoc::Call { name, args } => (name, args),
            };
            if !validators::NAMES.contains(&name.as_str()) {
                return Err(SchemaError::unknown_validator(&key, name));
            }
            let validator = validators::by_name(&name, &args)
                .map_err(|reason| SchemaError::invalid_arguments(&key, reason))?;
            built = built.validator(validator);
        }

        def = def.attribute(key, built);
    }

    Ok((doc.name, def))
}

/// Registry of named schema definitions read from JSON.
#[derive(Debug, Default)]
pub struct SchemaLoader {
    schemas: BTreeMap<String, SchemaDef>,
}

impl SchemaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` file in `dir`.
    ///
    /// A file registers under its `name` field, or its file stem when absent.
    pub fn load_dir(&mut self, dir: &Path) -> SchemaResult<usize> {
        let entries =
            fs::read_dir(dir).map_err(|e| SchemaError::io(dir.display().to_string(), e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SchemaError::io(dir.display().to_string(), e))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_file(path)?;
        }
        Ok(paths.len())
    }

    /// Loads and registers one definition file, returning its registered name.
    pub fn load_file(&mut self, path: &Path) -> SchemaResult<String> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| SchemaError::io(&origin, e))?;

        let (name, def) = parse_document(&origin, &content)?;
        let name = match name {
            Some(name) => name,
            None => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .ok_or_else(|| SchemaError::malformed(&origin, "cannot derive schema name"))?,
        };

        let attributes = def.attributes.len().to_string();
        self.register(name.clone(), def)?;
        Logger::event(
            Event::SchemaLoaded,
            &[
                ("name", name.as_str()),
                ("attributes", attributes.as_str()),
                ("path", origin.as_str()),
            ],
        );
        Ok(name)
    }

    /// Registers a definition directly. Names are unique.
    pub fn register(&mut self, name: impl Into<String>, def: SchemaDef) -> SchemaResult<()> {
        let name = name.into();
        if self.schemas.contains_key(&name) {
            return Err(SchemaError::duplicate(name));
        }
        self.schemas.insert(name, def);
        Ok(())
    }

    /// Gets a definition by name.
    pub fn get(&self, name: &str) -> Option<&SchemaDef> {
        self.schemas.get(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Returns the number of registered definitions.
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaErrorCode;
    use serde_json::json;

    #[test]
    fn test_parse_single_and_list_validators() {
        let def = parse_definition(
            "inline",
            r#"{
                "attributes": {
                    "email": { "default": "", "validators": ["isString", "isFuzzyEmail"] },
                    "age": { "validators": { "name": "min", "args": [18] } },
                    "nick": { "validators": "isString" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(def.id_key, "id");
        assert_eq!(def.attributes["email"].validators.len(), 2);
        assert_eq!(def.attributes["email"].default, Some(json!("")));
        assert_eq!(def.attributes["age"].validators.len(), 1);
        assert_eq!(def.attributes["nick"].validators.len(), 1);
        assert_eq!(def.attributes["age"].default, None);
    }

    #[test]
    fn test_explicit_null_default_is_kept() {
        let def = parse_definition("inline", r#"{"attributes": {"x": {"default": null}}}"#).unwrap();
        assert_eq!(def.attributes["x"].default, Some(Value::Null));
    }

    #[test]
    fn test_custom_id_key() {
        let def = parse_definition("inline", r#"{"idKey": "uuid"}"#).unwrap();
        assert_eq!(def.id_key, "uuid");
    }

    #[test]
    fn test_unknown_validator_rejected() {
        let err = parse_definition(
            "inline",
            r#"{"attributes": {"x": {"validators": "isPalindrome"}}}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::UnknownValidator);
        assert_eq!(err.attribute(), Some("x"));
    }

    #[test]
    fn test_bad_arguments_rejected() {
        let err = parse_definition(
            "inline",
            r#"{"attributes": {"x": {"validators": {"name": "max", "args": ["ten"]}}}}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::InvalidArguments);
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = parse_definition("inline", r#"{"attributes": ["#).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::Malformed);

        let err = parse_definition("inline", r#"{"idKey": ""}"#).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::Malformed);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut loader = SchemaLoader::new();
        loader.register("user", SchemaDef::new()).unwrap();
        let err = loader.register("user", SchemaDef::new()).unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::Duplicate);
        assert_eq!(loader.schema_count(), 1);
    }
}
