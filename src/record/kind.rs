//! Record kinds
//!
//! A kind bundles everything records of one type share: the schema, the
//! persistence collaborator, and two behaviour tables. Instance methods take
//! the record they are called on; statics take the kind. Kinds derive from
//! each other by composition: [`Kind::extend`] starts a builder seeded with the
//! parent's definition and tables, and anything the child declares replaces
//! the parent's entry of the same name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::engine::{ConstructOptions, Record};
use super::persistence::{NoPersistence, Persistence};
use crate::adapter::{cause, BoxError, Cause};
use crate::error::{RecordError, RecordResult};
use crate::schema::{compile, AttributeDef, Attrs, CompiledSchema, SchemaDef};

/// Instance behaviour, called with the record it runs on
pub type Method = Arc<dyn Fn(&Record, Value) -> Result<Value, Cause> + Send + Sync>;

/// Kind-level behaviour
pub type StaticFn = Arc<dyn Fn(&Kind, Value) -> Result<Value, Cause> + Send + Sync>;

struct KindInner {
    name: String,
    definition: SchemaDef,
    schema: CompiledSchema,
    persistence: Arc<dyn Persistence>,
    methods: BTreeMap<String, Method>,
    statics: BTreeMap<String, StaticFn>,
}

/// Shared description of one record type
#[derive(Clone)]
pub struct Kind {
    inner: Arc<KindInner>,
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kind")
            .field("name", &self.inner.name)
            .field("schema", &self.inner.schema)
            .field("methods", &self.inner.methods.keys().collect::<Vec<_>>())
            .field("statics", &self.inner.statics.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Kind {
    /// Start defining a kind from a schema definition
    pub fn define(name: impl Into<String>, definition: SchemaDef) -> KindBuilder {
        KindBuilder {
            name: name.into(),
            definition,
            persistence: None,
            methods: BTreeMap::new(),
            statics: BTreeMap::new(),
        }
    }

    /// Start defining a child kind that inherits this one's definition,
    /// persistence and behaviour tables
    pub fn extend(&self, name: impl Into<String>) -> KindBuilder {
        KindBuilder {
            name: name.into(),
            definition: self.inner.definition.clone(),
            persistence: Some(Arc::clone(&self.inner.persistence)),
            methods: self.inner.methods.clone(),
            statics: self.inner.statics.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Definition the kind was built from
    pub fn definition(&self) -> &SchemaDef {
        &self.inner.definition
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.inner.schema
    }

    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.inner.persistence
    }

    /// Looks up an instance method
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.inner.methods.get(name)
    }

    /// Names of the instance methods, sorted
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.inner.methods.keys().map(String::as_str)
    }

    /// Names of the user statics, sorted
    pub fn static_names(&self) -> impl Iterator<Item = &str> {
        self.inner.statics.keys().map(String::as_str)
    }

    /// Call a user static by name
    pub fn call_static(&self, name: &str, arg: Value) -> RecordResult<Value> {
        let f = self
            .inner
            .statics
            .get(name)
            .ok_or_else(|| RecordError::UnknownMethod(name.to_string()))?;
        f(self, arg).map_err(|cause| RecordError::Method {
            name: name.to_string(),
            cause,
        })
    }

    /// Construct a record by running the pipeline over `attrs`
    pub async fn new_record(&self, attrs: Attrs) -> RecordResult<Record> {
        Record::construct(self, attrs, ConstructOptions::default()).await
    }

    /// Construct a record, then save it
    pub async fn create(&self, attrs: Attrs) -> RecordResult<Record> {
        let mut record = self.new_record(attrs).await?;
        record.save().await?;
        Ok(record)
    }

    /// Reconstitute a stored record without running the pipeline
    pub fn load(&self, attrs: Attrs) -> Record {
        Record::load(self, attrs)
    }
}

/// Builder for a [`Kind`]
pub struct KindBuilder {
    name: String,
    definition: SchemaDef,
    persistence: Option<Arc<dyn Persistence>>,
    methods: BTreeMap<String, Method>,
    statics: BTreeMap<String, StaticFn>,
}

impl KindBuilder {
    /// Declare or replace an attribute
    pub fn attribute(mut self, name: impl Into<String>, def: AttributeDef) -> Self {
        self.definition = self.definition.attribute(name, def);
        self
    }

    /// Change the identity attribute
    pub fn id_key(mut self, id_key: impl Into<String>) -> Self {
        self.definition = self.definition.id_key(id_key);
        self
    }

    /// Set the persistence collaborator
    pub fn persistence<P: Persistence + 'static>(self, persistence: P) -> Self {
        self.shared_persistence(Arc::new(persistence))
    }

    /// Set a persistence collaborator shared with other kinds
    pub fn shared_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Add or override an instance method
    pub fn method<F, E>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Record, Value) -> Result<Value, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.methods.insert(
            name.into(),
            Arc::new(move |record: &Record, arg: Value| f(record, arg).map_err(cause)),
        );
        self
    }

    /// Add or override a static
    pub fn static_fn<F, E>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Kind, Value) -> Result<Value, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.statics.insert(
            name.into(),
            Arc::new(move |kind: &Kind, arg: Value| f(kind, arg).map_err(cause)),
        );
        self
    }

    /// Compile the schema and freeze the kind
    pub fn build(self) -> Kind {
        let schema = compile(self.definition.clone());
        Kind {
            inner: Arc::new(KindInner {
                name: self.name,
                definition: self.definition,
                schema,
                persistence: self.persistence.unwrap_or_else(|| Arc::new(NoPersistence)),
                methods: self.methods,
                statics: self.statics,
            }),
        }
    }
}
