//! # Record Engine
//!
//! Owns one record's attribute state and runs the pipeline over it.
//!
//! ## Set cycle
//! 1. Drop undeclared keys and compute the keys whose value differs from
//!    the committed one.
//! 2. On the first change since the record was last persisted, snapshot the
//!    committed attributes and changed keys as `prior`.
//! 3. Merge into `pending`, run validators over the changed keys, then
//!    transformers over the same keys.
//! 4. Commit `pending`, or discard it and roll back to `prior`.
//!
//! ## Save cycle
//! New records go to `create` with every committed attribute; others go to
//! `update` with the changed ones. Change tracking is cleared first. When the
//! collaborator fails the record rolls back to `prior` as well.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use super::kind::Kind;
use super::persistence::is_empty_id;
use crate::error::{RecordError, RecordResult};
use crate::observability::{Event, Logger};
use crate::schema::Attrs;

/// How a record comes into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstructOptions {
    /// Take the attributes as already persisted and skip the pipeline
    pub load: bool,
}

impl ConstructOptions {
    /// Options for reconstituting a stored record
    pub fn load() -> Self {
        Self { load: true }
    }
}

/// Record state as of the first change since the last persistence
#[derive(Debug, Clone)]
struct Snapshot {
    attrs: Attrs,
    changed: BTreeSet<String>,
}

/// One record of a [`Kind`]
pub struct Record {
    kind: Kind,
    attrs: Attrs,
    pending: Option<Attrs>,
    prior: Option<Snapshot>,
    changed: BTreeSet<String>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("kind", &self.kind.name())
            .field("attrs", &self.attrs)
            .field("pending", &self.pending)
            .field("prior", &self.prior)
            .field("changed", &self.changed)
            .finish()
    }
}

impl Record {
    /// A blank record with no attributes
    pub fn new(kind: &Kind) -> Self {
        Self {
            kind: kind.clone(),
            attrs: Attrs::new(),
            pending: None,
            prior: None,
            changed: BTreeSet::new(),
        }
    }

    /// Reconstitute a stored record.
    ///
    /// Undeclared keys are dropped and missing ones take their defaults. No
    /// task runs and nothing is marked changed.
    pub fn load(kind: &Kind, attrs: Attrs) -> Self {
        let mut record = Self::new(kind);
        record.attrs = kind.schema().with_defaults(attrs);
        Logger::event(Event::RecordLoaded, &[("kind", kind.name())]);
        record
    }

    /// Build a record, running the pipeline unless `options.load` is set
    pub async fn construct(
        kind: &Kind,
        attrs: Attrs,
        options: ConstructOptions,
    ) -> RecordResult<Self> {
        if options.load {
            return Ok(Self::load(kind, attrs));
        }
        let mut record = Self::new(kind);
        record.seed(attrs).await?;
        Ok(record)
    }

    /// Run the construction pass: defaults overlaid with `attrs`, then `set`.
    ///
    /// A successful seed is the record's baseline, so it leaves no snapshot.
    pub async fn seed(&mut self, attrs: Attrs) -> RecordResult<Attrs> {
        let initial = self.kind.schema().with_defaults(attrs);
        let committed = self.set(initial).await?;
        self.prior = None;
        Logger::event(Event::RecordConstructed, &[("kind", self.kind.name())]);
        Ok(committed)
    }

    /// Merge `attrs` and run validators, then transformers, over the keys
    /// whose value changed.
    ///
    /// Returns the committed attribute set. On failure the record rolls back
    /// to its snapshot, discarding every change since it was last persisted,
    /// and the first failure is returned.
    pub async fn set(&mut self, attrs: Attrs) -> RecordResult<Attrs> {
        let kind = self.kind.clone();
        let schema = kind.schema();

        let incoming = schema.restrict(attrs);
        let changed: Vec<String> = incoming
            .iter()
            .filter(|(key, value)| self.attrs.get(key.as_str()) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect();

        if !changed.is_empty() && self.prior.is_none() {
            self.prior = Some(Snapshot {
                attrs: self.attrs.clone(),
                changed: self.changed.clone(),
            });
        }

        let mut pending = self.attrs.clone();
        pending.extend(incoming);
        self.pending = Some(pending);

        let keys = changed.join(",");
        Logger::event(
            Event::SetStart,
            &[("kind", kind.name()), ("keys", keys.as_str())],
        );

        let outcome = match self.pending.as_mut() {
            Some(pending) => {
                let validated = schema
                    .validators()
                    .build_runner(&changed, &mut *pending)
                    .run()
                    .await;
                match validated {
                    Ok(()) => schema.transformers().build_runner(&changed, pending).run().await,
                    Err(err) => Err(err),
                }
            }
            None => Ok(()),
        };

        let pending = self.pending.take();
        match outcome {
            Ok(()) => {
                if let Some(pending) = pending {
                    self.attrs = pending;
                }
                self.changed.extend(changed);
                Logger::event(
                    Event::SetCommitted,
                    &[("kind", kind.name()), ("keys", keys.as_str())],
                );
                Ok(self.attrs.clone())
            }
            Err(err) => {
                self.rollback();
                Logger::event(
                    Event::SetRolledBack,
                    &[
                        ("kind", kind.name()),
                        ("keys", keys.as_str()),
                        ("error", err.to_string().as_str()),
                    ],
                );
                Err(err)
            }
        }
    }

    /// Hand the committed attributes to the kind's persistence.
    ///
    /// A record with no attributes has nothing to store and succeeds at once.
    pub async fn save(&mut self) -> RecordResult<Attrs> {
        if self.attrs.is_empty() {
            return Ok(Attrs::new());
        }

        let kind = self.kind.clone();
        let is_new = self.is_new();
        let cleared = std::mem::take(&mut self.changed);
        let method = if is_new { "create" } else { "update" };
        Logger::event(
            Event::SaveStart,
            &[("kind", kind.name()), ("method", method)],
        );

        let result = if is_new {
            match kind.persistence().create(self.attrs.clone()).await {
                Ok(assigned) => {
                    if let Some(id) = assigned {
                        self.set_id(id);
                    }
                    Ok(())
                }
                Err(cause) => Err(cause),
            }
        } else {
            let id = self.id().cloned().unwrap_or(Value::Null);
            let changed = self.pick(&cleared);
            kind.persistence().update(id, changed).await
        };

        match result {
            Ok(()) => {
                self.prior = None;
                Logger::event(
                    Event::SaveComplete,
                    &[("kind", kind.name()), ("method", method)],
                );
                Ok(self.attrs.clone())
            }
            Err(cause) => {
                if !self.rollback() {
                    self.changed = cleared;
                }
                let err = RecordError::persistence(cause);
                Logger::event(
                    Event::SaveFailed,
                    &[
                        ("kind", kind.name()),
                        ("method", method),
                        ("error", err.to_string().as_str()),
                    ],
                );
                Err(err)
            }
        }
    }

    /// Restore the snapshot, if any. Returns whether there was one.
    fn rollback(&mut self) -> bool {
        match self.prior.take() {
            Some(Snapshot { attrs, changed }) => {
                self.attrs = attrs;
                self.changed = changed;
                true
            }
            None => false,
        }
    }

    fn pick(&self, keys: &BTreeSet<String>) -> Attrs {
        keys.iter()
            .filter_map(|key| self.attrs.get(key).map(|value| (key.clone(), value.clone())))
            .collect()
    }

    /// Returns true while the identity attribute is absent, `null` or `""`
    pub fn is_new(&self) -> bool {
        self.id().map_or(true, is_empty_id)
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Committed attributes
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Committed value of one attribute
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Identity value, if set
    pub fn id(&self) -> Option<&Value> {
        self.attrs.get(self.kind.schema().id_key())
    }

    /// Write the identity directly, bypassing the pipeline
    pub fn set_id(&mut self, id: Value) {
        let id_key = self.kind.schema().id_key().to_string();
        self.attrs.insert(id_key, id);
    }

    /// Keys changed since the record was last persisted, sorted
    pub fn changed_keys(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    /// Committed attributes as of the first change since the last
    /// persistence, if there was one
    pub fn snapshot(&self) -> Option<&Attrs> {
        self.prior.as_ref().map(|snapshot| &snapshot.attrs)
    }

    /// Call an instance method from the kind's behaviour table
    pub fn call(&self, name: &str, arg: Value) -> RecordResult<Value> {
        let method = self
            .kind
            .method(name)
            .ok_or_else(|| RecordError::UnknownMethod(name.to_string()))?;
        method(self, arg).map_err(|cause| RecordError::Method {
            name: name.to_string(),
            cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::TaskFn;
    use crate::schema::{AttributeDef, SchemaDef};
    use serde_json::json;

    fn attrs(value: Value) -> Attrs {
        value.as_object().cloned().unwrap()
    }

    fn positive() -> Kind {
        Kind::define(
            "counter",
            SchemaDef::new().attribute(
                "v",
                AttributeDef::new()
                    .default_value(json!(0))
                    .validator(TaskFn::sync(|v: &Value| v.as_i64().is_some_and(|n| n >= 0))),
            ),
        )
        .build()
    }

    #[tokio::test]
    async fn test_unchanged_keys_skip_tasks() {
        let kind = positive();
        let mut record = kind.load(attrs(json!({"v": -1})));

        // Stored value would fail validation but is not a change
        let committed = record.set(attrs(json!({"v": -1}))).await.unwrap();
        assert_eq!(committed["v"], json!(-1));
        assert_eq!(record.changed_keys().count(), 0);
        assert!(record.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_failed_set_keeps_committed_state() {
        let kind = positive();
        let mut record = kind.new_record(attrs(json!({"v": 1}))).await.unwrap();
        assert!(record.snapshot().is_none());

        let err = record.set(attrs(json!({"v": -5}))).await.unwrap_err();
        assert_eq!(err.to_string(), "v failed validation");
        assert_eq!(record.get("v"), Some(&json!(1)));
        assert!(record.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_taken_on_first_change_only() {
        let kind = positive();
        let mut record = kind.load(attrs(json!({"id": "r", "v": 1})));

        record.set(attrs(json!({"v": 2}))).await.unwrap();
        record.set(attrs(json!({"v": 3}))).await.unwrap();

        assert_eq!(record.snapshot().unwrap()["v"], json!(1));
        assert_eq!(record.changed_keys().collect::<Vec<_>>(), vec!["v"]);
    }

    #[tokio::test]
    async fn test_failed_set_rolls_back_to_snapshot() {
        let kind = positive();
        let mut record = kind.load(attrs(json!({"id": "r", "v": 1})));

        record.set(attrs(json!({"v": 2}))).await.unwrap();
        record.set(attrs(json!({"v": 3}))).await.unwrap();
        assert!(record.set(attrs(json!({"v": -1}))).await.is_err());

        assert_eq!(record.attrs(), &attrs(json!({"id": "r", "v": 1})));
        assert_eq!(record.changed_keys().count(), 0);
        assert!(record.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_rollback_restores_changes_from_construction() {
        let kind = positive();
        let mut record = kind.new_record(attrs(json!({"v": 4}))).await.unwrap();

        assert!(record.set(attrs(json!({"v": -4}))).await.is_err());

        assert_eq!(record.get("v"), Some(&json!(4)));
        assert_eq!(record.changed_keys().collect::<Vec<_>>(), vec!["id", "v"]);
    }

    #[tokio::test]
    async fn test_is_new_follows_identity() {
        let kind = positive();
        let mut record = kind.new_record(Attrs::new()).await.unwrap();
        assert!(record.is_new());
        assert_eq!(record.id(), Some(&Value::Null));

        record.set_id(json!(""));
        assert!(record.is_new());
        record.set_id(json!("abc"));
        assert!(!record.is_new());
        record.set_id(json!(0));
        assert!(!record.is_new());
    }

    #[tokio::test]
    async fn test_save_on_blank_record_is_noop() {
        let kind = positive();
        let mut record = Record::new(&kind);
        assert_eq!(record.save().await.unwrap(), Attrs::new());
    }

    #[test]
    fn test_unknown_method() {
        let record = positive().load(Attrs::new());
        let err = record.call("missing", Value::Null).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_METHOD");
    }
}
