//! Persistence collaborators
//!
//! The engine never stores anything itself. `save` hands the committed
//! attributes to a [`Persistence`] implementation: the full set through
//! `create` for a new record, the changed subset through `update` otherwise.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use crate::adapter::{cause, Cause};
use crate::observability::{Event, Logger};
use crate::schema::{Attrs, DEFAULT_ID_KEY};

/// Future returned by a persistence call
pub type PersistFuture<T> = BoxFuture<'static, Result<T, Cause>>;

/// Storage collaborator invoked by `save`.
///
/// Both methods have a default that logs `PERSISTENCE_NOT_IMPLEMENTED` and
/// succeeds, so a kind without storage can still be saved.
pub trait Persistence: Send + Sync {
    /// Store a record that has no identity yet.
    ///
    /// Returns the identity the store assigned, if any.
    fn create(&self, _attrs: Attrs) -> PersistFuture<Option<Value>> {
        not_implemented("create");
        future::ready(Ok(None)).boxed()
    }

    /// Store the attributes of record `id` that changed since it was last persisted
    fn update(&self, _id: Value, _changed: Attrs) -> PersistFuture<()> {
        not_implemented("update");
        future::ready(Ok(())).boxed()
    }
}

fn not_implemented(method: &str) {
    Logger::event(Event::PersistenceNotImplemented, &[("method", method)]);
}

/// Persistence that keeps the defaults for both methods
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl Persistence for NoPersistence {}

/// In-memory store for tests and prototypes.
///
/// Rows are keyed by the string form of their identity. Records created
/// without one get a v4 UUID.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    id_key: String,
    rows: Arc<RwLock<BTreeMap<String, Attrs>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_id_key(DEFAULT_ID_KEY)
    }

    /// Store whose rows carry their identity under `id_key`
    pub fn with_id_key(id_key: impl Into<String>) -> Self {
        Self {
            id_key: id_key.into(),
            rows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Read a row by identity
    pub fn get(&self, id: &Value) -> Option<Attrs> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.get(&row_key(id)).cloned()
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, mut attrs: Attrs) -> Option<Value> {
        let assigned = match attrs.get(&self.id_key) {
            Some(id) if !is_empty_id(id) => None,
            _ => Some(Value::String(uuid::Uuid::new_v4().to_string())),
        };
        if let Some(id) = &assigned {
            attrs.insert(self.id_key.clone(), id.clone());
        }

        let key = attrs.get(&self.id_key).map(row_key).unwrap_or_default();
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.insert(key, attrs);
        assigned
    }

    fn merge(&self, id: &Value, changed: Attrs) -> Result<(), Cause> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row = rows
            .get_mut(&row_key(id))
            .ok_or_else(|| cause(format!("record {} not found", id)))?;
        row.extend(changed);
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn create(&self, attrs: Attrs) -> PersistFuture<Option<Value>> {
        future::ready(Ok(self.insert(attrs))).boxed()
    }

    fn update(&self, id: Value, changed: Attrs) -> PersistFuture<()> {
        future::ready(self.merge(&id, changed)).boxed()
    }
}

/// True when `id` does not identify a stored record.
///
/// Only `null` and `""` are empty; `0` and `false` are identities.
pub(crate) fn is_empty_id(id: &Value) -> bool {
    match id {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn row_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
