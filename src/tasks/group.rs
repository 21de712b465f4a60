//! Task groups and phase runners
//!
//! A group holds one kind of task (validators or transformers) keyed by
//! attribute. A runner binds the tasks for a subset of keys to the pending
//! attribute set of one record and drives them to completion.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;

use crate::adapter::{AsyncFn, Cause};
use crate::error::{RecordError, RecordResult};
use crate::observability::{Event, Logger};
use crate::schema::Attrs;

/// Which pipeline phase a group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Validator,
    Transformer,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Validator => "validator",
            TaskKind::Transformer => "transformer",
        }
    }
}

/// Output type of a phase's tasks.
///
/// Decides what a task's output means for the attribute it ran on.
pub trait Phase: Send + 'static {
    const KIND: TaskKind;

    /// Value to carry forward for `key` given the task's input and output
    fn apply(key: &str, input: Value, output: Self) -> RecordResult<Value>;

    /// Wrap an error reported by the task itself
    fn task_error(key: &str, cause: Cause) -> RecordError;
}

impl Phase for bool {
    const KIND: TaskKind = TaskKind::Validator;

    fn apply(key: &str, input: Value, passed: bool) -> RecordResult<Value> {
        if passed {
            Ok(input)
        } else {
            Err(RecordError::validation_failed(key))
        }
    }

    fn task_error(key: &str, cause: Cause) -> RecordError {
        RecordError::Validator {
            key: key.to_string(),
            cause,
        }
    }
}

impl Phase for Value {
    const KIND: TaskKind = TaskKind::Transformer;

    fn apply(_key: &str, _input: Value, output: Value) -> RecordResult<Value> {
        Ok(output)
    }

    fn task_error(key: &str, cause: Cause) -> RecordError {
        RecordError::Transform {
            key: key.to_string(),
            cause,
        }
    }
}

/// Adapted tasks of one kind, grouped by attribute
pub struct TaskGroup<T> {
    tasks: BTreeMap<String, Vec<AsyncFn<T>>>,
}

impl<T> Default for TaskGroup<T> {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }
}

impl<T> Clone for TaskGroup<T> {
    fn clone(&self) -> Self {
        Self {
            tasks: self.tasks.clone(),
        }
    }
}

impl<T: Phase> fmt::Debug for TaskGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .tasks
            .iter()
            .map(|(key, tasks)| (key.as_str(), tasks.len()))
            .collect();
        f.debug_struct("TaskGroup")
            .field("kind", &T::KIND)
            .field("tasks", &counts)
            .finish()
    }
}

impl<T: Phase> TaskGroup<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase this group runs in
    pub fn kind(&self) -> TaskKind {
        T::KIND
    }

    /// Register the ordered task sequence for `key`. Empty sequences are skipped.
    pub fn insert(&mut self, key: impl Into<String>, tasks: Vec<AsyncFn<T>>) {
        if !tasks.is_empty() {
            self.tasks.insert(key.into(), tasks);
        }
    }

    /// Tasks registered for `key`, in declared order
    pub fn tasks_for(&self, key: &str) -> &[AsyncFn<T>] {
        self.tasks.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys that have at least one task
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Number of keys with tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Total number of tasks across all keys
    pub fn task_count(&self) -> usize {
        self.tasks.values().map(Vec::len).sum()
    }

    /// Bind the tasks for `keys` to `context`.
    ///
    /// Keys without tasks are ignored; repeated keys are bound once.
    pub fn build_runner<'a, I, K>(&self, keys: I, context: &'a mut Attrs) -> Runner<'a, T>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let mut chains = Vec::new();

        for key in keys {
            let key = key.as_ref();
            let Some(tasks) = self.tasks.get(key) else {
                continue;
            };
            if seen.insert(key.to_string()) {
                chains.push((key.to_string(), tasks.clone()));
            }
        }

        Runner { context, chains }
    }
}

/// One phase run over a record's pending attributes
pub struct Runner<'a, T> {
    context: &'a mut Attrs,
    chains: Vec<(String, Vec<AsyncFn<T>>)>,
}

impl<T: Phase> Runner<'_, T> {
    /// Number of bound tasks
    pub fn len(&self) -> usize {
        self.chains.iter().map(|(_, chain)| chain.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Drive every bound task to completion.
    ///
    /// Distinct keys run concurrently; tasks of one key run in declared order.
    /// Each key's final value is written back to the context, or `null` if
    /// one of its tasks failed. Sibling tasks are never cancelled. Returns the
    /// first failure to complete, and only that one.
    pub async fn run(self) -> RecordResult<()> {
        let Runner { context, chains } = self;

        let mut in_flight: FuturesUnordered<_> = chains
            .into_iter()
            .map(|(key, chain)| {
                let input = context.get(&key).cloned().unwrap_or(Value::Null);
                run_chain::<T>(key, input, chain)
            })
            .collect();

        let mut first_failure = None;
        while let Some((key, outcome)) = in_flight.next().await {
            match outcome {
                Ok(value) => {
                    context.insert(key, value);
                }
                Err(err) => {
                    Logger::event(
                        Event::TaskFailed,
                        &[
                            ("kind", T::KIND.as_str()),
                            ("key", key.as_str()),
                            ("error", err.to_string().as_str()),
                        ],
                    );
                    context.insert(key, Value::Null);
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn run_chain<T: Phase>(
    key: String,
    mut value: Value,
    chain: Vec<AsyncFn<T>>,
) -> (String, RecordResult<Value>) {
    for task in chain {
        let output = match task(value.clone()).await {
            Ok(output) => output,
            Err(cause) => {
                let err = T::task_error(&key, cause);
                return (key, Err(err));
            }
        };
        match T::apply(&key, value, output) {
            Ok(next) => value = next,
            Err(err) => return (key, Err(err)),
        }
    }
    (key, Ok(value))
}
