//! Shared record handle with a single-flight queue
//!
//! A [`Model`] owns one [`Record`] behind a worker task. Every `set` and
//! `save` is queued and runs to completion before the next one starts, in
//! call order, so overlapping calls never interleave their phases. Each call
//! returns a [`Completion`] that settles with that call's outcome.

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};

use super::engine::{ConstructOptions, Record};
use super::kind::Kind;
use crate::completion::Completion;
use crate::error::{RecordError, RecordResult};
use crate::schema::Attrs;

enum Command {
    Seed(Attrs),
    Set(Attrs),
    Save,
    Snapshot,
}

struct Job {
    command: Command,
    completion: Completion<Attrs>,
}

/// Cloneable handle over one queued record
#[derive(Clone)]
pub struct Model {
    kind: Kind,
    record: Arc<Mutex<Record>>,
    queue: mpsc::UnboundedSender<Job>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind.name())
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Create a record of `kind` and start its worker.
    ///
    /// The returned completion settles with the constructed attributes. With
    /// `options.load` it is settled already.
    pub fn new(kind: &Kind, attrs: Attrs, options: ConstructOptions) -> (Self, Completion<Attrs>) {
        if options.load {
            let record = Record::load(kind, attrs);
            let loaded = record.attrs().clone();
            (Self::from_record(record), Completion::settled(Ok(loaded)))
        } else {
            let model = Self::from_record(Record::new(kind));
            let constructed = model.enqueue(Command::Seed(attrs));
            (model, constructed)
        }
    }

    /// Queue an existing record.
    ///
    /// The worker runs on the ambient Tokio runtime. Without one there is no
    /// worker and every queued call fails with [`RecordError::WorkerStopped`].
    pub fn from_record(record: Record) -> Self {
        let kind = record.kind().clone();
        let record = Arc::new(Mutex::new(record));
        let (queue, jobs) = mpsc::unbounded_channel();
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(drain(Arc::clone(&record), jobs));
        }
        Self {
            kind,
            record,
            queue,
        }
    }

    fn enqueue(&self, command: Command) -> Completion<Attrs> {
        let completion = Completion::new();
        let job = Job {
            command,
            completion: completion.clone(),
        };
        if self.queue.send(job).is_err() {
            completion.reject(RecordError::WorkerStopped);
        }
        completion
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Queue a merge of `attrs`
    pub fn set(&self, attrs: Attrs) -> Completion<Attrs> {
        self.enqueue(Command::Set(attrs))
    }

    /// Queue a save
    pub fn save(&self) -> Completion<Attrs> {
        self.enqueue(Command::Save)
    }

    /// Committed attributes once every call queued before this one finished
    pub fn snapshot(&self) -> Completion<Attrs> {
        self.enqueue(Command::Snapshot)
    }

    /// Committed attributes as of now, after any call currently running
    pub async fn attrs(&self) -> Attrs {
        self.record.lock().await.attrs().clone()
    }

    pub async fn is_new(&self) -> bool {
        self.record.lock().await.is_new()
    }

    /// Keys changed since the record was last persisted
    pub async fn changed_keys(&self) -> Vec<String> {
        self.record
            .lock()
            .await
            .changed_keys()
            .map(str::to_string)
            .collect()
    }

    /// Call an instance method on the current record state
    pub async fn call(&self, name: &str, arg: Value) -> RecordResult<Value> {
        self.record.lock().await.call(name, arg)
    }
}

async fn drain(record: Arc<Mutex<Record>>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(Job {
        command,
        completion,
    }) = jobs.recv().await
    {
        let mut record = record.lock().await;
        let outcome = match command {
            Command::Seed(attrs) => record.seed(attrs).await,
            Command::Set(attrs) => record.set(attrs).await,
            Command::Save => record.save().await,
            Command::Snapshot => Ok(record.attrs().clone()),
        };
        drop(record);
        completion.settle(outcome);
    }
}
