//! # Task Functions
//!
//! A validator or transformer is declared once in one of three calling styles
//! and adapted into a single future-returning shape. The style is fixed when
//! the schema is compiled.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::oneshot;

use super::errors::AdapterError;

/// Boxed error accepted from task authors
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Shared original cause of a task failure
pub type Cause = Arc<dyn Error + Send + Sync>;

/// What a task resolves to
pub type TaskOutcome<T> = Result<T, Cause>;

/// Future returned by an adapted task
pub type TaskFuture<T> = BoxFuture<'static, TaskOutcome<T>>;

/// Uniform asynchronous task shape
pub type AsyncFn<T> = Arc<dyn Fn(Value) -> TaskFuture<T> + Send + Sync>;

type SyncBody<T> = Arc<dyn Fn(&Value) -> TaskOutcome<T> + Send + Sync>;
type CallbackBody<T> = Arc<dyn Fn(Value, Done<T>) + Send + Sync>;

/// Wrap any error into a shareable cause
pub fn cause<E: Into<BoxError>>(err: E) -> Cause {
    Arc::from(err.into())
}

/// Completion handler handed to callback-style tasks.
///
/// Consumed on use, so a task can complete at most once. Dropping it without
/// completing fails the task instead of stalling the phase.
pub struct Done<T> {
    tx: oneshot::Sender<TaskOutcome<T>>,
}

impl<T> Done<T> {
    /// Complete with a raw outcome
    pub fn complete(self, outcome: TaskOutcome<T>) {
        // Receiver gone means the phase no longer cares
        let _ = self.tx.send(outcome);
    }

    /// Complete successfully
    pub fn ok(self, value: T) {
        self.complete(Ok(value));
    }

    /// Complete with an error
    pub fn fail<E: Into<BoxError>>(self, err: E) {
        self.complete(Err(cause(err)));
    }
}

impl<T> fmt::Debug for Done<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").finish_non_exhaustive()
    }
}

/// Calling style a task was declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    Sync,
    Callback,
    Async,
}

/// A validator or transformer body in one of the supported calling styles
pub enum TaskFn<T> {
    /// Returns its result directly
    Sync(SyncBody<T>),
    /// Receives a completion handler and calls it when done
    Callback(CallbackBody<T>),
    /// Returns a future
    Async(AsyncFn<T>),
}

impl<T> Clone for TaskFn<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(f) => Self::Sync(Arc::clone(f)),
            Self::Callback(f) => Self::Callback(Arc::clone(f)),
            Self::Async(f) => Self::Async(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for TaskFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskFn").field(&self.style()).finish()
    }
}

impl<T> TaskFn<T> {
    pub fn style(&self) -> CallStyle {
        match self {
            Self::Sync(_) => CallStyle::Sync,
            Self::Callback(_) => CallStyle::Callback,
            Self::Async(_) => CallStyle::Async,
        }
    }
}

impl<T: Send + 'static> TaskFn<T> {
    /// Infallible synchronous body
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Value) -> T + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(move |value| Ok(f(value))))
    }

    /// Fallible synchronous body
    pub fn try_sync<F, E>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::Sync(Arc::new(move |value| f(value).map_err(cause)))
    }

    /// Completion-handler body
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Value, Done<T>) + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Future-returning body
    pub fn future<F, Fut, E>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::Async(Arc::new(move |value| {
            f(value).map(|outcome| outcome.map_err(cause)).boxed()
        }))
    }
}

/// Adapt a task into the uniform asynchronous shape.
///
/// Errors and panics raised by the body surface as the task's error. A
/// callback body that never calls its handler fails with
/// [`AdapterError::CompletionDropped`] once the handler is dropped.
pub fn adapt<T: Send + 'static>(task: TaskFn<T>) -> AsyncFn<T> {
    match task {
        TaskFn::Sync(body) => Arc::new(move |value: Value| -> TaskFuture<T> {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&value)))
                .unwrap_or_else(|payload| Err(panicked(payload)));
            future::ready(outcome).boxed()
        }),
        TaskFn::Callback(body) => Arc::new(move |value: Value| -> TaskFuture<T> {
            let (tx, rx) = oneshot::channel();
            let launch = panic::catch_unwind(AssertUnwindSafe(|| body(value, Done { tx })));
            let launch_failure = launch.err().map(panicked);
            async move {
                if let Some(err) = launch_failure {
                    return Err(err);
                }
                rx.await
                    .unwrap_or_else(|_| Err(cause(AdapterError::CompletionDropped)))
            }
            .boxed()
        }),
        TaskFn::Async(body) => Arc::new(move |value: Value| -> TaskFuture<T> {
            AssertUnwindSafe(body(value))
                .catch_unwind()
                .map(|outcome| outcome.unwrap_or_else(|payload| Err(panicked(payload))))
                .boxed()
        }),
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> Cause {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    cause(AdapterError::Panicked(message))
}
