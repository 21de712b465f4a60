//! # Function Adapter
//!
//! Normalizes validators and transformers into one asynchronous calling
//! convention, whatever style their author wrote them in.

mod errors;
mod function;

pub use errors::AdapterError;
pub use function::{
    adapt, cause, AsyncFn, BoxError, CallStyle, Cause, Done, TaskFn, TaskFuture, TaskOutcome,
};
