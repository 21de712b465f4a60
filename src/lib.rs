//! recordflow - schema-driven attribute pipeline for records
//!
//! Merges incoming attributes into a record, runs validators and then
//! transformers over the keys that changed, and delivers the committed
//! attribute set or the first failure exactly once. Tracks changed keys so
//! persistence collaborators receive minimal diffs.

pub mod adapter;
pub mod completion;
pub mod config;
pub mod error;
pub mod observability;
pub mod record;
pub mod schema;
pub mod tasks;
pub mod validators;

pub use completion::Completion;
pub use error::{RecordError, RecordResult};
pub use record::{ConstructOptions, Kind, MemoryStore, Model, NoPersistence, Persistence, Record};
pub use schema::{AttributeDef, Attrs, SchemaDef};
