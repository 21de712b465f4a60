//! Schema subsystem
//!
//! Declarative per-attribute defaults, validators and transformers, compiled
//! once per record kind and immutable thereafter.
//!
//! # Design Principles
//!
//! - The identity attribute always exists in a compiled schema
//! - Compilation never fails; absent fields mean "nothing to do"
//! - A task's calling style is fixed at compile time

mod compiler;
mod errors;
mod loader;
mod types;

pub use compiler::{compile, CompiledSchema};
pub use errors::{SchemaError, SchemaErrorCode, SchemaResult};
pub use loader::{parse_definition, SchemaLoader};
pub use types::{AttributeDef, Attrs, SchemaDef, Transformer, Validator, DEFAULT_ID_KEY};
