//! # Task Groups
//!
//! Phase-scoped collections of adapted validators and transformers, and the
//! runners that execute them over a record's pending attributes.

mod group;

pub use group::{Phase, Runner, TaskGroup, TaskKind};
