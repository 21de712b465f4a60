//! # Records
//!
//! Record state, the set and save cycles, kinds with their behaviour tables,
//! persistence collaborators, and the queued [`Model`] handle.

mod engine;
mod kind;
mod model;
mod persistence;

pub use engine::{ConstructOptions, Record};
pub use kind::{Kind, KindBuilder, Method, StaticFn};
pub use model::Model;
pub use persistence::{MemoryStore, NoPersistence, PersistFuture, Persistence};
