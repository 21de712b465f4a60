//! # Completion Channel
//!
//! Single-resolution futures that hand a record's final attribute set, or its
//! first failure, to one consumer exactly once, however many times the
//! pipeline tries to settle them.

mod channel;
mod schedule;

pub use channel::Completion;
