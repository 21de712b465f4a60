//! Observability for the attribute pipeline
//!
//! Structured JSON-lines logging with typed lifecycle events.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on the pipeline
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use recordflow::observability::{Event, Logger};
//!
//! Logger::event(Event::SetCommitted, &[("kind", "user"), ("keys", "name")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity, Sink};
