//! Observable record lifecycle events
//!
//! Events are explicit and typed. Each carries the severity it is logged at.

use std::fmt;

use super::logger::Severity;

/// Observable events in the attribute pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Construction
    /// Record built by running the pipeline over its initial attributes
    RecordConstructed,
    /// Record reconstituted from storage without running the pipeline
    RecordLoaded,

    // Set cycle
    /// Merge computed, phases about to run
    SetStart,
    /// Pending attributes committed
    SetCommitted,
    /// Pending attributes discarded after a failure
    SetRolledBack,
    /// One validator or transformer reported a failure
    TaskFailed,

    // Save cycle
    /// Persistence collaborator about to be invoked
    SaveStart,
    /// Persistence collaborator succeeded
    SaveComplete,
    /// Persistence collaborator failed, attributes restored
    SaveFailed,
    /// Default `create`/`update` used
    PersistenceNotImplemented,

    // Schema
    /// Schema definition loaded from JSON
    SchemaLoaded,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RecordConstructed => "RECORD_CONSTRUCTED",
            Event::RecordLoaded => "RECORD_LOADED",
            Event::SetStart => "SET_BEGIN",
            Event::SetCommitted => "SET_COMMITTED",
            Event::SetRolledBack => "SET_ROLLED_BACK",
            Event::TaskFailed => "TASK_FAILED",
            Event::SaveStart => "SAVE_BEGIN",
            Event::SaveComplete => "SAVE_COMPLETE",
            Event::SaveFailed => "SAVE_FAILED",
            Event::PersistenceNotImplemented => "PERSISTENCE_NOT_IMPLEMENTED",
            Event::SchemaLoaded => "SCHEMA_LOADED",
        }
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::SetStart | Event::SaveStart | Event::TaskFailed => Severity::Trace,
            Event::RecordConstructed
            | Event::RecordLoaded
            | Event::SetCommitted
            | Event::SaveComplete
            | Event::SchemaLoaded => Severity::Info,
            Event::SetRolledBack | Event::PersistenceNotImplemented => Severity::Warn,
            Event::SaveFailed => Severity::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
