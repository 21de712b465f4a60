//! Record Error Types
//!
//! Unified error handling for the attribute pipeline. Every failure a caller
//! can observe travels through a record's completion channel as one of these.

use thiserror::Error;

use crate::adapter::Cause;

/// Record pipeline result type
pub type RecordResult<T> = Result<T, RecordError>;

/// Record pipeline error type
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// A validator resolved `false` for the attribute
    #[error("{key} failed validation")]
    ValidationFailed { key: String },

    /// A validator reported an error of its own
    #[error("validator for `{key}` failed: {cause}")]
    Validator {
        key: String,
        #[source]
        cause: Cause,
    },

    /// A transformer reported an error
    #[error("transformer for `{key}` failed: {cause}")]
    Transform {
        key: String,
        #[source]
        cause: Cause,
    },

    /// The `create`/`update` collaborator reported an error
    #[error("persistence failed: {cause}")]
    Persistence {
        #[source]
        cause: Cause,
    },

    /// No method with this name in the kind's behaviour table
    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    /// A behaviour-table method reported an error
    #[error("method `{name}` failed: {cause}")]
    Method {
        name: String,
        #[source]
        cause: Cause,
    },

    /// The record's single-flight worker is gone
    #[error("record worker stopped")]
    WorkerStopped,

    /// The completion outcome was already handed to an observer
    #[error("completion outcome already delivered")]
    AlreadyDelivered,
}

impl RecordError {
    /// Create a validation failure for `key`
    pub fn validation_failed(key: impl Into<String>) -> Self {
        Self::ValidationFailed { key: key.into() }
    }

    /// Create a persistence error
    pub fn persistence(cause: Cause) -> Self {
        Self::Persistence { cause }
    }

    /// The attribute the error is attached to, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::ValidationFailed { key }
            | Self::Validator { key, .. }
            | Self::Transform { key, .. } => Some(key),
            _ => None,
        }
    }

    /// True for failures raised by the validator phase
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationFailed { .. } | Self::Validator { .. })
    }

    /// Stable error code for callers and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "VALIDATION_FAILED",
            Self::Validator { .. } => "VALIDATOR_ERROR",
            Self::Transform { .. } => "TRANSFORM_ERROR",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::UnknownMethod(_) => "UNKNOWN_METHOD",
            Self::Method { .. } => "METHOD_ERROR",
            Self::WorkerStopped => "WORKER_STOPPED",
            Self::AlreadyDelivered => "ALREADY_DELIVERED",
        }
    }
}
