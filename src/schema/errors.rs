//! Schema loading error types
//!
//! Error codes:
//! - SCHEMA_IO (cannot read definition file)
//! - SCHEMA_MALFORMED (invalid JSON or shape)
//! - SCHEMA_UNKNOWN_VALIDATOR (validator name not in the library)
//! - SCHEMA_INVALID_ARGUMENTS (validator arguments don't fit)
//! - SCHEMA_DUPLICATE (kind name registered twice)

use std::fmt;

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    Io,
    Malformed,
    UnknownValidator,
    InvalidArguments,
    Duplicate,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::Io => "SCHEMA_IO",
            SchemaErrorCode::Malformed => "SCHEMA_MALFORMED",
            SchemaErrorCode::UnknownValidator => "SCHEMA_UNKNOWN_VALIDATOR",
            SchemaErrorCode::InvalidArguments => "SCHEMA_INVALID_ARGUMENTS",
            SchemaErrorCode::Duplicate => "SCHEMA_DUPLICATE",
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error with context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    /// Attribute the error concerns, if any
    attribute: Option<String>,
}

impl SchemaError {
    /// Create an error for an unreadable definition file
    pub fn io(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            code: SchemaErrorCode::Io,
            message: format!("cannot read '{}': {}", path.into(), reason),
            attribute: None,
        }
    }

    /// Create an error for a malformed definition
    pub fn malformed(origin: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            code: SchemaErrorCode::Malformed,
            message: format!("malformed schema '{}': {}", origin.into(), reason),
            attribute: None,
        }
    }

    /// Create an error for a validator name the library doesn't know
    pub fn unknown_validator(attribute: impl Into<String>, name: impl Into<String>) -> Self {
        let attribute = attribute.into();
        Self {
            code: SchemaErrorCode::UnknownValidator,
            message: format!("unknown validator `{}` on '{}'", name.into(), attribute),
            attribute: Some(attribute),
        }
    }

    /// Create an error for unusable validator arguments
    pub fn invalid_arguments(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        let attribute = attribute.into();
        Self {
            code: SchemaErrorCode::InvalidArguments,
            message: format!("'{}': {}", attribute, reason.into()),
            attribute: Some(attribute),
        }
    }

    /// Create an error for a kind name registered twice
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::Duplicate,
            message: format!("schema '{}' already registered", name.into()),
            attribute: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the attribute if applicable
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
