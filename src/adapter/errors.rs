//! # Adapter Errors

use thiserror::Error;

/// Failures produced by the adapter itself rather than by the wrapped function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("completion handler dropped without being called")]
    CompletionDropped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            AdapterError::Panicked("oops".into()).to_string(),
            "task panicked: oops"
        );
        assert!(AdapterError::CompletionDropped.to_string().contains("dropped"));
    }
}
