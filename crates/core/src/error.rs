//! Error types for simdb
//!
//! One error enum covers the whole stack. We use `thiserror` for automatic
//! `Display` and `Error` trait implementations.
//!
//! Unknown documents are only an error for `similarity`; `delete` and
//! `retrieve` treat them as a no-op / empty result and never construct one.

use std::io;
use thiserror::Error;

/// Result type alias for simdb operations
pub type SimResult<T> = std::result::Result<T, SimError>;

/// Errors produced by similarity tables and the collection registry
#[derive(Debug, Error)]
pub enum SimError {
    /// Missing or invalid configuration value
    #[error("Configuration error: {field} ({reason})")]
    Configuration {
        /// Name of the offending setting
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Vector dimension doesn't match the table's established dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension established by the first insert
        expected: usize,
        /// Dimension of the rejected vector
        got: usize,
    },

    /// Vector dimension exceeds the supported maximum
    #[error("Dimension too large: {got} exceeds maximum {max}")]
    DimensionTooLarge {
        /// Largest supported dimension
        max: usize,
        /// Dimension of the rejected vector
        got: usize,
    },

    /// Referenced document is not in the table
    #[error("Unknown document: {docid}")]
    UnknownDocument {
        /// The missing document id
        docid: u32,
    },

    /// Both documents exist but `other` is not among `docid`'s neighbors
    #[error("Document {other} is not a neighbor of {docid}")]
    NotNeighbors {
        /// Document whose neighbor list was consulted
        docid: u32,
        /// Document that was looked up in that list
        other: u32,
    },

    /// Document id outside the supported range
    #[error("Invalid document id: {docid}")]
    InvalidDocument {
        /// The rejected id
        docid: u32,
    },

    /// Vector component is NaN or infinite
    #[error("Invalid component at index {index}: {value}")]
    InvalidComponent {
        /// Position of the component within the vector
        index: usize,
        /// The rejected value
        value: f32,
    },

    /// Vector has no components
    #[error("Empty vector")]
    EmptyVector,

    /// Named collection does not exist
    #[error("Collection not found: {name}")]
    CollectionNotFound {
        /// Collection name
        name: String,
    },

    /// Collection name is invalid
    #[error("Invalid collection name: {name} ({reason})")]
    InvalidCollectionName {
        /// The invalid name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Persisted bytes could not be decoded into a table
    #[error("Corrupt persisted state: {0}")]
    CorruptPersistedState(String),

    /// I/O error while reading or writing persisted state
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SimError {
    /// Shorthand for a configuration error
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a corruption error
    pub fn corrupt(message: impl Into<String>) -> Self {
        SimError::CorruptPersistedState(message.into())
    }

    /// Check if this error indicates a document or collection was not found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SimError::UnknownDocument { .. }
                | SimError::NotNeighbors { .. }
                | SimError::CollectionNotFound { .. }
        )
    }

    /// Check if this error is a validation error (caller supplied bad input)
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            SimError::Configuration { .. }
                | SimError::DimensionMismatch { .. }
                | SimError::DimensionTooLarge { .. }
                | SimError::InvalidDocument { .. }
                | SimError::InvalidComponent { .. }
                | SimError::EmptyVector
                | SimError::InvalidCollectionName { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_dimension_mismatch() {
        let err = SimError::DimensionMismatch {
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 3, got 2");
    }

    #[test]
    fn test_error_display_configuration() {
        let err = SimError::configuration("MAXLIMITS", "must be at least 1");
        let msg = err.to_string();
        assert!(msg.contains("MAXLIMITS"));
        assert!(msg.contains("must be at least 1"));
    }

    #[test]
    fn test_error_display_corrupt() {
        let err = SimError::corrupt("truncated position index");
        assert_eq!(
            err.to_string(),
            "Corrupt persisted state: truncated position index"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: SimError = io_err.into();
        assert!(matches!(err, SimError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(SimError::UnknownDocument { docid: 1 }.is_not_found());
        assert!(SimError::NotNeighbors { docid: 1, other: 2 }.is_not_found());
        assert!(SimError::CollectionNotFound {
            name: "news".into()
        }
        .is_not_found());
        assert!(!SimError::EmptyVector.is_not_found());
    }

    #[test]
    fn test_is_validation_error() {
        assert!(SimError::DimensionMismatch {
            expected: 2,
            got: 3
        }
        .is_validation_error());
        assert!(SimError::EmptyVector.is_validation_error());
        assert!(SimError::DimensionTooLarge { max: 4, got: 5 }.is_validation_error());
        assert!(SimError::InvalidComponent {
            index: 0,
            value: f32::NAN
        }
        .is_validation_error());
        assert!(!SimError::corrupt("bad").is_validation_error());
        assert!(!SimError::UnknownDocument { docid: 7 }.is_validation_error());
    }
}
