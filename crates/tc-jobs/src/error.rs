//! Job validation error types.

use thiserror::Error;

use crate::deadline::DeadlineExceeded;

/// Errors raised by the storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No rows returned when one was expected.
    #[error("No rows returned")]
    NotFound,

    /// Failed to execute a query.
    #[error("Query execution failed: {0}")]
    Query(String),

    /// A row came back in a shape that could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The lookup budget ran out before the query was issued.
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl StoreError {
    /// Check if this is a "row not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Errors that can occur while decoding or resolving a single job field.
#[derive(Error, Debug)]
pub enum JobError {
    /// A required field was absent.
    #[error("{0}: cannot be blank")]
    Missing(&'static str),

    /// None of the accepted timestamp encodings matched.
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Numeric TTL below zero.
    #[error("TTL cannot be negative!")]
    NegativeTtl,

    /// Numeric TTL at or above the representable ceiling.
    #[error("TTL cannot exceed {max} hours!")]
    TtlTooLarge { max: u64 },

    /// Duration string that failed to parse or is shorter than an hour.
    #[error("Invalid duration entered for TTL! Must be at least one hour, but no more than {max} hours!")]
    InvalidTtlString { max: u64 },

    /// Numeric Delivery Service ID below zero.
    #[error("Delivery Service ID cannot be negative")]
    NegativeId,

    /// The referenced Delivery Service does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Storage failed for a reason the caller must not see.
    #[error("Unknown error occurred")]
    ResolutionFailed,

    /// A persisted job's free-text parameters could not be decoded.
    #[error("invalid job parameters: {0:?}")]
    InvalidParameters(String),

    /// Storage failure surfaced as-is.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The lookup budget ran out.
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl JobError {
    /// Check if this error names a missing Delivery Service.
    pub fn is_not_found(&self) -> bool {
        matches!(self, JobError::NotFound(_))
            || matches!(self, JobError::Store(e) if e.is_not_found())
    }
}

/// Every constraint a job request violated, in the order they were checked.
///
/// Displays as a single comma-separated message.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{}", .0.join(", "))]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    /// Create an empty set of errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violated constraint.
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Check if nothing was violated.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of violated constraints.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The individual messages.
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Check if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.0.iter().any(|m| m.contains(needle))
    }

    /// Turn the collected errors into a result.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Vec<String>> for ValidationErrors {
    fn from(messages: Vec<String>) -> Self {
        Self(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_join() {
        let mut errs = ValidationErrors::new();
        errs.push("regex: cannot be blank");
        errs.push("ttl: cannot be blank");
        assert_eq!(errs.to_string(), "regex: cannot be blank, ttl: cannot be blank");
        assert_eq!(errs.len(), 2);
        assert!(errs.into_result().is_err());
    }

    #[test]
    fn test_empty_validation_errors_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(StoreError::NotFound.is_not_found());
        assert!(!StoreError::Query("boom".into()).is_not_found());
        assert!(JobError::Store(StoreError::NotFound).is_not_found());
        assert!(!JobError::ResolutionFailed.is_not_found());
    }

    #[test]
    fn test_opaque_message() {
        assert_eq!(JobError::ResolutionFailed.to_string(), "Unknown error occurred");
    }
}
