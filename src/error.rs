//! Error types for relgraph.
//!
//! relgraph uses a hierarchical error system:
//! - `GraphError` is the top-level error returned by all public APIs
//! - Specific error types (`ValidationError`, `ConflictError`,
//!   `NotFoundError`, `LimitExceededError`) provide detail
//!
//! Every mutating call either returns the resulting record or one of
//! these typed errors; queries additionally carry non-fatal warnings in
//! their result objects for soft ceiling breaches.

use thiserror::Error;

use crate::types::{RelationshipId, SchemaId};

/// Result type alias for relgraph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Top-level error enum for all relgraph operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Input failed relationship/schema/query validation. Recoverable —
    /// the caller must correct the input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Duplicate ID without an overwrite request. Recoverable by retrying
    /// with overwrite or a new ID.
    #[error("{0}")]
    Conflict(#[from] ConflictError),

    /// Operation on an unknown ID. Recoverable — the caller decides.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// A query breached a hard depth/limit ceiling. Recoverable by
    /// narrowing the query.
    #[error("{0}")]
    Limit(#[from] LimitExceededError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },
}

impl GraphError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a limit-exceeded error.
    pub fn is_limit(&self) -> bool {
        matches!(self, Self::Limit(_))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// Source and target reference the same item.
    #[error("Self-referential relationship not allowed: {item}")]
    SelfLoop {
        /// The item referenced by both endpoints (`type:id`).
        item: String,
    },

    /// The injected validator rejected the record.
    #[error("Rejected by validator: {}", errors.join("; "))]
    Rejected {
        /// Error messages reported by the validator.
        errors: Vec<String>,
    },

    /// A schema version is not `major.minor.patch`.
    #[error("Invalid schema version '{version}': expected major.minor.patch")]
    InvalidVersion {
        /// The offending version string.
        version: String,
    },
}

impl ValidationError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates a self-loop error for the given item reference.
    pub fn self_loop(item: impl ToString) -> Self {
        Self::SelfLoop {
            item: item.to_string(),
        }
    }

    /// Creates a validator-rejection error carrying the reported messages.
    pub fn rejected(errors: Vec<String>) -> Self {
        Self::Rejected { errors }
    }

    /// Creates an invalid version error.
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }
}

/// Conflict errors: an ID is already taken and overwrite was not requested.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Relationship ID already exists.
    #[error("Relationship already exists: {0}")]
    Relationship(RelationshipId),

    /// Schema ID already registered.
    #[error("Schema already registered: {0}")]
    Schema(SchemaId),
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Relationship with given ID not found.
    #[error("Relationship not found: {0}")]
    Relationship(RelationshipId),

    /// Schema with given ID not registered.
    #[error("Schema not found: {0}")]
    Schema(SchemaId),
}

/// A query breached a hard ceiling.
///
/// Soft breaches (e.g. depth above the recommended bound) are reported as
/// warnings on the query result instead.
#[derive(Debug, Error)]
pub enum LimitExceededError {
    /// Requested traversal depth exceeds the hard ceiling.
    #[error("Traversal depth {requested} exceeds maximum {max}")]
    Depth {
        /// Depth requested by the query.
        requested: u32,
        /// Configured hard ceiling.
        max: u32,
    },

    /// Requested result limit exceeds the hard ceiling.
    #[error("Result limit {requested} exceeds maximum {max}")]
    ResultLimit {
        /// Limit requested by the query.
        requested: usize,
        /// Configured hard ceiling.
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphError::config("cache capacity must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: cache capacity must be positive"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::invalid_field("confidence", "must be between 0.0 and 1.0");
        assert_eq!(
            err.to_string(),
            "Invalid field 'confidence': must be between 0.0 and 1.0"
        );
    }

    #[test]
    fn test_self_loop_display() {
        let err = ValidationError::self_loop("decision:d1");
        assert_eq!(
            err.to_string(),
            "Self-referential relationship not allowed: decision:d1"
        );
    }

    #[test]
    fn test_rejected_joins_errors() {
        let err = ValidationError::rejected(vec!["bad type".into(), "bad id".into()]);
        assert_eq!(err.to_string(), "Rejected by validator: bad type; bad id");
    }

    #[test]
    fn test_conflict_error_display() {
        let err = ConflictError::Relationship(RelationshipId::new("a->b"));
        assert_eq!(err.to_string(), "Relationship already exists: a->b");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = NotFoundError::Schema(SchemaId::new("architecture@1.0.0"));
        assert_eq!(err.to_string(), "Schema not found: architecture@1.0.0");
    }

    #[test]
    fn test_limit_error_display() {
        let err = LimitExceededError::Depth {
            requested: 9,
            max: 5,
        };
        assert_eq!(err.to_string(), "Traversal depth 9 exceeds maximum 5");
    }

    #[test]
    fn test_is_validation() {
        let err: GraphError = ValidationError::required_field("name").into();
        assert!(err.is_validation());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_is_conflict_and_not_found() {
        let err: GraphError = ConflictError::Schema(SchemaId::new("s@1.0.0")).into();
        assert!(err.is_conflict());

        let err: GraphError = NotFoundError::Relationship(RelationshipId::new("x")).into();
        assert!(err.is_not_found());
        assert!(!err.is_limit());
    }

    #[test]
    fn test_error_conversion_chain() {
        fn inner() -> Result<()> {
            Err(ValidationError::required_field("source"))?
        }

        let result = inner();
        assert!(result.is_err());
        assert!(result.unwrap_err().is_validation());
    }
}
