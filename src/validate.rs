//! Injected validator collaborators.
//!
//! The store and engines run an externally supplied validator before
//! mutating state. The engine inspects only the `valid` flag and the
//! `errors` list of the returned report — the content of the checks is
//! entirely the collaborator's business. A collaborator failure (an
//! `Err` return) propagates as a reported error *before* any state
//! change, so a slow or broken validator can never corrupt the store.
//!
//! [`StructuralValidator`] is the bundled default; it re-checks only the
//! cheap shape invariants and accepts everything else.

use crate::error::Result;
use crate::query::GraphQuery;
use crate::relationship::Relationship;
use crate::schema::MappingSchema;

/// Verdict returned by a validator collaborator.
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    /// Whether the record passed validation.
    pub valid: bool,
    /// Errors that caused rejection; inspected by the engine.
    pub errors: Vec<String>,
    /// Advisory warnings; never inspected by the engine.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A passing report with no messages.
    pub fn pass() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing report carrying the given error messages.
    pub fn fail(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
            warnings: Vec::new(),
        }
    }
}

/// Externally injected validation collaborator.
///
/// Implementations must be `Send + Sync`; the store shares one instance
/// across all callers. Schema and query validation default to accepting
/// everything, so most collaborators only implement the relationship
/// hook.
///
/// # Example
///
/// ```rust
/// use relgraph::{Relationship, RelationshipValidator, ValidationReport};
///
/// struct NoDeprecatedTypes;
///
/// impl RelationshipValidator for NoDeprecatedTypes {
///     fn validate_relationship(&self, rel: &Relationship) -> relgraph::Result<ValidationReport> {
///         if rel.relationship_type == "superseded_by" {
///             return Ok(ValidationReport::fail(vec![
///                 "superseded_by is deprecated; use supersedes".to_string(),
///             ]));
///         }
///         Ok(ValidationReport::pass())
///     }
/// }
/// ```
pub trait RelationshipValidator: Send + Sync {
    /// Validates a relationship before it is stored or updated.
    fn validate_relationship(&self, rel: &Relationship) -> Result<ValidationReport>;

    /// Validates a schema before registration. Defaults to accepting.
    fn validate_schema(&self, _schema: &MappingSchema) -> Result<ValidationReport> {
        Ok(ValidationReport::pass())
    }

    /// Validates a query before execution. Defaults to accepting.
    fn validate_query(&self, _query: &GraphQuery) -> Result<ValidationReport> {
        Ok(ValidationReport::pass())
    }
}

/// Default validator: accepts any relationship whose shape invariants
/// hold (the store enforces those separately in any case).
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralValidator;

impl RelationshipValidator for StructuralValidator {
    fn validate_relationship(&self, rel: &Relationship) -> Result<ValidationReport> {
        let mut errors = Vec::new();

        if rel.source.item_type.is_empty() || rel.source.id.is_empty() {
            errors.push("source endpoint must carry a type and an id".to_string());
        }
        if rel.target.item_type.is_empty() || rel.target.id.is_empty() {
            errors.push("target endpoint must carry a type and an id".to_string());
        }
        if rel.relationship_type.is_empty() {
            errors.push("relationship type must be non-empty".to_string());
        }
        if !(0.0..=1.0).contains(&rel.confidence) {
            errors.push(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                rel.confidence
            ));
        }

        if errors.is_empty() {
            Ok(ValidationReport::pass())
        } else {
            Ok(ValidationReport::fail(errors))
        }
    }
}
