//! Relationship records and structural validation.
//!
//! A **relationship** is a typed, directed-or-bidirectional edge between
//! two knowledge items. Records live in the
//! [`RelationshipStore`](crate::store::RelationshipStore), which owns all
//! indexing, deduplication, and history.
//!
//! # Constraints
//!
//! - Endpoint types/ids and the relationship type must be non-empty
//! - Relationships cannot be self-referential (`source != target`)
//!   unless the producing rule or add options explicitly permit it
//! - Confidence must be in `[0.0, 1.0]`

pub mod types;

pub use types::{
    Direction, MetadataUpdate, NewRelationship, Relationship, RelationshipMetadata,
    RelationshipUpdate,
};

use crate::error::{GraphError, ValidationError};

/// Validates the structural invariants of a materialized relationship.
///
/// Checks:
/// - Endpoint types/ids and the relationship type are non-empty
/// - Source and target are different items (no self-loops), unless
///   `allow_self_loops` is set
/// - Confidence is in the valid range [0.0, 1.0]
///
/// Does NOT run the injected collaborator validator or any duplicate
/// checks — those require store state and are handled by the
/// [`RelationshipStore`](crate::store::RelationshipStore) itself.
pub(crate) fn validate_relationship(
    rel: &Relationship,
    allow_self_loops: bool,
) -> Result<(), GraphError> {
    if rel.source.item_type.is_empty() || rel.source.id.is_empty() {
        return Err(ValidationError::required_field("source").into());
    }
    if rel.target.item_type.is_empty() || rel.target.id.is_empty() {
        return Err(ValidationError::required_field("target").into());
    }
    if rel.relationship_type.is_empty() {
        return Err(ValidationError::required_field("relationship_type").into());
    }

    if !allow_self_loops && rel.is_self_loop() {
        return Err(ValidationError::self_loop(&rel.source).into());
    }

    if !(0.0..=1.0).contains(&rel.confidence) {
        return Err(ValidationError::invalid_field(
            "confidence",
            format!("must be between 0.0 and 1.0, got {}", rel.confidence),
        )
        .into());
    }

    Ok(())
}
