//! Data types for relationship records.
//!
//! A relationship is a typed edge between two knowledge items. Records
//! are immutable values outside the store: mutation happens only through
//! [`RelationshipStore::update`](crate::store::RelationshipStore::update),
//! which snapshots the prior version before applying a partial update.

use serde::{Deserialize, Serialize};

use crate::types::{ItemRef, PropertyMap, RelationshipId, Timestamp};

/// Logical direction of a relationship.
///
/// Edges are stored once, source to target; `Direction` records whether
/// the semantics also hold in reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The relationship reads the same from either endpoint.
    Bidirectional,
    /// The relationship holds only from source to target.
    SourceToTarget,
    /// The relationship holds only from target to source.
    TargetToSource,
}

/// Bookkeeping metadata stamped on stored relationships.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    /// When the record was created.
    pub created: Timestamp,

    /// Who created the record (free-form; defaults to the configured
    /// engine identity under auto-metadata).
    pub created_by: String,

    /// Optimistic version counter, starting at 1 and incremented by
    /// each update unless suppressed.
    pub version: u32,

    /// When the record was last updated, if ever.
    pub last_updated: Option<Timestamp>,

    /// When the record last passed a validation sweep, if ever.
    pub last_validated: Option<Timestamp>,
}

impl RelationshipMetadata {
    /// Creates version-1 metadata stamped at the current moment.
    pub fn stamped(created_by: impl Into<String>) -> Self {
        Self {
            created: Timestamp::now(),
            created_by: created_by.into(),
            version: 1,
            last_updated: None,
            last_validated: None,
        }
    }
}

/// A stored relationship between two knowledge items.
///
/// # Uniqueness
///
/// Under the default deduplication policy the combination
/// `(source, target, relationship_type)` is unique — adding the same
/// logical edge twice returns the existing record instead of creating
/// a duplicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier, deterministically derived from the endpoints
    /// and type unless supplied by the caller.
    pub id: RelationshipId,

    /// The item this relationship originates from.
    pub source: ItemRef,

    /// The item this relationship points to.
    pub target: ItemRef,

    /// The kind of relationship (e.g. "implements", "depends_on").
    pub relationship_type: String,

    /// Logical direction of the edge.
    pub direction: Direction,

    /// Discovery certainty in `[0.0, 1.0]`.
    pub confidence: f64,

    /// Open property bag (e.g. `strength`, `description`, `tags`).
    pub properties: PropertyMap,

    /// Bookkeeping metadata; absent only when auto-metadata is disabled
    /// and the caller supplied none.
    pub metadata: Option<RelationshipMetadata>,
}

impl Relationship {
    /// Returns true if both endpoints reference the same item.
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Current metadata version, or 0 when no metadata is attached.
    pub fn version(&self) -> u32 {
        self.metadata.as_ref().map_or(0, |m| m.version)
    }

    /// Creation timestamp, or the epoch when no metadata is attached.
    pub fn created(&self) -> Timestamp {
        self.metadata.as_ref().map_or(Timestamp::epoch(), |m| m.created)
    }
}

/// Input record for [`RelationshipStore::add`](crate::store::RelationshipStore::add).
///
/// Optional fields are filled in by the store: an omitted ID is derived
/// from the endpoints and type, an omitted direction defaults to
/// bidirectional (with a warning), and omitted metadata is stamped when
/// auto-metadata is enabled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewRelationship {
    /// Explicit ID; derived from `(source, target, type)` when `None`.
    pub id: Option<RelationshipId>,

    /// The item this relationship originates from.
    pub source: ItemRef,

    /// The item this relationship points to.
    pub target: ItemRef,

    /// The kind of relationship.
    pub relationship_type: String,

    /// Logical direction; defaults to bidirectional when omitted.
    pub direction: Option<Direction>,

    /// Discovery certainty in `[0.0, 1.0]`.
    pub confidence: f64,

    /// Open property bag.
    pub properties: PropertyMap,

    /// Explicit metadata; stamped by the store when `None` and
    /// auto-metadata is enabled.
    pub metadata: Option<RelationshipMetadata>,
}

impl NewRelationship {
    /// Creates an input record with confidence 1.0 and everything else
    /// left for the store to fill in.
    pub fn new(source: ItemRef, target: ItemRef, relationship_type: impl Into<String>) -> Self {
        Self {
            id: None,
            source,
            target,
            relationship_type: relationship_type.into(),
            direction: None,
            confidence: 1.0,
            properties: PropertyMap::new(),
            metadata: None,
        }
    }

    /// Sets the confidence score.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Sets the direction explicitly.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Adds a single property.
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<crate::types::PropertyValue>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Partial update for [`RelationshipStore::update`](crate::store::RelationshipStore::update).
///
/// Fields set to `None` are left unchanged. `properties` replaces the
/// whole bag when present (the merge is shallow); metadata fields are
/// merged separately and version/created stamps are store-managed.
///
/// # Example
///
/// ```rust,ignore
/// use relgraph::RelationshipUpdate;
///
/// let update = RelationshipUpdate {
///     confidence: Some(0.95),
///     ..Default::default()
/// };
/// store.update(&id, update, &Default::default())?;
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RelationshipUpdate {
    /// New source endpoint.
    pub source: Option<ItemRef>,

    /// New target endpoint.
    pub target: Option<ItemRef>,

    /// New relationship type.
    pub relationship_type: Option<String>,

    /// New direction.
    pub direction: Option<Direction>,

    /// New confidence score.
    pub confidence: Option<f64>,

    /// Replacement property bag.
    pub properties: Option<PropertyMap>,

    /// Caller-updatable metadata fields.
    pub metadata: Option<MetadataUpdate>,
}

/// Caller-updatable subset of [`RelationshipMetadata`].
///
/// `created` and `version` are managed by the store and cannot be set
/// through an update.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetadataUpdate {
    /// New `created_by` attribution.
    pub created_by: Option<String>,

    /// New `last_validated` stamp.
    pub last_validated: Option<Timestamp>,
}
