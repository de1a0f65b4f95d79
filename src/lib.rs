//! # relgraph
//!
//! Knowledge relationship graph engine: typed relationships between
//! knowledge items, declarative rule schemas that infer new
//! relationships from pools of candidate items, and depth-bounded
//! traversal queries with result caching.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relgraph::{
//!     Config, ContextItem, GraphQuery, ItemRef, KnowledgeGraph, MappingContext,
//!     MappingRule, MappingSchema, RuleCondition,
//! };
//!
//! let graph = KnowledgeGraph::new(Config::default())?;
//!
//! // Register a schema relating decisions to patterns they share tags with
//! graph.register_schema(
//!     MappingSchema::new("architecture", "1.0.0").with_rule(
//!         MappingRule::new("decision", "pattern", "implements")
//!             .with_condition(RuleCondition::SharedTags { min_count: 1 }),
//!     ),
//!     &Default::default(),
//! )?;
//!
//! // Discover relationships from a pool of candidate items
//! let ctx = MappingContext::new()
//!     .with_item(ContextItem::new("decision", "d1").with_tags(["scalability"]))
//!     .with_item(ContextItem::new("pattern", "p1").with_tags(["scalability"]));
//! let run = graph.apply_schema(&"architecture@1.0.0".into(), &ctx, &Default::default())?;
//!
//! // Traverse from a root, two hops out
//! let result = graph.execute(
//!     &GraphQuery::single(ItemRef::new("decision", "d1")).with_depth(2),
//!     &Default::default(),
//! )?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Relationship
//!
//! A **relationship** is a typed, directed-or-bidirectional edge between
//! two knowledge items, carrying a `[0, 1]` confidence score, an open
//! property bag, and versioned metadata. The
//! [`RelationshipStore`] owns the canonical records, three lookup
//! indices, deduplication, and optional version history.
//!
//! ### Schema
//!
//! A **schema** is a named, semantically versioned bundle of mapping
//! rules. Rules hold closed condition/scoring ASTs — never executable
//! code — evaluated against `(source item, target item, context)`.
//! The [`MappingEngine`] applies schemas to candidate item pools and
//! writes discoveries through the store.
//!
//! ### Query
//!
//! A **query** expands breadth-first from one or more roots, bounded by
//! depth and result limit, with relationship/endpoint filters and
//! optional sorting. The [`GraphQueryEngine`] caches results in a
//! time- and size-bounded cache; caching never affects correctness.
//!
//! ## Thread Safety
//!
//! All components are `Send + Sync`. The store serializes mutations
//! behind a single writer lock; reads run concurrently. The query
//! cache locks independently of the store.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod error;
mod graph;
mod types;

pub mod mapping;
pub mod query;
pub mod relationship;
pub mod schema;
pub mod store;
pub mod validate;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main facade
pub use graph::KnowledgeGraph;

// Configuration
pub use config::{Config, QueryConfig, DEPTH_CEILING, LIMIT_CEILING};

// Error handling
pub use error::{
    ConflictError, GraphError, LimitExceededError, NotFoundError, Result, ValidationError,
};

// Core types
pub use types::{
    lookup_path, ItemRef, PropertyMap, PropertyValue, RelationshipId, SchemaId, Timestamp,
};

// Relationships and the store
pub use relationship::{
    Direction, MetadataUpdate, NewRelationship, Relationship, RelationshipMetadata,
    RelationshipUpdate,
};
pub use store::{
    AddOptions, AddOutcome, ChangeKind, HistoryEntry, RelationshipStore, UpdateOptions,
    ValidateAllOptions, ValidationSweep,
};

// Schemas and mapping
pub use mapping::{
    ApplyOptions, ContextItem, MappingContext, MappingEngine, MappingRunSummary, RegisterOptions,
    SchemaRun,
};
pub use schema::{
    ConfidenceFormula, MappingRule, MappingSchema, PropertyMapping, RuleCondition, Taxonomy,
    TaxonomyTerm, ValueOrigin,
};

// Queries
pub use query::{
    CancelToken, ExecuteOptions, GraphNode, GraphQuery, GraphQueryEngine, QueryFilters,
    QueryResult, QueryRoots, SortBy, TraversalDirection, TraversalStats,
};

// Validator collaborators
pub use validate::{RelationshipValidator, StructuralValidator, ValidationReport};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common relgraph usage.
///
/// ```rust
/// use relgraph::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{GraphError, Result};
    pub use crate::graph::KnowledgeGraph;
    pub use crate::mapping::{ContextItem, MappingContext};
    pub use crate::query::{GraphQuery, SortBy, TraversalDirection};
    pub use crate::relationship::{Direction, NewRelationship, Relationship};
    pub use crate::schema::{MappingRule, MappingSchema, RuleCondition};
    pub use crate::types::{ItemRef, Timestamp};
}
