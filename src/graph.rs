//! The owning facade wiring the three components together.
//!
//! [`KnowledgeGraph`] validates a [`Config`] once and builds the shared
//! [`RelationshipStore`], the [`MappingEngine`], and the
//! [`GraphQueryEngine`] from it. The store is the single piece of
//! mutable shared state; both engines hold a handle to it, never a
//! copy.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use relgraph::{Config, KnowledgeGraph, NewRelationship, ItemRef};
//!
//! let graph = KnowledgeGraph::new(Config::default())?;
//!
//! graph.add_relationship(
//!     NewRelationship::new(
//!         ItemRef::new("decision", "d1"),
//!         ItemRef::new("pattern", "p1"),
//!         "implements",
//!     )
//!     .with_confidence(0.9),
//!     &Default::default(),
//! )?;
//!
//! let result = graph.execute(
//!     &relgraph::GraphQuery::single(ItemRef::new("decision", "d1")),
//!     &Default::default(),
//! )?;
//! ```

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::Config;
use crate::error::{GraphError, Result};
use crate::mapping::{ApplyOptions, MappingContext, MappingEngine, MappingRunSummary, SchemaRun};
use crate::query::{ExecuteOptions, GraphQuery, GraphQueryEngine, QueryResult};
use crate::relationship::NewRelationship;
use crate::schema::MappingSchema;
use crate::store::{AddOptions, AddOutcome, RelationshipStore};
use crate::types::SchemaId;
use crate::validate::RelationshipValidator;

/// The assembled knowledge relationship graph engine.
///
/// Construction validates the configuration; the parts share one
/// relationship store. For anything beyond the delegating conveniences
/// below, reach the parts through [`store()`](Self::store),
/// [`mapping()`](Self::mapping), and [`query()`](Self::query).
pub struct KnowledgeGraph {
    store: Arc<RelationshipStore>,
    mapping: MappingEngine,
    query: GraphQueryEngine,
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("relationships", &self.store.len())
            .field("schemas", &self.mapping.schema_ids().len())
            .finish_non_exhaustive()
    }
}

impl KnowledgeGraph {
    /// Builds an engine with the bundled structural validator.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when the configuration is invalid
    /// (see [`Config::validate`]).
    #[instrument(skip(config))]
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(GraphError::from)?;

        let store = Arc::new(RelationshipStore::new(config.clone()));
        let graph = Self {
            mapping: MappingEngine::new(config.clone(), Arc::clone(&store)),
            query: GraphQueryEngine::new(config, Arc::clone(&store)),
            store,
        };

        info!("knowledge graph initialized");
        Ok(graph)
    }

    /// Builds an engine with an injected validator collaborator,
    /// shared by the store (relationship hook), the mapping engine
    /// (schema hook), and the query engine (query hook).
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when the configuration is invalid.
    pub fn with_validator(
        config: Config,
        validator: Arc<dyn RelationshipValidator>,
    ) -> Result<Self> {
        config.validate().map_err(GraphError::from)?;

        let store = Arc::new(RelationshipStore::with_validator(
            config.clone(),
            Arc::clone(&validator),
        ));
        Ok(Self {
            mapping: MappingEngine::with_validator(
                config.clone(),
                Arc::clone(&store),
                Arc::clone(&validator),
            ),
            query: GraphQueryEngine::with_validator(config, Arc::clone(&store), validator),
            store,
        })
    }

    /// The shared relationship store.
    pub fn store(&self) -> &RelationshipStore {
        &self.store
    }

    /// A cloneable handle to the shared store.
    pub fn store_handle(&self) -> Arc<RelationshipStore> {
        Arc::clone(&self.store)
    }

    /// The mapping engine.
    pub fn mapping(&self) -> &MappingEngine {
        &self.mapping
    }

    /// The query engine.
    pub fn query(&self) -> &GraphQueryEngine {
        &self.query
    }

    // =========================================================================
    // Delegating conveniences
    // =========================================================================

    /// Adds a relationship. See [`RelationshipStore::add`].
    pub fn add_relationship(&self, new: NewRelationship, opts: &AddOptions) -> Result<AddOutcome> {
        self.store.add(new, opts)
    }

    /// Registers a mapping schema. See
    /// [`MappingEngine::register_schema`].
    pub fn register_schema(
        &self,
        schema: MappingSchema,
        opts: &crate::mapping::RegisterOptions,
    ) -> Result<SchemaId> {
        self.mapping.register_schema(schema, opts)
    }

    /// Applies one schema. See [`MappingEngine::apply_schema`].
    pub fn apply_schema(
        &self,
        schema_id: &SchemaId,
        ctx: &MappingContext,
        opts: &ApplyOptions,
    ) -> Result<SchemaRun> {
        self.mapping.apply_schema(schema_id, ctx, opts)
    }

    /// Applies every registered schema. See
    /// [`MappingEngine::apply_all_schemas`].
    pub fn apply_all_schemas(&self, ctx: &MappingContext, opts: &ApplyOptions) -> MappingRunSummary {
        self.mapping.apply_all_schemas(ctx, opts)
    }

    /// Executes a traversal query. See [`GraphQueryEngine::execute`].
    pub fn execute(&self, query: &GraphQuery, opts: &ExecuteOptions) -> Result<QueryResult> {
        self.query.execute(query, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemRef;

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            default_confidence: 2.0,
            ..Default::default()
        };
        let err = KnowledgeGraph::new(config).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_components_share_one_store() {
        let graph = KnowledgeGraph::new(Config::default()).unwrap();
        graph
            .add_relationship(
                NewRelationship::new(
                    ItemRef::new("decision", "d1"),
                    ItemRef::new("pattern", "p1"),
                    "implements",
                ),
                &AddOptions::default(),
            )
            .unwrap();

        // The query engine reads the same store the facade wrote to.
        let result = graph
            .execute(
                &GraphQuery::single(ItemRef::new("decision", "d1")),
                &ExecuteOptions::default(),
            )
            .unwrap();
        assert_eq!(result.relationships.len(), 1);
        assert_eq!(graph.store().len(), 1);
    }
}
