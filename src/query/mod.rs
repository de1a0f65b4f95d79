//! Bounded graph-traversal queries.
//!
//! A [`GraphQuery`] names one or more root items, a traversal depth and
//! direction, relationship/endpoint filters, and optional sorting and
//! truncation. The [`GraphQueryEngine`] executes it read-only over a
//! [`RelationshipStore`](crate::store::RelationshipStore), caching
//! results by the SHA-256 of the query's canonical JSON form.
//!
//! Depth is bounded twice: queries beyond the *recommended* depth still
//! run but carry a warning; queries beyond the *hard* ceiling fail with
//! a limit error.

mod cache;
mod cancel;
mod engine;

pub use cancel::CancelToken;
pub use engine::{ExecuteOptions, GraphQueryEngine};

use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::error::{GraphError, LimitExceededError, ValidationError};
use crate::relationship::Relationship;
use crate::types::{ItemRef, PropertyMap, Timestamp};

/// The root selection of a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryRoots {
    /// Expand from a single root item.
    Single {
        /// The root item.
        node: ItemRef,
    },
    /// Expand independently from several roots, merging the results.
    Multiple {
        /// The root items.
        nodes: Vec<ItemRef>,
    },
    /// An opaque caller-defined query. Executed as an advisory no-op:
    /// the result is empty and carries an explicit warning, never a
    /// silent empty.
    Custom {
        /// Opaque query text.
        query: String,
    },
}

/// Which edges a traversal follows from a visited node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    /// Only edges where the node is the stored target.
    Inbound,
    /// Only edges where the node is the stored source.
    Outbound,
    /// Edges both ways, honoring each edge's own declared
    /// [`Direction`](crate::relationship::Direction) — a
    /// `source_to_target` edge is not walked backwards.
    #[default]
    Bidirectional,
    /// Edges both ways, ignoring their declared direction.
    All,
}

/// Result ordering applied before truncation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Descending confidence.
    Confidence,
    /// Descending creation timestamp (missing metadata sorts last).
    Created,
    /// A weighted blend: 70% confidence + 30% recency, recency
    /// min/max-normalized over the result set.
    Relevance,
}

/// Relationship and endpoint predicates applied during expansion.
///
/// Fields set to `None` are not filtered on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Only expand into endpoints of these item types.
    ///
    /// `None` means no endpoint filtering. An empty `Some(vec![])`
    /// matches nothing.
    pub item_types: Option<Vec<String>>,

    /// Only follow relationships with confidence >= this threshold.
    pub min_confidence: Option<f64>,

    /// Only follow relationships created at or after this timestamp.
    pub created_after: Option<Timestamp>,

    /// Only follow relationships created at or before this timestamp.
    pub created_before: Option<Timestamp>,

    /// Only follow relationships whose property bag contains all of
    /// these key/value pairs.
    pub properties: PropertyMap,
}

impl QueryFilters {
    /// Returns `true` if the relationship passes the edge-level filter
    /// criteria (endpoint types are checked separately).
    pub fn matches_relationship(&self, rel: &Relationship) -> bool {
        if let Some(min) = self.min_confidence {
            if rel.confidence < min {
                return false;
            }
        }

        if let Some(after) = self.created_after {
            if rel.created() < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if rel.created() > before {
                return false;
            }
        }

        for (key, expected) in &self.properties {
            if rel.properties.get(key) != Some(expected) {
                return false;
            }
        }

        true
    }

    /// Returns `true` if expansion may step onto an item of this type.
    pub fn allows_item_type(&self, item_type: &str) -> bool {
        self.item_types
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == item_type))
    }
}

/// A bounded traversal query.
///
/// # Example
///
/// ```rust
/// use relgraph::{GraphQuery, ItemRef, SortBy, TraversalDirection};
///
/// let query = GraphQuery::single(ItemRef::new("decision", "d1"))
///     .with_depth(2)
///     .with_direction(TraversalDirection::Outbound)
///     .with_sort(SortBy::Confidence)
///     .with_limit(50);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphQuery {
    /// Root selection.
    pub roots: QueryRoots,

    /// Traversal depth in relationship hops; the configured default
    /// when omitted.
    pub depth: Option<u32>,

    /// Which edges to follow. Defaults to bidirectional.
    pub direction: TraversalDirection,

    /// Only follow relationships of these types; `None` follows all.
    pub relationship_types: Option<Vec<String>>,

    /// Edge and endpoint predicates.
    pub filters: QueryFilters,

    /// Result ordering, applied before truncation.
    pub sort_by: Option<SortBy>,

    /// Result truncation; the configured default when omitted.
    pub limit: Option<usize>,
}

impl GraphQuery {
    /// A query expanding from a single root.
    pub fn single(node: ItemRef) -> Self {
        Self::with_roots(QueryRoots::Single { node })
    }

    /// A query expanding from several roots.
    pub fn multi(nodes: Vec<ItemRef>) -> Self {
        Self::with_roots(QueryRoots::Multiple { nodes })
    }

    /// An opaque custom query (executed as an advisory no-op).
    pub fn custom(query: impl Into<String>) -> Self {
        Self::with_roots(QueryRoots::Custom {
            query: query.into(),
        })
    }

    fn with_roots(roots: QueryRoots) -> Self {
        Self {
            roots,
            depth: None,
            direction: TraversalDirection::default(),
            relationship_types: None,
            filters: QueryFilters::default(),
            sort_by: None,
            limit: None,
        }
    }

    /// Sets the traversal depth (builder style).
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Sets the traversal direction (builder style).
    pub fn with_direction(mut self, direction: TraversalDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Restricts the followed relationship types (builder style).
    pub fn with_relationship_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationship_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the edge/endpoint filters (builder style).
    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the result ordering (builder style).
    pub fn with_sort(mut self, sort: SortBy) -> Self {
        self.sort_by = Some(sort);
        self
    }

    /// Sets the result limit (builder style).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One node of a query result graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// The item this node stands for.
    pub item: ItemRef,

    /// Hops from the nearest root (0 for roots).
    pub depth: u32,
}

/// Run accounting for a traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalStats {
    /// Nodes dequeued during expansion (across all roots).
    pub nodes_visited: usize,

    /// Relationships examined against the filters.
    pub relationships_examined: usize,

    /// True when the result limit truncated the relationship list.
    pub truncated: bool,
}

/// The graph a query produced.
///
/// Correctness is identical with and without caching; `from_cache`
/// only reports where the result came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResult {
    /// Result nodes: the roots plus every endpoint of a surviving
    /// relationship. Never contains a dangling reference.
    pub nodes: Vec<GraphNode>,

    /// Result relationships, deduplicated by ID.
    pub relationships: Vec<Relationship>,

    /// True when served from the query cache.
    pub from_cache: bool,

    /// Non-fatal notices (soft depth breach, cancellation, advisory
    /// custom queries).
    pub warnings: Vec<String>,

    /// Run accounting.
    pub stats: TraversalStats,
}

impl QueryResult {
    /// Looks up a result node by item.
    pub fn node(&self, item: &ItemRef) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.item == *item)
    }

    /// True if the result contains a node for the item.
    pub fn contains_node(&self, item: &ItemRef) -> bool {
        self.node(item).is_some()
    }
}

/// Validates a query against the configured bounds.
///
/// Returns the soft warnings to attach to the result. Hard breaches
/// (empty root list, zero or over-ceiling depth/limit) are errors.
pub(crate) fn validate_query(
    query: &GraphQuery,
    config: &QueryConfig,
) -> Result<Vec<String>, GraphError> {
    let mut warnings = Vec::new();

    if let QueryRoots::Multiple { nodes } = &query.roots {
        if nodes.is_empty() {
            return Err(ValidationError::required_field("start_nodes").into());
        }
    }

    if let Some(depth) = query.depth {
        if depth == 0 {
            return Err(
                ValidationError::invalid_field("depth", "must be a positive integer").into(),
            );
        }
        if depth > config.max_depth {
            return Err(LimitExceededError::Depth {
                requested: depth,
                max: config.max_depth,
            }
            .into());
        }
        if depth > config.recommended_depth {
            warnings.push(format!(
                "depth {depth} exceeds recommended {}; traversal may be expensive",
                config.recommended_depth
            ));
        }
    }

    if let Some(limit) = query.limit {
        if limit == 0 {
            return Err(
                ValidationError::invalid_field("limit", "must be a positive integer").into(),
            );
        }
        if limit > config.max_limit {
            return Err(LimitExceededError::ResultLimit {
                requested: limit,
                max: config.max_limit,
            }
            .into());
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::{Direction, RelationshipMetadata};
    use crate::types::RelationshipId;

    fn rel(confidence: f64) -> Relationship {
        let source = ItemRef::new("decision", "d1");
        let target = ItemRef::new("pattern", "p1");
        Relationship {
            id: RelationshipId::derive(&source, &target, "implements"),
            source,
            target,
            relationship_type: "implements".to_string(),
            direction: Direction::SourceToTarget,
            confidence,
            properties: PropertyMap::new(),
            metadata: Some(RelationshipMetadata::stamped("tester")),
        }
    }

    #[test]
    fn test_min_confidence_filter() {
        let filter = QueryFilters {
            min_confidence: Some(0.7),
            ..Default::default()
        };
        assert!(filter.matches_relationship(&rel(0.8)));
        assert!(!filter.matches_relationship(&rel(0.5)));
    }

    #[test]
    fn test_created_window_filter() {
        let r = rel(0.8);
        let created = r.created();

        let filter = QueryFilters {
            created_after: Some(Timestamp::from_millis(created.as_millis() + 1)),
            ..Default::default()
        };
        assert!(!filter.matches_relationship(&r));

        let filter = QueryFilters {
            created_after: Some(Timestamp::from_millis(created.as_millis() - 1)),
            created_before: Some(Timestamp::from_millis(created.as_millis() + 1)),
            ..Default::default()
        };
        assert!(filter.matches_relationship(&r));
    }

    #[test]
    fn test_property_filter_is_subset_match() {
        let mut r = rel(0.8);
        r.properties.insert("grade".into(), "a".into());
        r.properties.insert("reviewed".into(), true.into());

        let mut wanted = PropertyMap::new();
        wanted.insert("grade".into(), "a".into());
        let filter = QueryFilters {
            properties: wanted,
            ..Default::default()
        };
        assert!(filter.matches_relationship(&r));

        let mut wanted = PropertyMap::new();
        wanted.insert("grade".into(), "b".into());
        let filter = QueryFilters {
            properties: wanted,
            ..Default::default()
        };
        assert!(!filter.matches_relationship(&r));
    }

    #[test]
    fn test_item_type_filter() {
        let filter = QueryFilters {
            item_types: Some(vec!["decision".to_string()]),
            ..Default::default()
        };
        assert!(filter.allows_item_type("decision"));
        assert!(!filter.allows_item_type("pattern"));

        let open = QueryFilters::default();
        assert!(open.allows_item_type("anything"));
    }

    #[test]
    fn test_validate_rejects_empty_multi_roots() {
        let config = QueryConfig::default();
        let err = validate_query(&GraphQuery::multi(vec![]), &config).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_depth_bounds() {
        let config = QueryConfig::default();
        let query = GraphQuery::single(ItemRef::new("a", "1"));

        let err = validate_query(&query.clone().with_depth(0), &config).unwrap_err();
        assert!(err.is_validation());

        let err =
            validate_query(&query.clone().with_depth(config.max_depth + 1), &config).unwrap_err();
        assert!(err.is_limit());

        // Above recommended: runs with a warning.
        let warnings =
            validate_query(&query.clone().with_depth(config.max_depth), &config).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("recommended"));

        let warnings = validate_query(&query.with_depth(2), &config).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_limit_bounds() {
        let config = QueryConfig::default();
        let query = GraphQuery::single(ItemRef::new("a", "1"));

        assert!(validate_query(&query.clone().with_limit(0), &config).is_err());
        let err =
            validate_query(&query.clone().with_limit(config.max_limit + 1), &config).unwrap_err();
        assert!(err.is_limit());
        assert!(validate_query(&query.with_limit(10), &config).is_ok());
    }

    #[test]
    fn test_query_json_is_canonical() {
        let a = GraphQuery::single(ItemRef::new("decision", "d1")).with_depth(2);
        let b = GraphQuery::single(ItemRef::new("decision", "d1")).with_depth(2);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
