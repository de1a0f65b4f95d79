//! Query execution: bounded BFS over the relationship store.
//!
//! Expansion is breadth-first per root with a visited set, so traversal
//! terminates on cycles and no returned node sits more than `depth`
//! hops from a root. Multi-root queries expand each root independently
//! and merge nodes (minimum depth wins) and relationships (deduplicated
//! by ID).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{Result, ValidationError};
use crate::query::cache::{query_cache_key, QueryCache};
use crate::query::{
    validate_query, CancelToken, GraphNode, GraphQuery, QueryResult, QueryRoots, SortBy,
    TraversalDirection, TraversalStats,
};
use crate::relationship::{Direction, Relationship};
use crate::store::RelationshipStore;
use crate::types::{ItemRef, RelationshipId};
use crate::validate::{RelationshipValidator, StructuralValidator};

/// Options for [`GraphQueryEngine::execute`].
#[derive(Clone, Debug)]
pub struct ExecuteOptions {
    /// Serve an unexpired cached result when one exists.
    pub use_cache: bool,

    /// Store the computed result in the cache.
    pub update_cache: bool,

    /// Cooperative cancellation; a cancelled traversal returns the
    /// partial result with a warning.
    pub cancel: Option<CancelToken>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            update_cache: true,
            cancel: None,
        }
    }
}

/// Read-only, depth-bounded traversal over a shared
/// [`RelationshipStore`].
///
/// The engine owns the query cache; the cache lock is independent of
/// the store lock and the two are never held together.
pub struct GraphQueryEngine {
    store: Arc<RelationshipStore>,
    cache: Option<QueryCache>,
    validator: Arc<dyn RelationshipValidator>,
    config: crate::config::QueryConfig,
}

impl std::fmt::Debug for GraphQueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQueryEngine")
            .field("cache_enabled", &self.cache.is_some())
            .field("max_depth", &self.config.max_depth)
            .finish_non_exhaustive()
    }
}

impl GraphQueryEngine {
    /// Creates an engine reading from the given store, with the
    /// bundled accept-all query hook.
    pub fn new(config: Config, store: Arc<RelationshipStore>) -> Self {
        Self::with_validator(config, store, Arc::new(StructuralValidator))
    }

    /// Creates an engine with an injected validator collaborator; its
    /// query hook runs before every traversal.
    pub fn with_validator(
        config: Config,
        store: Arc<RelationshipStore>,
        validator: Arc<dyn RelationshipValidator>,
    ) -> Self {
        let query_config = config.query;
        let cache = query_config
            .cache_enabled
            .then(|| QueryCache::new(query_config.cache_capacity, query_config.cache_ttl_ms));
        Self {
            store,
            cache,
            validator,
            config: query_config,
        }
    }

    /// Executes a query.
    ///
    /// Validates the query, serves an unexpired cache hit when allowed
    /// (`from_cache = true`), otherwise traverses, post-processes
    /// (sort, truncate, rebuild the node set), and optionally caches
    /// the result. Soft breaches (depth beyond recommended,
    /// cancellation) surface as warnings on the still-computed result.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed query (no roots, zero
    ///   depth/limit)
    /// - `LimitExceededError` for a depth or limit beyond the hard
    ///   ceiling
    #[instrument(skip(self, query, opts))]
    pub fn execute(&self, query: &GraphQuery, opts: &ExecuteOptions) -> Result<QueryResult> {
        let mut warnings = validate_query(query, &self.config)?;

        let report = self.validator.validate_query(query)?;
        if !report.valid {
            return Err(ValidationError::rejected(report.errors).into());
        }

        // Custom queries are advisory: explicit warning, never a silent
        // empty, never cached.
        if let QueryRoots::Custom { query: custom } = &query.roots {
            warnings.push(format!(
                "custom query '{custom}' is not supported; returning an empty result"
            ));
            return Ok(QueryResult {
                nodes: Vec::new(),
                relationships: Vec::new(),
                from_cache: false,
                warnings,
                stats: TraversalStats::default(),
            });
        }

        let key = query_cache_key(query);
        if opts.use_cache {
            if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
                debug!("query served from cache");
                let mut result = hit;
                result.from_cache = true;
                return Ok(result);
            }
        }

        let roots: Vec<ItemRef> = match &query.roots {
            QueryRoots::Single { node } => vec![node.clone()],
            QueryRoots::Multiple { nodes } => nodes.clone(),
            QueryRoots::Custom { .. } => Vec::new(),
        };
        let depth = query.depth.unwrap_or(self.config.default_depth);
        let limit = query.limit.unwrap_or(self.config.default_limit);

        let mut nodes: HashMap<ItemRef, u32> = HashMap::new();
        let mut relationships: Vec<Relationship> = Vec::new();
        let mut seen: HashSet<RelationshipId> = HashSet::new();
        let mut stats = TraversalStats::default();
        let mut cancelled = false;

        for root in &roots {
            if cancelled {
                break;
            }
            cancelled = self.expand_root(
                root,
                depth,
                query,
                &mut nodes,
                &mut relationships,
                &mut seen,
                &mut stats,
                opts.cancel.as_ref(),
            );
        }
        if cancelled {
            warnings.push("traversal cancelled; result is partial".to_string());
        }

        if let Some(sort) = query.sort_by {
            sort_relationships(&mut relationships, sort);
        }
        if relationships.len() > limit {
            relationships.truncate(limit);
            stats.truncated = true;
        }

        let result = QueryResult {
            nodes: rebuild_nodes(&roots, &relationships, &nodes),
            relationships,
            from_cache: false,
            warnings,
            stats,
        };

        if opts.update_cache {
            if let Some(cache) = &self.cache {
                cache.put(key, result.clone());
            }
        }
        Ok(result)
    }

    /// Drops every cached result.
    pub fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Number of cached results (0 when caching is disabled).
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, QueryCache::len)
    }

    /// Breadth-first expansion from one root. Returns `true` when the
    /// token cancelled the traversal mid-way.
    #[allow(clippy::too_many_arguments)]
    fn expand_root(
        &self,
        root: &ItemRef,
        depth: u32,
        query: &GraphQuery,
        nodes: &mut HashMap<ItemRef, u32>,
        relationships: &mut Vec<Relationship>,
        seen: &mut HashSet<RelationshipId>,
        stats: &mut TraversalStats,
        cancel: Option<&CancelToken>,
    ) -> bool {
        let mut visited: HashMap<ItemRef, u32> = HashMap::new();
        let mut queue: VecDeque<(ItemRef, u32)> = VecDeque::new();
        visited.insert(root.clone(), 0);
        queue.push_back((root.clone(), 0));
        let mut cancelled = false;

        while let Some((item, item_depth)) = queue.pop_front() {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                cancelled = true;
                break;
            }
            stats.nodes_visited += 1;
            if item_depth >= depth {
                continue;
            }

            for (rel, neighbor) in self.neighbors(&item, query.direction) {
                stats.relationships_examined += 1;

                if let Some(types) = &query.relationship_types {
                    if !types.iter().any(|t| *t == rel.relationship_type) {
                        continue;
                    }
                }
                if !query.filters.matches_relationship(&rel) {
                    continue;
                }
                if !query.filters.allows_item_type(&neighbor.item_type) {
                    continue;
                }

                if seen.insert(rel.id.clone()) {
                    relationships.push(rel);
                }
                if !visited.contains_key(&neighbor) {
                    visited.insert(neighbor.clone(), item_depth + 1);
                    queue.push_back((neighbor, item_depth + 1));
                }
            }
        }

        // Merge this root's reach into the shared node map; the
        // shallowest depth across roots wins.
        for (item, item_depth) in visited {
            nodes
                .entry(item)
                .and_modify(|existing| *existing = (*existing).min(item_depth))
                .or_insert(item_depth);
        }

        cancelled
    }

    /// The edges leaving `item` under the traversal direction policy,
    /// paired with the far endpoint.
    fn neighbors(
        &self,
        item: &ItemRef,
        direction: TraversalDirection,
    ) -> Vec<(Relationship, ItemRef)> {
        let outgoing = || self.store.find_by_source(&item.item_type, &item.id);
        let incoming = || self.store.find_by_target(&item.item_type, &item.id);

        let mut edges = Vec::new();
        match direction {
            TraversalDirection::Outbound => {
                for rel in outgoing() {
                    let far = rel.target.clone();
                    edges.push((rel, far));
                }
            }
            TraversalDirection::Inbound => {
                for rel in incoming() {
                    let far = rel.source.clone();
                    edges.push((rel, far));
                }
            }
            TraversalDirection::Bidirectional => {
                // Both ways, honoring each edge's declared direction.
                for rel in outgoing() {
                    if rel.direction != Direction::TargetToSource {
                        let far = rel.target.clone();
                        edges.push((rel, far));
                    }
                }
                for rel in incoming() {
                    if rel.direction != Direction::SourceToTarget {
                        let far = rel.source.clone();
                        edges.push((rel, far));
                    }
                }
            }
            TraversalDirection::All => {
                for rel in outgoing() {
                    let far = rel.target.clone();
                    edges.push((rel, far));
                }
                for rel in incoming() {
                    let far = rel.source.clone();
                    edges.push((rel, far));
                }
            }
        }
        edges
    }
}

/// Sorts relationships in place for the requested ordering.
fn sort_relationships(relationships: &mut [Relationship], sort: SortBy) {
    use std::cmp::Ordering;

    match sort {
        SortBy::Confidence => relationships.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        }),
        SortBy::Created => relationships.sort_by(|a, b| b.created().cmp(&a.created())),
        SortBy::Relevance => {
            let (min, max) = relationships.iter().fold((i64::MAX, i64::MIN), |acc, rel| {
                let created = rel.created().as_millis();
                (acc.0.min(created), acc.1.max(created))
            });
            let range = (max - min) as f64;
            let score = |rel: &Relationship| {
                let recency = if range > 0.0 {
                    (rel.created().as_millis() - min) as f64 / range
                } else {
                    0.0
                };
                0.7 * rel.confidence + 0.3 * recency
            };
            relationships.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
        }
    }
}

/// The final node set: the roots plus the endpoints of surviving
/// relationships — never a dangling reference, never a dropped root.
fn rebuild_nodes(
    roots: &[ItemRef],
    relationships: &[Relationship],
    depths: &HashMap<ItemRef, u32>,
) -> Vec<GraphNode> {
    let mut kept = Vec::new();
    let mut kept_set: HashSet<&ItemRef> = HashSet::new();

    for root in roots {
        if kept_set.insert(root) {
            kept.push(GraphNode {
                item: root.clone(),
                depth: 0,
            });
        }
    }
    for rel in relationships {
        for endpoint in [&rel.source, &rel.target] {
            if kept_set.insert(endpoint) {
                kept.push(GraphNode {
                    item: endpoint.clone(),
                    depth: depths.get(endpoint).copied().unwrap_or(1),
                });
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::NewRelationship;
    use crate::store::AddOptions;
    use crate::Config;

    fn chain_store() -> Arc<RelationshipStore> {
        // a -> b -> c -> d, directed edges.
        let store = Arc::new(RelationshipStore::new(Config::default()));
        for (src, tgt) in [("a", "b"), ("b", "c"), ("c", "d")] {
            store
                .add(
                    NewRelationship::new(
                        ItemRef::new("node", src),
                        ItemRef::new("node", tgt),
                        "links",
                    )
                    .with_direction(Direction::SourceToTarget),
                    &AddOptions::default(),
                )
                .unwrap();
        }
        store
    }

    fn engine_for(store: Arc<RelationshipStore>) -> GraphQueryEngine {
        GraphQueryEngine::new(Config::default(), store)
    }

    #[test]
    fn test_outbound_neighbors_follow_source_index() {
        let engine = engine_for(chain_store());
        let edges = engine.neighbors(&ItemRef::new("node", "b"), TraversalDirection::Outbound);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].1, ItemRef::new("node", "c"));

        let edges = engine.neighbors(&ItemRef::new("node", "b"), TraversalDirection::Inbound);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].1, ItemRef::new("node", "a"));
    }

    #[test]
    fn test_bidirectional_honors_edge_direction() {
        let engine = engine_for(chain_store());
        // b's incoming edge a->b is source_to_target: walking backwards
        // is not allowed under Bidirectional.
        let edges = engine.neighbors(&ItemRef::new("node", "b"), TraversalDirection::Bidirectional);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].1, ItemRef::new("node", "c"));

        // All ignores the declared direction.
        let edges = engine.neighbors(&ItemRef::new("node", "b"), TraversalDirection::All);
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_sort_by_confidence_descending() {
        let store = Arc::new(RelationshipStore::new(Config::default()));
        for (tgt, confidence) in [("x", 0.3), ("y", 0.9), ("z", 0.6)] {
            store
                .add(
                    NewRelationship::new(
                        ItemRef::new("node", "root"),
                        ItemRef::new("node", tgt),
                        "links",
                    )
                    .with_direction(Direction::SourceToTarget)
                    .with_confidence(confidence),
                    &AddOptions::default(),
                )
                .unwrap();
        }
        let engine = engine_for(store);

        let query = GraphQuery::single(ItemRef::new("node", "root"))
            .with_direction(TraversalDirection::Outbound)
            .with_sort(SortBy::Confidence);
        let result = engine.execute(&query, &ExecuteOptions::default()).unwrap();
        let confidences: Vec<f64> = result.relationships.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.6, 0.3]);
    }

    #[test]
    fn test_relevance_handles_equal_timestamps() {
        let mut rels = chain_store().all();
        // All creation stamps are near-identical; sorting must not
        // panic and ends up confidence-dominated.
        sort_relationships(&mut rels, SortBy::Relevance);
        assert_eq!(rels.len(), 3);
    }

    #[test]
    fn test_rebuild_nodes_keeps_roots_and_drops_dangling() {
        let roots = vec![ItemRef::new("node", "a")];
        let store = chain_store();
        let all = store.all();
        let a_to_b = all
            .iter()
            .find(|rel| rel.source.id == "a")
            .cloned()
            .unwrap();

        let mut depths = HashMap::new();
        depths.insert(ItemRef::new("node", "a"), 0);
        depths.insert(ItemRef::new("node", "b"), 1);
        depths.insert(ItemRef::new("node", "c"), 2);

        let nodes = rebuild_nodes(&roots, &[a_to_b], &depths);
        // c was visited but its relationship did not survive: dropped.
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().any(|n| n.item.id == "a" && n.depth == 0));
        assert!(nodes.iter().any(|n| n.item.id == "b" && n.depth == 1));
    }
}
