//! Schema registration and relationship discovery.
//!
//! The [`MappingEngine`] owns registered [`MappingSchema`]s and applies
//! them against a [`MappingContext`] — pools of candidate items keyed by
//! item type. For every rule it walks the cross-product of the rule's
//! source and target pools, evaluates the rule condition, scores the
//! pair, and (above the confidence threshold) materializes a
//! relationship, persisting it through the
//! [`RelationshipStore`](crate::store::RelationshipStore) unless the run
//! is a dry run.
//!
//! Individual pair failures — validator rejections, duplicate skips —
//! are counted outcomes inside a successful run, never fatal. Only
//! schema-level problems (unknown ID, invalid shape) fail a run.

pub mod context;
pub mod report;

pub use context::{ContextItem, MappingContext};
pub use report::{MappingRunSummary, SchemaRun};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{ConflictError, NotFoundError, Result, ValidationError};
use crate::relationship::{Direction, NewRelationship, Relationship};
use crate::schema::{validate_schema_shape, MappingRule, MappingSchema};
use crate::store::{AddOptions, AddOutcome, RelationshipStore};
use crate::types::{PropertyMap, SchemaId};
use crate::validate::{RelationshipValidator, StructuralValidator};

/// Options for [`MappingEngine::register_schema`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisterOptions {
    /// Replace a schema already registered under the same ID.
    pub overwrite: bool,
}

/// Options for [`MappingEngine::apply_schema`] and
/// [`MappingEngine::apply_all_schemas`].
#[derive(Clone, Copy, Debug)]
pub struct ApplyOptions {
    /// Discover without persisting anything.
    pub dry_run: bool,

    /// Minimum (clamped) confidence a pair must score to produce a
    /// relationship. Default: 0.0 — every matching pair qualifies.
    pub confidence_threshold: f64,

    /// Stop discovering once this many relationships have been found
    /// across all rules. Reported as a soft limit, not an error.
    pub max_relationships: Option<usize>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            confidence_threshold: 0.0,
            max_relationships: None,
        }
    }
}

/// Discovers relationships by applying registered schemas to candidate
/// item pools.
///
/// The engine holds its schema registry behind its own lock and writes
/// discoveries through a shared [`RelationshipStore`] handle.
pub struct MappingEngine {
    schemas: RwLock<HashMap<SchemaId, MappingSchema>>,
    store: Arc<RelationshipStore>,
    validator: Arc<dyn RelationshipValidator>,
    config: Config,
}

impl std::fmt::Debug for MappingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingEngine")
            .field("schemas", &self.schema_ids())
            .finish_non_exhaustive()
    }
}

impl MappingEngine {
    /// Creates an engine writing discoveries to the given store, with
    /// the bundled accept-all schema hook.
    pub fn new(config: Config, store: Arc<RelationshipStore>) -> Self {
        Self::with_validator(config, store, Arc::new(StructuralValidator))
    }

    /// Creates an engine with an injected validator collaborator; its
    /// schema hook runs at registration time.
    pub fn with_validator(
        config: Config,
        store: Arc<RelationshipStore>,
        validator: Arc<dyn RelationshipValidator>,
    ) -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            store,
            validator,
            config,
        }
    }

    // =========================================================================
    // Schema registry
    // =========================================================================

    /// Registers a schema.
    ///
    /// The schema's shape is validated (see the
    /// [`schema` module docs](crate::schema)) and an omitted ID defaults
    /// to `"{name}@{version}"`.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the shape is invalid
    /// - `ConflictError` if the ID is already registered and overwrite
    ///   was not requested
    #[instrument(skip(self, schema, opts), fields(name = %schema.name))]
    pub fn register_schema(
        &self,
        mut schema: MappingSchema,
        opts: &RegisterOptions,
    ) -> Result<SchemaId> {
        validate_schema_shape(&schema)?;

        let report = self.validator.validate_schema(&schema)?;
        if !report.valid {
            return Err(ValidationError::rejected(report.errors).into());
        }

        let id = schema
            .id
            .clone()
            .unwrap_or_else(|| SchemaId::derive(&schema.name, &schema.version));
        schema.id = Some(id.clone());

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        if schemas.contains_key(&id) && !opts.overwrite {
            return Err(ConflictError::Schema(id).into());
        }
        schemas.insert(id.clone(), schema);

        info!(id = %id, "schema registered");
        Ok(id)
    }

    /// Retrieves a registered schema by ID.
    pub fn schema(&self, id: &SchemaId) -> Option<MappingSchema> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// IDs of all registered schemas, sorted.
    pub fn schema_ids(&self) -> Vec<SchemaId> {
        let mut ids: Vec<SchemaId> = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Unregisters a schema. Returns `false` if the ID was unknown.
    pub fn remove_schema(&self, id: &SchemaId) -> bool {
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    // =========================================================================
    // Application
    // =========================================================================

    /// Applies one schema against a context.
    ///
    /// Walks each rule's source × target cross-product (skipping
    /// same-item pairs unless the rule allows self references),
    /// evaluates the condition, scores qualifying pairs, and persists
    /// discoveries through the store unless `dry_run`. Stops early at
    /// `max_relationships`, reporting `limit_reached`.
    ///
    /// # Errors
    ///
    /// - `NotFoundError` if the schema ID is not registered
    ///
    /// Pair-level failures are counted in the returned [`SchemaRun`],
    /// never raised.
    #[instrument(skip(self, ctx, opts), fields(schema = %schema_id))]
    pub fn apply_schema(
        &self,
        schema_id: &SchemaId,
        ctx: &MappingContext,
        opts: &ApplyOptions,
    ) -> Result<SchemaRun> {
        let schema = self
            .schema(schema_id)
            .ok_or_else(|| NotFoundError::Schema(schema_id.clone()))?;

        let mut run = SchemaRun::new(schema_id.clone(), opts.dry_run);

        'rules: for rule in &schema.rules {
            let sources = ctx.pool(&rule.source_type);
            let targets = ctx.pool(&rule.target_type);

            for source in sources {
                for target in targets {
                    if at_limit(&run, opts) {
                        run.limit_reached = true;
                        break 'rules;
                    }

                    let same_item =
                        source.item_type == target.item_type && source.id == target.id;
                    if same_item && !rule.allow_self_references {
                        continue;
                    }

                    run.pairs_evaluated += 1;

                    if !rule.condition.evaluate(source, target, ctx) {
                        continue;
                    }

                    let confidence = self.score_pair(rule, source, target, ctx);
                    if confidence < opts.confidence_threshold {
                        continue;
                    }

                    let new = self.materialize_pair(rule, source, target, ctx, confidence);
                    self.record_discovery(&mut run, rule, new, opts);
                }
            }
        }

        info!(
            discovered = run.discovered.len(),
            created = run.created,
            deduplicated = run.deduplicated,
            skipped = run.skipped_validation,
            pairs = run.pairs_evaluated,
            limit_reached = run.limit_reached,
            "schema applied"
        );
        Ok(run)
    }

    /// Applies every registered schema, aggregating per-schema runs.
    ///
    /// A failure in one schema's application is recorded in the summary
    /// and does not abort the others.
    #[instrument(skip(self, ctx, opts))]
    pub fn apply_all_schemas(&self, ctx: &MappingContext, opts: &ApplyOptions) -> MappingRunSummary {
        let mut summary = MappingRunSummary::default();
        for id in self.schema_ids() {
            match self.apply_schema(&id, ctx, opts) {
                Ok(run) => summary.runs.push(run),
                Err(err) => {
                    warn!(schema = %id, error = %err, "schema application failed");
                    summary.failures.push((id, err.to_string()));
                }
            }
        }
        summary
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Scores a qualifying pair: formula, else rule default, else the
    /// engine-wide default — always clamped to `[0, 1]`.
    fn score_pair(
        &self,
        rule: &MappingRule,
        source: &ContextItem,
        target: &ContextItem,
        ctx: &MappingContext,
    ) -> f64 {
        rule.confidence
            .as_ref()
            .and_then(|formula| formula.evaluate(source, target, ctx))
            .or(rule.default_confidence)
            .unwrap_or(self.config.default_confidence)
            .clamp(0.0, 1.0)
    }

    /// Builds the relationship input for a discovered pair. Property
    /// mappings that fail to resolve are omitted, never fatal.
    fn materialize_pair(
        &self,
        rule: &MappingRule,
        source: &ContextItem,
        target: &ContextItem,
        ctx: &MappingContext,
        confidence: f64,
    ) -> NewRelationship {
        let mut properties = PropertyMap::new();
        for mapping in &rule.property_mappings {
            if let Some(value) = mapping.resolve(source, target, ctx) {
                properties.insert(mapping.key.clone(), value);
            }
        }

        NewRelationship {
            id: None,
            source: source.item_ref(),
            target: target.item_ref(),
            relationship_type: rule.relationship_type.clone(),
            // Rules are directional by construction: source type to
            // target type.
            direction: Some(Direction::SourceToTarget),
            confidence,
            properties,
            metadata: None,
        }
    }

    /// Persists (or, on a dry run, records) a discovery, counting the
    /// outcome.
    fn record_discovery(
        &self,
        run: &mut SchemaRun,
        rule: &MappingRule,
        new: NewRelationship,
        opts: &ApplyOptions,
    ) {
        if opts.dry_run {
            run.discovered.push(provisional_record(&new));
            return;
        }

        let add_opts = AddOptions {
            overwrite_existing: rule.overwrite_existing,
            allow_self_loops: rule.allow_self_references,
            skip_validation: false,
        };
        match self.store.add(new, &add_opts) {
            Ok(AddOutcome::Created(rel)) => {
                run.created += 1;
                run.discovered.push(rel);
            }
            Ok(AddOutcome::Deduplicated(rel)) => {
                run.deduplicated += 1;
                run.discovered.push(rel);
            }
            Err(err) => {
                debug!(error = %err, "discovery skipped");
                run.skipped_validation += 1;
            }
        }
    }
}

fn at_limit(run: &SchemaRun, opts: &ApplyOptions) -> bool {
    opts.max_relationships
        .is_some_and(|max| run.discovered.len() >= max)
}

/// The record a dry run reports for a discovery: the derived ID and the
/// would-be content, without store-side metadata.
fn provisional_record(new: &NewRelationship) -> Relationship {
    Relationship {
        id: crate::types::RelationshipId::derive(
            &new.source,
            &new.target,
            &new.relationship_type,
        ),
        source: new.source.clone(),
        target: new.target.clone(),
        relationship_type: new.relationship_type.clone(),
        direction: new.direction.unwrap_or(Direction::Bidirectional),
        confidence: new.confidence,
        properties: new.properties.clone(),
        metadata: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ConfidenceFormula, RuleCondition};

    fn engine() -> MappingEngine {
        let config = Config::default();
        let store = Arc::new(RelationshipStore::new(config.clone()));
        MappingEngine::new(config, store)
    }

    fn tag_schema() -> MappingSchema {
        MappingSchema::new("tags", "1.0.0").with_rule(
            MappingRule::new("decision", "pattern", "related_to")
                .with_condition(RuleCondition::SharedTags { min_count: 1 })
                .with_confidence(ConfidenceFormula::SharedTagRatio),
        )
    }

    fn tag_context() -> MappingContext {
        MappingContext::new()
            .with_item(ContextItem::new("decision", "d1").with_tags(["architecture"]))
            .with_item(ContextItem::new("pattern", "p1").with_tags(["architecture"]))
            .with_item(ContextItem::new("pattern", "p2").with_tags(["security"]))
    }

    #[test]
    fn test_register_assigns_default_id() {
        let engine = engine();
        let id = engine
            .register_schema(tag_schema(), &RegisterOptions::default())
            .unwrap();
        assert_eq!(id.as_str(), "tags@1.0.0");
        assert!(engine.schema(&id).is_some());
    }

    #[test]
    fn test_register_conflict_and_overwrite() {
        let engine = engine();
        engine
            .register_schema(tag_schema(), &RegisterOptions::default())
            .unwrap();

        let err = engine
            .register_schema(tag_schema(), &RegisterOptions::default())
            .unwrap_err();
        assert!(err.is_conflict());

        assert!(engine
            .register_schema(tag_schema(), &RegisterOptions { overwrite: true })
            .is_ok());
    }

    #[test]
    fn test_register_rejects_invalid_shape() {
        let engine = engine();
        let mut schema = tag_schema();
        schema.version = "1.0".to_string();
        let err = engine
            .register_schema(schema, &RegisterOptions::default())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_apply_unknown_schema_is_not_found() {
        let engine = engine();
        let err = engine
            .apply_schema(
                &SchemaId::new("missing"),
                &MappingContext::new(),
                &ApplyOptions::default(),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_apply_discovers_and_persists() {
        let engine = engine();
        let id = engine
            .register_schema(tag_schema(), &RegisterOptions::default())
            .unwrap();

        let run = engine
            .apply_schema(&id, &tag_context(), &ApplyOptions::default())
            .unwrap();

        // d1 pairs with p1 (shared tag) but not p2.
        assert_eq!(run.created, 1);
        assert_eq!(run.discovered.len(), 1);
        assert_eq!(run.pairs_evaluated, 2);
        assert_eq!(run.discovered[0].confidence, 1.0);
        assert_eq!(engine.store.len(), 1);
    }

    #[test]
    fn test_dry_run_persists_nothing() {
        let engine = engine();
        let id = engine
            .register_schema(tag_schema(), &RegisterOptions::default())
            .unwrap();

        let run = engine
            .apply_schema(
                &id,
                &tag_context(),
                &ApplyOptions {
                    dry_run: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(run.dry_run);
        assert_eq!(run.discovered.len(), 1);
        assert_eq!(run.created, 0);
        assert!(engine.store.is_empty());
    }

    #[test]
    fn test_reapply_counts_duplicates() {
        let engine = engine();
        let id = engine
            .register_schema(tag_schema(), &RegisterOptions::default())
            .unwrap();

        engine
            .apply_schema(&id, &tag_context(), &ApplyOptions::default())
            .unwrap();
        let second = engine
            .apply_schema(&id, &tag_context(), &ApplyOptions::default())
            .unwrap();

        assert_eq!(second.created, 0);
        assert_eq!(second.deduplicated, 1);
        assert_eq!(engine.store.len(), 1);
    }

    #[test]
    fn test_confidence_threshold_gates_discovery() {
        let engine = engine();
        let schema = MappingSchema::new("weak", "1.0.0").with_rule(
            MappingRule::new("decision", "pattern", "related_to")
                .with_condition(RuleCondition::Always)
                .with_default_confidence(0.3),
        );
        let id = engine
            .register_schema(schema, &RegisterOptions::default())
            .unwrap();

        let ctx = MappingContext::new()
            .with_item(ContextItem::new("decision", "d1"))
            .with_item(ContextItem::new("pattern", "p1"));

        let run = engine
            .apply_schema(
                &id,
                &ctx,
                &ApplyOptions {
                    confidence_threshold: 0.5,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(run.discovered.is_empty());
        assert_eq!(run.pairs_evaluated, 1);
    }

    #[test]
    fn test_max_relationships_is_soft_limit() {
        let engine = engine();
        let schema = MappingSchema::new("fanout", "1.0.0")
            .with_rule(MappingRule::new("decision", "pattern", "related_to"));
        let id = engine
            .register_schema(schema, &RegisterOptions::default())
            .unwrap();

        let mut ctx = MappingContext::new();
        ctx.add_item(ContextItem::new("decision", "d1"));
        for n in 0..10 {
            ctx.add_item(ContextItem::new("pattern", format!("p{n}")));
        }

        let run = engine
            .apply_schema(
                &id,
                &ctx,
                &ApplyOptions {
                    max_relationships: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(run.discovered.len(), 3);
        assert!(run.limit_reached);
        assert_eq!(engine.store.len(), 3);
    }

    #[test]
    fn test_self_pairs_skipped_unless_allowed() {
        let engine = engine();
        let schema = MappingSchema::new("self", "1.0.0")
            .with_rule(MappingRule::new("decision", "decision", "related_to"));
        let id = engine
            .register_schema(schema, &RegisterOptions::default())
            .unwrap();

        let ctx = MappingContext::new()
            .with_item(ContextItem::new("decision", "d1"))
            .with_item(ContextItem::new("decision", "d2"));

        let run = engine
            .apply_schema(&id, &ctx, &ApplyOptions::default())
            .unwrap();
        // d1->d2 and d2->d1; the two self pairs are skipped unevaluated.
        assert_eq!(run.pairs_evaluated, 2);
        assert_eq!(run.created, 2);
    }

    #[test]
    fn test_apply_all_aggregates() {
        let engine = engine();
        engine
            .register_schema(tag_schema(), &RegisterOptions::default())
            .unwrap();
        let other = MappingSchema::new("always", "1.0.0")
            .with_rule(MappingRule::new("decision", "pattern", "touches"));
        engine
            .register_schema(other, &RegisterOptions::default())
            .unwrap();

        let summary = engine.apply_all_schemas(&tag_context(), &ApplyOptions::default());
        assert_eq!(summary.runs.len(), 2);
        assert!(summary.failures.is_empty());
        // "always" relates d1 to both patterns; "tags" adds one more.
        assert_eq!(summary.created_total(), 3);
    }
}
