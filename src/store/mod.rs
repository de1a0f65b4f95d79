//! Authoritative relationship storage.
//!
//! [`RelationshipStore`] owns the canonical set of relationship records
//! and three lookup indices (by source endpoint, by target endpoint, by
//! relationship type), which stay consistent with the canonical map
//! after every mutation. It also owns optional version history.
//!
//! # Operations
//!
//! - [`add`](RelationshipStore::add) / [`update`](RelationshipStore::update)
//!   / [`remove`](RelationshipStore::remove) / [`get`](RelationshipStore::get)
//! - Indexed finds: [`find_by_source`](RelationshipStore::find_by_source),
//!   [`find_by_target`](RelationshipStore::find_by_target),
//!   [`find_by_type`](RelationshipStore::find_by_type),
//!   [`find_between`](RelationshipStore::find_between),
//!   [`find_for_item`](RelationshipStore::find_for_item),
//!   [`find_duplicate`](RelationshipStore::find_duplicate)
//! - [`history`](RelationshipStore::history) and
//!   [`validate_all`](RelationshipStore::validate_all)
//!
//! # Thread Safety
//!
//! The store is `Send + Sync` and is shared via `Arc`. Mutations are
//! serialized by a single writer lock; reads run concurrently and never
//! observe a half-applied mutation. The injected validator runs on the
//! candidate value *before* the write lock is taken, so a slow or
//! failing collaborator cannot corrupt or stall the store.

mod history;
mod index;

pub use history::{ChangeKind, HistoryEntry};

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{ConflictError, NotFoundError, Result, ValidationError};
use crate::relationship::{
    validate_relationship, Direction, NewRelationship, Relationship, RelationshipMetadata,
    RelationshipUpdate,
};
use crate::types::{ItemRef, RelationshipId, Timestamp};
use crate::validate::{RelationshipValidator, StructuralValidator};

use self::history::HistoryLog;
use self::index::RelationshipIndices;

/// Options for [`RelationshipStore::add`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AddOptions {
    /// Replace the deduplication match or ID holder instead of
    /// returning/failing.
    pub overwrite_existing: bool,

    /// Permit `source == target`. Set by mapping rules that declare
    /// `allow_self_references`.
    pub allow_self_loops: bool,

    /// Skip the injected validator (structural invariants still hold).
    pub skip_validation: bool,
}

/// Options for [`RelationshipStore::update`].
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateOptions {
    /// Skip re-running the injected validator on the merged record.
    pub skip_validation: bool,

    /// Suppress the `metadata.version` increment.
    pub keep_version: bool,

    /// Permit the merged record to be self-referential.
    pub allow_self_loops: bool,
}

/// Options for [`RelationshipStore::validate_all`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidateAllOptions {
    /// Stamp `metadata.last_validated` on records that pass.
    pub stamp_last_validated: bool,
}

/// Aggregate result of a [`RelationshipStore::validate_all`] sweep.
#[derive(Clone, Debug, Default)]
pub struct ValidationSweep {
    /// Number of records checked.
    pub checked: usize,
    /// Number of records that passed.
    pub valid: usize,
    /// Number of records that failed.
    pub invalid: usize,
    /// Per-record error lists for the failures.
    pub failures: Vec<(RelationshipId, Vec<String>)>,
}

/// Result of a successful [`RelationshipStore::add`].
///
/// Deduplicated adds are idempotent no-ops: the existing record comes
/// back unchanged. The two variants let callers (the mapping engine's
/// skip counters in particular) tell the cases apart without a
/// pre-query.
#[derive(Clone, Debug)]
pub enum AddOutcome {
    /// A new record was stored (or an existing one was overwritten).
    Created(Relationship),
    /// An equivalent record already existed and was returned unchanged.
    Deduplicated(Relationship),
}

impl AddOutcome {
    /// The stored (or pre-existing) record.
    pub fn relationship(&self) -> &Relationship {
        match self {
            Self::Created(rel) | Self::Deduplicated(rel) => rel,
        }
    }

    /// Consumes the outcome, returning the record.
    pub fn into_relationship(self) -> Relationship {
        match self {
            Self::Created(rel) | Self::Deduplicated(rel) => rel,
        }
    }

    /// True if a new record was stored.
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

struct StoreInner {
    relationships: HashMap<RelationshipId, Relationship>,
    indices: RelationshipIndices,
    history: Option<HistoryLog>,
}

/// The authoritative relationship store.
///
/// See the [module docs](self) for the operation overview and the
/// locking discipline.
pub struct RelationshipStore {
    inner: RwLock<StoreInner>,
    validator: Arc<dyn RelationshipValidator>,
    config: Config,
}

impl std::fmt::Debug for RelationshipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipStore")
            .field("len", &self.len())
            .field("deduplicate", &self.config.deduplicate)
            .field("track_history", &self.config.track_history)
            .finish_non_exhaustive()
    }
}

impl RelationshipStore {
    /// Creates an empty store with the bundled [`StructuralValidator`].
    pub fn new(config: Config) -> Self {
        Self::with_validator(config, Arc::new(StructuralValidator))
    }

    /// Creates an empty store with an injected validator collaborator.
    pub fn with_validator(config: Config, validator: Arc<dyn RelationshipValidator>) -> Self {
        let history = config
            .track_history
            .then(|| HistoryLog::new(config.max_history_entries.max(1)));
        Self {
            inner: RwLock::new(StoreInner {
                relationships: HashMap::new(),
                indices: RelationshipIndices::default(),
                history,
            }),
            validator,
            config,
        }
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds a relationship.
    ///
    /// Fills in omitted fields (ID derivation, direction default,
    /// auto-metadata), validates, then applies the deduplication and
    /// conflict policy in that order:
    ///
    /// 1. An add matching an existing `(source, target, type)` triple
    ///    returns [`AddOutcome::Deduplicated`] unchanged — unless
    ///    overwrite is requested, in which case the match is replaced in
    ///    place (ID preserved, version incremented, displaced record
    ///    snapshotted into history).
    /// 2. An ID collision fails with a conflict error unless overwrite
    ///    is requested; a *derived* ID collision with deduplication
    ///    disabled instead appends a time-ordered suffix so the
    ///    duplicate can coexist.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if structural invariants fail or the injected
    ///   validator rejects the record
    /// - `ConflictError` if the ID is already taken and overwrite was
    ///   not requested
    #[instrument(skip(self, new, opts), fields(rtype = %new.relationship_type))]
    pub fn add(&self, new: NewRelationship, opts: &AddOptions) -> Result<AddOutcome> {
        let (rel, explicit_id) = self.materialize(new);

        validate_relationship(&rel, opts.allow_self_loops)?;
        if !opts.skip_validation {
            let report = self.validator.validate_relationship(&rel)?;
            if !report.valid {
                return Err(ValidationError::rejected(report.errors).into());
            }
        }

        let mut inner = self.write_inner();

        // Dedup check runs before the ID-conflict check.
        if self.config.deduplicate {
            if let Some(existing) =
                find_duplicate_locked(&inner, &rel.source, &rel.target, &rel.relationship_type)
            {
                if !opts.overwrite_existing {
                    debug!(id = %existing.id, "duplicate add; returning existing record");
                    return Ok(AddOutcome::Deduplicated(existing));
                }
                let replacement = replace_locked(&mut inner, existing, rel);
                debug!(id = %replacement.id, "duplicate add; overwrote existing record");
                return Ok(AddOutcome::Created(replacement));
            }
        }

        let mut rel = rel;
        if let Some(holder) = inner.relationships.get(&rel.id).cloned() {
            if opts.overwrite_existing {
                let replacement = replace_locked(&mut inner, holder, rel);
                debug!(id = %replacement.id, "overwrote record at existing id");
                return Ok(AddOutcome::Created(replacement));
            }
            if !explicit_id && !self.config.deduplicate {
                // Derived ID taken but a coexisting duplicate was asked
                // for: give the new record a time-ordered suffix.
                rel.id = rel.id.with_unique_suffix();
            } else {
                return Err(ConflictError::Relationship(rel.id).into());
            }
        }

        inner.relationships.insert(rel.id.clone(), rel.clone());
        inner.indices.insert(&rel);
        debug_assert!(inner.indices.is_consistent_with(&inner.relationships));

        debug!(id = %rel.id, "relationship added");
        Ok(AddOutcome::Created(rel))
    }

    /// Applies a partial update to a stored relationship.
    ///
    /// The current version is snapshotted into history, the update is
    /// merged shallowly (metadata merged separately), the version is
    /// incremented unless suppressed, and stale index entries are
    /// replaced with entries for the merged record. The merged candidate
    /// is re-validated *before* any state changes.
    ///
    /// # Errors
    ///
    /// - `NotFoundError` if the ID is unknown
    /// - `ValidationError` if the merged record fails validation
    #[instrument(skip(self, update, opts), fields(id = %id))]
    pub fn update(
        &self,
        id: &RelationshipId,
        update: RelationshipUpdate,
        opts: &UpdateOptions,
    ) -> Result<Relationship> {
        let current = self
            .get(id)
            .ok_or_else(|| NotFoundError::Relationship(id.clone()))?;
        let candidate = merge_update(&current, &update, opts, &self.config);

        validate_relationship(&candidate, opts.allow_self_loops)?;
        if !opts.skip_validation {
            let report = self.validator.validate_relationship(&candidate)?;
            if !report.valid {
                return Err(ValidationError::rejected(report.errors).into());
            }
        }

        let mut inner = self.write_inner();
        let current = inner
            .relationships
            .get(id)
            .cloned()
            .ok_or_else(|| NotFoundError::Relationship(id.clone()))?;

        // Remerge from the state under the lock; the validated candidate
        // was built from a snapshot that may since have moved.
        let merged = merge_update(&current, &update, opts, &self.config);

        if let Some(history) = inner.history.as_mut() {
            history.record(current.clone(), ChangeKind::Updated);
        }
        inner.indices.remove(&current);
        inner.relationships.insert(id.clone(), merged.clone());
        inner.indices.insert(&merged);
        debug_assert!(inner.indices.is_consistent_with(&inner.relationships));

        debug!(id = %id, version = merged.version(), "relationship updated");
        Ok(merged)
    }

    /// Removes a relationship.
    ///
    /// Returns `false` if the ID is unknown. A removed record leaves a
    /// final `Removed` snapshot in history (when tracking is enabled).
    #[instrument(skip(self), fields(id = %id))]
    pub fn remove(&self, id: &RelationshipId) -> bool {
        let mut inner = self.write_inner();
        let Some(rel) = inner.relationships.remove(id) else {
            return false;
        };
        inner.indices.remove(&rel);
        if let Some(history) = inner.history.as_mut() {
            history.record(rel, ChangeKind::Removed);
        }
        debug_assert!(inner.indices.is_consistent_with(&inner.relationships));

        debug!(id = %id, "relationship removed");
        true
    }

    /// Drops every relationship, all index entries, and all history.
    pub fn clear(&self) {
        let mut inner = self.write_inner();
        inner.relationships.clear();
        inner.indices.clear();
        if let Some(history) = inner.history.as_mut() {
            history.clear();
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Retrieves a relationship by ID. No side effects.
    pub fn get(&self, id: &RelationshipId) -> Option<Relationship> {
        self.read_inner().relationships.get(id).cloned()
    }

    /// Relationships whose source endpoint is the given item.
    pub fn find_by_source(&self, item_type: &str, id: &str) -> Vec<Relationship> {
        let inner = self.read_inner();
        let key = ItemRef::new(item_type, id);
        collect_ids(&inner, inner.indices.ids_by_source(&key))
    }

    /// Relationships whose target endpoint is the given item.
    pub fn find_by_target(&self, item_type: &str, id: &str) -> Vec<Relationship> {
        let inner = self.read_inner();
        let key = ItemRef::new(item_type, id);
        collect_ids(&inner, inner.indices.ids_by_target(&key))
    }

    /// Relationships of the given type.
    pub fn find_by_type(&self, relationship_type: &str) -> Vec<Relationship> {
        let inner = self.read_inner();
        collect_ids(&inner, inner.indices.ids_by_type(relationship_type))
    }

    /// Relationships (of any type) between the given source and target.
    pub fn find_between(
        &self,
        source_type: &str,
        source_id: &str,
        target_type: &str,
        target_id: &str,
    ) -> Vec<Relationship> {
        let inner = self.read_inner();
        let source = ItemRef::new(source_type, source_id);
        let target = ItemRef::new(target_type, target_id);
        inner
            .indices
            .ids_by_source(&source)
            .filter_map(|rid| inner.relationships.get(rid))
            .filter(|rel| rel.target == target)
            .cloned()
            .collect()
    }

    /// Every relationship touching the given item, as source or target,
    /// deduplicated by ID.
    pub fn find_for_item(&self, item_type: &str, id: &str) -> Vec<Relationship> {
        let inner = self.read_inner();
        let key = ItemRef::new(item_type, id);
        let ids: BTreeSet<&RelationshipId> = inner
            .indices
            .ids_by_source(&key)
            .chain(inner.indices.ids_by_target(&key))
            .collect();
        ids.into_iter()
            .filter_map(|rid| inner.relationships.get(rid))
            .cloned()
            .collect()
    }

    /// The existing record with the same `(source, target, type)` triple
    /// as the given input, if any.
    pub fn find_duplicate(&self, new: &NewRelationship) -> Option<Relationship> {
        let inner = self.read_inner();
        find_duplicate_locked(&inner, &new.source, &new.target, &new.relationship_type)
    }

    /// Every stored relationship. Order is unspecified.
    pub fn all(&self) -> Vec<Relationship> {
        self.read_inner().relationships.values().cloned().collect()
    }

    /// Number of stored relationships.
    pub fn len(&self) -> usize {
        self.read_inner().relationships.len()
    }

    /// True if the store holds no relationships.
    pub fn is_empty(&self) -> bool {
        self.read_inner().relationships.is_empty()
    }

    /// Prior versions of a relationship, oldest first.
    ///
    /// Returns `None` when history tracking is disabled — distinct from
    /// `Some(empty)`, which means tracked but never mutated. History
    /// survives removal, so the final entry of a removed record is its
    /// `Removed` snapshot.
    pub fn history(&self, id: &RelationshipId) -> Option<Vec<HistoryEntry>> {
        self.read_inner().history.as_ref().map(|h| h.get(id))
    }

    /// Re-runs the injected validator over every stored relationship.
    ///
    /// Failures are collected per record, never raised. Optionally
    /// stamps `last_validated` on the records that pass.
    ///
    /// # Errors
    ///
    /// Only a collaborator failure (an `Err` from the validator itself)
    /// aborts the sweep.
    #[instrument(skip(self, opts))]
    pub fn validate_all(&self, opts: &ValidateAllOptions) -> Result<ValidationSweep> {
        let records = self.all();
        let mut sweep = ValidationSweep {
            checked: records.len(),
            ..Default::default()
        };
        let mut passed = Vec::new();

        for rel in &records {
            let report = self.validator.validate_relationship(rel)?;
            if report.valid {
                sweep.valid += 1;
                passed.push(rel.id.clone());
            } else {
                sweep.invalid += 1;
                sweep.failures.push((rel.id.clone(), report.errors));
            }
        }

        if opts.stamp_last_validated {
            let now = Timestamp::now();
            let mut inner = self.write_inner();
            for id in passed {
                if let Some(meta) = inner
                    .relationships
                    .get_mut(&id)
                    .and_then(|rel| rel.metadata.as_mut())
                {
                    meta.last_validated = Some(now);
                }
            }
        }

        info!(
            checked = sweep.checked,
            invalid = sweep.invalid,
            "validation sweep complete"
        );
        Ok(sweep)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Fills in omitted input fields: direction default, auto-metadata
    /// stamp, ID derivation. Returns the materialized record and whether
    /// the ID was caller-supplied.
    fn materialize(&self, new: NewRelationship) -> (Relationship, bool) {
        let direction = match new.direction {
            Some(direction) => direction,
            None => {
                warn!(
                    source = %new.source,
                    target = %new.target,
                    "relationship direction omitted; defaulting to bidirectional"
                );
                Direction::Bidirectional
            }
        };

        let metadata = match new.metadata {
            Some(meta) => Some(meta),
            None if self.config.auto_metadata => {
                Some(RelationshipMetadata::stamped(self.config.created_by.clone()))
            }
            None => None,
        };

        let explicit_id = new.id.is_some();
        let id = new
            .id
            .unwrap_or_else(|| RelationshipId::derive(&new.source, &new.target, &new.relationship_type));

        (
            Relationship {
                id,
                source: new.source,
                target: new.target,
                relationship_type: new.relationship_type,
                direction,
                confidence: new.confidence,
                properties: new.properties,
                metadata,
            },
            explicit_id,
        )
    }
}

/// Collects index hits into owned records.
fn collect_ids<'a>(
    inner: &StoreInner,
    ids: impl Iterator<Item = &'a RelationshipId>,
) -> Vec<Relationship> {
    ids.filter_map(|rid| inner.relationships.get(rid))
        .cloned()
        .collect()
}

fn find_duplicate_locked(
    inner: &StoreInner,
    source: &ItemRef,
    target: &ItemRef,
    relationship_type: &str,
) -> Option<Relationship> {
    inner
        .indices
        .ids_by_source(source)
        .filter_map(|rid| inner.relationships.get(rid))
        .find(|rel| rel.target == *target && rel.relationship_type == relationship_type)
        .cloned()
}

/// Replaces `displaced` with `replacement` in place: the stored ID is
/// preserved, creation lineage carries over, the version increments, and
/// the displaced record is snapshotted into history.
fn replace_locked(
    inner: &mut StoreInner,
    displaced: Relationship,
    mut replacement: Relationship,
) -> Relationship {
    replacement.id = displaced.id.clone();
    if let (Some(meta), Some(prev)) = (replacement.metadata.as_mut(), displaced.metadata.as_ref()) {
        meta.created = prev.created;
        meta.created_by = prev.created_by.clone();
        meta.version = prev.version + 1;
        meta.last_updated = Some(Timestamp::now());
    }

    inner.indices.remove(&displaced);
    inner.relationships.remove(&displaced.id);
    if let Some(history) = inner.history.as_mut() {
        history.record(displaced, ChangeKind::Overwritten);
    }

    inner
        .relationships
        .insert(replacement.id.clone(), replacement.clone());
    inner.indices.insert(&replacement);
    debug_assert!(inner.indices.is_consistent_with(&inner.relationships));

    replacement
}

/// Merges a partial update into the current record. Pure; called once
/// to build the validation candidate and once under the write lock.
fn merge_update(
    current: &Relationship,
    update: &RelationshipUpdate,
    opts: &UpdateOptions,
    config: &Config,
) -> Relationship {
    let mut merged = current.clone();

    if let Some(source) = &update.source {
        merged.source = source.clone();
    }
    if let Some(target) = &update.target {
        merged.target = target.clone();
    }
    if let Some(rtype) = &update.relationship_type {
        merged.relationship_type = rtype.clone();
    }
    if let Some(direction) = update.direction {
        merged.direction = direction;
    }
    if let Some(confidence) = update.confidence {
        merged.confidence = confidence;
    }
    if let Some(properties) = &update.properties {
        merged.properties = properties.clone();
    }

    // Metadata is merged separately; created/version stamps are
    // store-managed.
    let meta = match merged.metadata.take() {
        Some(meta) => Some(meta),
        None if config.auto_metadata => Some(RelationshipMetadata {
            created: Timestamp::now(),
            created_by: config.created_by.clone(),
            version: 0,
            last_updated: None,
            last_validated: None,
        }),
        None => None,
    };
    if let Some(mut meta) = meta {
        if let Some(mu) = &update.metadata {
            if let Some(created_by) = &mu.created_by {
                meta.created_by = created_by.clone();
            }
            if let Some(last_validated) = mu.last_validated {
                meta.last_validated = Some(last_validated);
            }
        }
        if !opts.keep_version {
            meta.version += 1;
        }
        meta.last_updated = Some(Timestamp::now());
        merged.metadata = Some(meta);
    }

    merged
}
