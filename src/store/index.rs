//! The three-index family over stored relationships.
//!
//! Every relationship is indexed three ways: by source endpoint, by
//! target endpoint, and by relationship type. The store keeps these
//! consistent with the canonical map after every mutation — a failed
//! operation must never partially index.
//!
//! Buckets are `BTreeSet`s so lookups come back in a deterministic
//! order.

use std::collections::{BTreeSet, HashMap};

use crate::relationship::Relationship;
use crate::types::{ItemRef, RelationshipId};

/// Secondary indices over the canonical relationship map.
#[derive(Debug, Default)]
pub(crate) struct RelationshipIndices {
    by_source: HashMap<ItemRef, BTreeSet<RelationshipId>>,
    by_target: HashMap<ItemRef, BTreeSet<RelationshipId>>,
    by_type: HashMap<String, BTreeSet<RelationshipId>>,
}

impl RelationshipIndices {
    /// Inserts a relationship into all three indices.
    pub fn insert(&mut self, rel: &Relationship) {
        self.by_source
            .entry(rel.source.clone())
            .or_default()
            .insert(rel.id.clone());
        self.by_target
            .entry(rel.target.clone())
            .or_default()
            .insert(rel.id.clone());
        self.by_type
            .entry(rel.relationship_type.clone())
            .or_default()
            .insert(rel.id.clone());
    }

    /// Removes a relationship from all three indices, dropping buckets
    /// that become empty.
    pub fn remove(&mut self, rel: &Relationship) {
        if let Some(bucket) = self.by_source.get_mut(&rel.source) {
            bucket.remove(&rel.id);
            if bucket.is_empty() {
                self.by_source.remove(&rel.source);
            }
        }
        if let Some(bucket) = self.by_target.get_mut(&rel.target) {
            bucket.remove(&rel.id);
            if bucket.is_empty() {
                self.by_target.remove(&rel.target);
            }
        }
        if let Some(bucket) = self.by_type.get_mut(&rel.relationship_type) {
            bucket.remove(&rel.id);
            if bucket.is_empty() {
                self.by_type.remove(&rel.relationship_type);
            }
        }
    }

    /// Clears all three indices.
    pub fn clear(&mut self) {
        self.by_source.clear();
        self.by_target.clear();
        self.by_type.clear();
    }

    /// IDs of relationships whose source is the given item.
    pub fn ids_by_source(&self, item: &ItemRef) -> impl Iterator<Item = &RelationshipId> {
        self.by_source.get(item).into_iter().flatten()
    }

    /// IDs of relationships whose target is the given item.
    pub fn ids_by_target(&self, item: &ItemRef) -> impl Iterator<Item = &RelationshipId> {
        self.by_target.get(item).into_iter().flatten()
    }

    /// IDs of relationships of the given type.
    pub fn ids_by_type(&self, relationship_type: &str) -> impl Iterator<Item = &RelationshipId> {
        self.by_type.get(relationship_type).into_iter().flatten()
    }

    /// Checks that the indices describe exactly the canonical map.
    ///
    /// Every stored relationship must appear in its three buckets, and
    /// every indexed ID must exist in the map under matching keys. Used
    /// by debug assertions and the property tests.
    pub fn is_consistent_with(
        &self,
        canonical: &HashMap<RelationshipId, Relationship>,
    ) -> bool {
        for rel in canonical.values() {
            let in_source = self
                .by_source
                .get(&rel.source)
                .is_some_and(|b| b.contains(&rel.id));
            let in_target = self
                .by_target
                .get(&rel.target)
                .is_some_and(|b| b.contains(&rel.id));
            let in_type = self
                .by_type
                .get(&rel.relationship_type)
                .is_some_and(|b| b.contains(&rel.id));
            if !(in_source && in_target && in_type) {
                return false;
            }
        }

        let canonical_count = canonical.len();
        let source_count: usize = self.by_source.values().map(BTreeSet::len).sum();
        let target_count: usize = self.by_target.values().map(BTreeSet::len).sum();
        let type_count: usize = self.by_type.values().map(BTreeSet::len).sum();

        source_count == canonical_count
            && target_count == canonical_count
            && type_count == canonical_count
    }
}
