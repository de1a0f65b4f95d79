//! Optimistic version history for relationships.
//!
//! When history tracking is enabled, every update, overwrite, and
//! removal snapshots the displaced record before the mutation applies.
//! Snapshots are kept oldest-first, bounded per relationship, and
//! survive record removal so the final `Removed` entry stays
//! inspectable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::relationship::Relationship;
use crate::types::{RelationshipId, Timestamp};

/// What kind of mutation displaced the snapshotted version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The record was partially updated.
    Updated,
    /// The record was replaced by an overwriting add.
    Overwritten,
    /// The record was removed from the store.
    Removed,
}

/// One snapshot in a relationship's history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The record as it was before the mutation.
    pub snapshot: Relationship,
    /// The mutation that displaced it.
    pub change: ChangeKind,
    /// When the mutation happened.
    pub at: Timestamp,
}

/// Bounded per-relationship history log.
#[derive(Debug, Default)]
pub(crate) struct HistoryLog {
    entries: HashMap<RelationshipId, Vec<HistoryEntry>>,
    max_per_relationship: usize,
}

impl HistoryLog {
    /// Creates a log bounded to `max_per_relationship` entries per ID.
    pub fn new(max_per_relationship: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_per_relationship,
        }
    }

    /// Records a snapshot, dropping the oldest entry if the bound is hit.
    pub fn record(&mut self, snapshot: Relationship, change: ChangeKind) {
        let entries = self.entries.entry(snapshot.id.clone()).or_default();
        entries.push(HistoryEntry {
            snapshot,
            change,
            at: Timestamp::now(),
        });
        if entries.len() > self.max_per_relationship {
            entries.remove(0);
        }
    }

    /// Returns the history for an ID, oldest first. Empty when the
    /// relationship has never been mutated.
    pub fn get(&self, id: &RelationshipId) -> Vec<HistoryEntry> {
        self.entries.get(id).cloned().unwrap_or_default()
    }

    /// Drops all history.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship::Direction;
    use crate::types::{ItemRef, PropertyMap};

    fn snapshot(confidence: f64) -> Relationship {
        let source = ItemRef::new("decision", "d1");
        let target = ItemRef::new("pattern", "p1");
        Relationship {
            id: RelationshipId::derive(&source, &target, "implements"),
            source,
            target,
            relationship_type: "implements".to_string(),
            direction: Direction::Bidirectional,
            confidence,
            properties: PropertyMap::new(),
            metadata: None,
        }
    }

    #[test]
    fn test_history_is_oldest_first() {
        let mut log = HistoryLog::new(10);
        log.record(snapshot(0.1), ChangeKind::Updated);
        log.record(snapshot(0.2), ChangeKind::Updated);
        log.record(snapshot(0.3), ChangeKind::Removed);

        let entries = log.get(&snapshot(0.0).id);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].snapshot.confidence, 0.1);
        assert_eq!(entries[2].change, ChangeKind::Removed);
    }

    #[test]
    fn test_history_bound_drops_oldest() {
        let mut log = HistoryLog::new(2);
        log.record(snapshot(0.1), ChangeKind::Updated);
        log.record(snapshot(0.2), ChangeKind::Updated);
        log.record(snapshot(0.3), ChangeKind::Updated);

        let entries = log.get(&snapshot(0.0).id);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].snapshot.confidence, 0.2);
        assert_eq!(entries[1].snapshot.confidence, 0.3);
    }

    #[test]
    fn test_unknown_id_yields_empty() {
        let log = HistoryLog::new(5);
        assert!(log.get(&RelationshipId::new("missing")).is_empty());
    }
}
