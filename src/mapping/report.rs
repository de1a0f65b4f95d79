//! Outcome records for schema application runs.
//!
//! The mapping engine treats individual pair failures (validation
//! rejections, duplicate skips) as counted outcomes inside a successful
//! run — these records carry those counts back to the caller.

use serde::{Deserialize, Serialize};

use crate::relationship::Relationship;
use crate::types::SchemaId;

/// Result of applying one schema against a context.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaRun {
    /// The schema that was applied.
    pub schema_id: SchemaId,

    /// Relationships discovered by the run (persisted records unless
    /// the run was a dry run).
    pub discovered: Vec<Relationship>,

    /// Discoveries stored as new records.
    pub created: usize,

    /// Discoveries that matched an existing record and were skipped.
    pub deduplicated: usize,

    /// Discoveries the store's validator rejected.
    pub skipped_validation: usize,

    /// Candidate pairs evaluated across all rules.
    pub pairs_evaluated: usize,

    /// True when the run stopped early at `max_relationships`. A soft
    /// limit, not an error.
    pub limit_reached: bool,

    /// True when nothing was persisted.
    pub dry_run: bool,
}

impl SchemaRun {
    pub(crate) fn new(schema_id: SchemaId, dry_run: bool) -> Self {
        Self {
            schema_id,
            discovered: Vec::new(),
            created: 0,
            deduplicated: 0,
            skipped_validation: 0,
            pairs_evaluated: 0,
            limit_reached: false,
            dry_run,
        }
    }
}

/// Aggregate result of applying every registered schema.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MappingRunSummary {
    /// Per-schema runs, in schema-ID order.
    pub runs: Vec<SchemaRun>,

    /// Schemas whose application failed outright, with the error text.
    /// One schema's failure never aborts the others.
    pub failures: Vec<(SchemaId, String)>,
}

impl MappingRunSummary {
    /// Total relationships discovered across all runs.
    pub fn discovered_total(&self) -> usize {
        self.runs.iter().map(|run| run.discovered.len()).sum()
    }

    /// Total relationships stored across all runs.
    pub fn created_total(&self) -> usize {
        self.runs.iter().map(|run| run.created).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let mut a = SchemaRun::new(SchemaId::new("a@1.0.0"), false);
        a.created = 2;
        let mut b = SchemaRun::new(SchemaId::new("b@1.0.0"), false);
        b.created = 3;

        let summary = MappingRunSummary {
            runs: vec![a, b],
            failures: vec![],
        };
        assert_eq!(summary.created_total(), 5);
        assert_eq!(summary.discovered_total(), 0);
    }
}
