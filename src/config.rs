//! Configuration types for relgraph.
//!
//! The [`Config`] struct controls engine behavior including:
//! - Deduplication and auto-metadata stamping on add
//! - Version history tracking and its per-record bound
//! - Default rule confidence for the mapping engine
//! - Traversal depth/limit defaults and ceilings, and query caching
//!
//! # Example
//! ```rust
//! use relgraph::Config;
//!
//! // Use defaults (dedup on, history on, caching on)
//! let config = Config::default();
//!
//! // Deterministic testing: no cache, no history
//! let config = Config {
//!     track_history: false,
//!     query: relgraph::QueryConfig {
//!         cache_enabled: false,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Absolute ceiling on traversal depth. [`QueryConfig::max_depth`] may be
/// configured lower, never higher.
pub const DEPTH_CEILING: u32 = 5;

/// Absolute ceiling on query result limits. [`QueryConfig::max_limit`]
/// may be configured lower, never higher.
pub const LIMIT_CEILING: usize = 1000;

/// Engine configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use relgraph::Config;
///
/// let config = Config {
///     default_confidence: 0.6,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Whether adds with an existing `(source, target, type)` triple
    /// return the existing record instead of creating a duplicate.
    ///
    /// Default: `true`
    pub deduplicate: bool,

    /// Whether to stamp `created`/`created_by`/`version` metadata on
    /// records added without metadata.
    ///
    /// Default: `true`
    pub auto_metadata: bool,

    /// The `created_by` value stamped by auto-metadata.
    pub created_by: String,

    /// Whether to keep per-relationship version history.
    ///
    /// Default: `true`
    pub track_history: bool,

    /// Maximum history entries kept per relationship; the oldest entry
    /// is dropped when the bound is reached.
    pub max_history_entries: usize,

    /// Confidence used by mapping rules that declare neither a formula
    /// nor a rule-level default.
    pub default_confidence: f64,

    /// Traversal and cache settings for the query engine.
    pub query: QueryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deduplicate: true,
            auto_metadata: true,
            created_by: "relgraph".to_string(),
            track_history: true,
            max_history_entries: 50,
            default_confidence: 0.8,
            query: QueryConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// Called automatically by [`KnowledgeGraph::new`](crate::KnowledgeGraph::new).
    /// You can also call this explicitly before wiring components by hand.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - `default_confidence` is outside `[0.0, 1.0]`
    /// - `max_history_entries` is 0 while history tracking is enabled
    /// - any [`QueryConfig`] bound is inconsistent (see its docs)
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(ValidationError::invalid_field(
                "default_confidence",
                format!("must be between 0.0 and 1.0, got {}", self.default_confidence),
            ));
        }

        if self.track_history && self.max_history_entries == 0 {
            return Err(ValidationError::invalid_field(
                "max_history_entries",
                "must be greater than 0 when history tracking is enabled",
            ));
        }

        self.query.validate()
    }
}

/// Traversal and cache settings for the query engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Depth used when a query omits one. Default: 2
    pub default_depth: u32,

    /// Depth above which a query still runs but carries a warning.
    /// Default: 3
    pub recommended_depth: u32,

    /// Hard depth ceiling; queries beyond it fail with a limit error.
    /// Default: 5 (the absolute [`DEPTH_CEILING`])
    pub max_depth: u32,

    /// Result limit used when a query omits one. Default: 100
    pub default_limit: usize,

    /// Hard result-limit ceiling. Default: 1000 (the absolute
    /// [`LIMIT_CEILING`])
    pub max_limit: usize,

    /// Whether query results are cached. Caching is purely a performance
    /// optimization; disable it for deterministic testing.
    ///
    /// Default: `true`
    pub cache_enabled: bool,

    /// Maximum number of cached query results. When full, the single
    /// oldest entry (by insertion time) is evicted.
    pub cache_capacity: usize,

    /// Cache entry time-to-live in milliseconds.
    pub cache_ttl_ms: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_depth: 2,
            recommended_depth: 3,
            max_depth: DEPTH_CEILING,
            default_limit: 100,
            max_limit: LIMIT_CEILING,
            cache_enabled: true,
            cache_capacity: 128,
            cache_ttl_ms: 5 * 60 * 1000,
        }
    }
}

impl QueryConfig {
    /// Validates the query configuration.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - any depth/limit is 0, or the ordering
    ///   `default <= recommended <= max <= ceiling` is violated
    /// - caching is enabled with a zero capacity or non-positive TTL
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_depth == 0 {
            return Err(ValidationError::invalid_field(
                "default_depth",
                "must be greater than 0",
            ));
        }
        if self.recommended_depth < self.default_depth || self.max_depth < self.recommended_depth {
            return Err(ValidationError::invalid_field(
                "max_depth",
                "depth bounds must satisfy default <= recommended <= max",
            ));
        }
        if self.max_depth > DEPTH_CEILING {
            return Err(ValidationError::invalid_field(
                "max_depth",
                format!("must not exceed {DEPTH_CEILING}"),
            ));
        }

        if self.default_limit == 0 {
            return Err(ValidationError::invalid_field(
                "default_limit",
                "must be greater than 0",
            ));
        }
        if self.max_limit < self.default_limit {
            return Err(ValidationError::invalid_field(
                "max_limit",
                "must be at least default_limit",
            ));
        }
        if self.max_limit > LIMIT_CEILING {
            return Err(ValidationError::invalid_field(
                "max_limit",
                format!("must not exceed {LIMIT_CEILING}"),
            ));
        }

        if self.cache_enabled {
            if self.cache_capacity == 0 {
                return Err(ValidationError::invalid_field(
                    "cache_capacity",
                    "must be greater than 0 when caching is enabled",
                ));
            }
            if self.cache_ttl_ms <= 0 {
                return Err(ValidationError::invalid_field(
                    "cache_ttl_ms",
                    "must be positive when caching is enabled",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let config = Config {
            default_confidence: 1.5,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_confidence"));
    }

    #[test]
    fn test_zero_history_bound_rejected_when_tracking() {
        let config = Config {
            max_history_entries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Fine when history tracking is off.
        let config = Config {
            track_history: false,
            max_history_entries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_depth_ordering_enforced() {
        let config = Config {
            query: QueryConfig {
                default_depth: 4,
                recommended_depth: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_depth_ceiling_enforced() {
        let config = Config {
            query: QueryConfig {
                max_depth: DEPTH_CEILING + 1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_bounds_enforced_only_when_enabled() {
        let config = Config {
            query: QueryConfig {
                cache_capacity: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            query: QueryConfig {
                cache_enabled: false,
                cache_capacity: 0,
                cache_ttl_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_limit_ordering_enforced() {
        let config = Config {
            query: QueryConfig {
                default_limit: 500,
                max_limit: 100,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
