//! Data types for mapping schemas.
//!
//! A **schema** is a named, semantically versioned bundle of mapping
//! rules, plus optional taxonomies (hierarchical term trees used for
//! classification — stored and validated, never traversed by the query
//! engine).

use serde::{Deserialize, Serialize};

use crate::schema::rule::{ConfidenceFormula, PropertyMapping, RuleCondition};
use crate::types::SchemaId;

/// A registered bundle of mapping rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingSchema {
    /// Registry identifier; derived as `"{name}@{version}"` when absent
    /// at registration.
    pub id: Option<SchemaId>,

    /// Human-readable schema name. Required.
    pub name: String,

    /// Semantic version (`major.minor.patch`). Required.
    pub version: String,

    /// Optional free-text description.
    pub description: Option<String>,

    /// Relationship types this schema may produce. Required, non-empty.
    pub relationship_types: Vec<String>,

    /// The inference rules applied by
    /// [`apply_schema`](crate::mapping::MappingEngine::apply_schema).
    pub rules: Vec<MappingRule>,

    /// Optional classification taxonomies.
    pub taxonomies: Vec<Taxonomy>,
}

impl MappingSchema {
    /// Creates an empty schema with the given name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            version: version.into(),
            description: None,
            relationship_types: Vec::new(),
            rules: Vec::new(),
            taxonomies: Vec::new(),
        }
    }

    /// Adds a rule (builder style), registering its relationship type.
    pub fn with_rule(mut self, rule: MappingRule) -> Self {
        if !self
            .relationship_types
            .contains(&rule.relationship_type)
        {
            self.relationship_types.push(rule.relationship_type.clone());
        }
        self.rules.push(rule);
        self
    }

    /// Adds a taxonomy (builder style).
    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomies.push(taxonomy);
        self
    }
}

/// One inference rule: a condition, a scoring formula, and property
/// extraction, applied to every `(source_type, target_type)` candidate
/// pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingRule {
    /// Optional rule name, used in logs.
    pub name: Option<String>,

    /// Item type the rule draws source candidates from.
    pub source_type: String,

    /// Item type the rule draws target candidates from.
    pub target_type: String,

    /// Relationship type produced by the rule.
    pub relationship_type: String,

    /// Predicate deciding whether a pair relates.
    pub condition: RuleCondition,

    /// Scoring formula; when absent (or non-resolving) the rule falls
    /// back to `default_confidence`, then to the engine-wide default.
    pub confidence: Option<ConfidenceFormula>,

    /// Rule-level fallback confidence.
    pub default_confidence: Option<f64>,

    /// Output property extraction for discovered relationships.
    pub property_mappings: Vec<PropertyMapping>,

    /// Permit pairs where source and target are the same item.
    pub allow_self_references: bool,

    /// Overwrite an existing equivalent relationship instead of
    /// skipping it.
    pub overwrite_existing: bool,
}

impl MappingRule {
    /// Creates a rule with an [`Always`](RuleCondition::Always)
    /// condition and no scoring formula.
    pub fn new(
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            source_type: source_type.into(),
            target_type: target_type.into(),
            relationship_type: relationship_type.into(),
            condition: RuleCondition::Always,
            confidence: None,
            default_confidence: None,
            property_mappings: Vec::new(),
            allow_self_references: false,
            overwrite_existing: false,
        }
    }

    /// Sets the condition (builder style).
    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Sets the scoring formula (builder style).
    pub fn with_confidence(mut self, formula: ConfidenceFormula) -> Self {
        self.confidence = Some(formula);
        self
    }

    /// Sets the rule-level fallback confidence (builder style).
    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = Some(confidence);
        self
    }

    /// Adds a property mapping (builder style).
    pub fn with_property_mapping(mut self, mapping: PropertyMapping) -> Self {
        self.property_mappings.push(mapping);
        self
    }
}

/// A hierarchical term tree used for classification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Taxonomy {
    /// Taxonomy name.
    pub name: String,

    /// Root terms.
    pub terms: Vec<TaxonomyTerm>,
}

/// One term in a taxonomy tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaxonomyTerm {
    /// Term identifier, unique across the whole taxonomy.
    pub id: String,

    /// Display label.
    pub label: String,

    /// Child terms.
    pub children: Vec<TaxonomyTerm>,
}

impl TaxonomyTerm {
    /// Creates a leaf term.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Adds a child term (builder style).
    pub fn with_child(mut self, child: TaxonomyTerm) -> Self {
        self.children.push(child);
        self
    }
}
