//! Mapping schemas and their shape validation.
//!
//! A **schema** bundles inference rules under a name and a semantic
//! version. Schemas are registered once with the
//! [`MappingEngine`](crate::mapping::MappingEngine) and applied against
//! pools of candidate items.
//!
//! # Constraints
//!
//! - `name` must be non-empty
//! - `version` must be `major.minor.patch` (numeric components)
//! - `relationship_types` must be non-empty
//! - Every rule must carry non-empty source/target/relationship types
//! - Taxonomy term IDs must be unique within their taxonomy, recursively

pub mod rule;
pub mod types;

pub use rule::{ConfidenceFormula, PropertyMapping, RuleCondition, ValueOrigin};
pub use types::{MappingRule, MappingSchema, Taxonomy, TaxonomyTerm};

use std::collections::HashSet;

use crate::error::{GraphError, ValidationError};

/// Validates a schema's shape before registration.
///
/// Checks the structural constraints listed in the [module docs](self).
/// Does NOT evaluate rules or consult the store — that happens at
/// application time.
pub(crate) fn validate_schema_shape(schema: &MappingSchema) -> Result<(), GraphError> {
    if schema.name.is_empty() {
        return Err(ValidationError::required_field("name").into());
    }

    if !is_semver(&schema.version) {
        return Err(ValidationError::invalid_version(&schema.version).into());
    }

    if schema.relationship_types.is_empty() {
        return Err(ValidationError::required_field("relationship_types").into());
    }

    for (index, rule) in schema.rules.iter().enumerate() {
        if rule.source_type.is_empty() || rule.target_type.is_empty() {
            return Err(ValidationError::invalid_field(
                format!("rules[{index}]"),
                "source_type and target_type must be non-empty",
            )
            .into());
        }
        if rule.relationship_type.is_empty() {
            return Err(ValidationError::invalid_field(
                format!("rules[{index}]"),
                "relationship_type must be non-empty",
            )
            .into());
        }
        if let Some(confidence) = rule.default_confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ValidationError::invalid_field(
                    format!("rules[{index}].default_confidence"),
                    format!("must be between 0.0 and 1.0, got {confidence}"),
                )
                .into());
            }
        }
    }

    for taxonomy in &schema.taxonomies {
        let mut seen = HashSet::new();
        for term in &taxonomy.terms {
            check_unique_terms(term, &taxonomy.name, &mut seen)?;
        }
    }

    Ok(())
}

/// True for `major.minor.patch` with numeric components.
fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

fn check_unique_terms<'a>(
    term: &'a TaxonomyTerm,
    taxonomy: &str,
    seen: &mut HashSet<&'a str>,
) -> Result<(), GraphError> {
    if !seen.insert(term.id.as_str()) {
        return Err(ValidationError::invalid_field(
            format!("taxonomies[{taxonomy}]"),
            format!("duplicate term id '{}'", term.id),
        )
        .into());
    }
    for child in &term.children {
        check_unique_terms(child, taxonomy, seen)?;
    }
    Ok(())
}
