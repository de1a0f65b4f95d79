//! Rule conditions, confidence formulas, and property mappings.
//!
//! All three are closed, data-only ASTs evaluated against a fixed
//! `(source item, target item, shared context)` record. No host-language
//! code is ever evaluated at runtime, and the ASTs serialize cleanly, so
//! schemas can be authored as JSON.
//!
//! Missing or mistyped attributes make leaf conditions false and send
//! confidence formulas down the rule's default path; they never raise
//! errors.

use serde::{Deserialize, Serialize};

use crate::mapping::context::{ContextItem, MappingContext};
use crate::types::PropertyValue;

/// Boolean predicate over a candidate source/target pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Always holds. Combine with a confidence threshold to gate purely
    /// on the scoring formula.
    Always,

    /// The pair shares at least `min_count` tags (1 when 0 is given).
    SharedTags {
        /// Minimum number of shared tags required.
        min_count: usize,
    },

    /// The source item has the given attribute value.
    SourceProperty {
        /// Dotted attribute path on the source item.
        path: String,
        /// Value the attribute must equal.
        equals: PropertyValue,
    },

    /// The target item has the given attribute value.
    TargetProperty {
        /// Dotted attribute path on the target item.
        path: String,
        /// Value the attribute must equal.
        equals: PropertyValue,
    },

    /// A source attribute equals a target attribute. Fails when either
    /// is missing.
    PropertiesMatch {
        /// Dotted attribute path on the source item.
        source_path: String,
        /// Dotted attribute path on the target item.
        target_path: String,
    },

    /// The context's shared bag has the given value.
    ContextProperty {
        /// Dotted path in the shared attribute bag.
        path: String,
        /// Value the shared attribute must equal.
        equals: PropertyValue,
    },

    /// Every sub-condition holds (true when empty).
    All {
        /// The sub-conditions.
        conditions: Vec<RuleCondition>,
    },

    /// At least one sub-condition holds (false when empty).
    Any {
        /// The sub-conditions.
        conditions: Vec<RuleCondition>,
    },

    /// The sub-condition does not hold.
    Not {
        /// The negated sub-condition.
        condition: Box<RuleCondition>,
    },
}

impl RuleCondition {
    /// Evaluates the condition for a candidate pair.
    pub fn evaluate(
        &self,
        source: &ContextItem,
        target: &ContextItem,
        ctx: &MappingContext,
    ) -> bool {
        match self {
            Self::Always => true,
            Self::SharedTags { min_count } => {
                shared_tag_count(source, target) >= (*min_count).max(1)
            }
            Self::SourceProperty { path, equals } => {
                source.attribute(path).is_some_and(|v| v == equals)
            }
            Self::TargetProperty { path, equals } => {
                target.attribute(path).is_some_and(|v| v == equals)
            }
            Self::PropertiesMatch {
                source_path,
                target_path,
            } => match (source.attribute(source_path), target.attribute(target_path)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            Self::ContextProperty { path, equals } => {
                ctx.shared_value(path).is_some_and(|v| v == equals)
            }
            Self::All { conditions } => {
                conditions.iter().all(|c| c.evaluate(source, target, ctx))
            }
            Self::Any { conditions } => {
                conditions.iter().any(|c| c.evaluate(source, target, ctx))
            }
            Self::Not { condition } => !condition.evaluate(source, target, ctx),
        }
    }
}

/// Numeric scoring formula for a candidate pair.
///
/// Evaluation yields `None` when the formula cannot produce a number
/// (missing attribute, empty average); the engine then falls back to the
/// rule's default confidence. Results are clamped to `[0, 1]` before
/// any threshold comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfidenceFormula {
    /// A constant score.
    Fixed {
        /// The score.
        value: f64,
    },

    /// Shared-tag count divided by the larger tag-set size; 0.0 when
    /// both items are untagged.
    SharedTagRatio,

    /// A numeric attribute read from the pair or the shared context.
    NumericProperty {
        /// Where to read the attribute from.
        origin: ValueOrigin,
        /// Dotted attribute path.
        path: String,
    },

    /// The arithmetic mean of the sub-formulas that produce values.
    Average {
        /// The averaged sub-formulas.
        formulas: Vec<ConfidenceFormula>,
    },
}

impl ConfidenceFormula {
    /// Evaluates the formula for a candidate pair.
    pub fn evaluate(
        &self,
        source: &ContextItem,
        target: &ContextItem,
        ctx: &MappingContext,
    ) -> Option<f64> {
        match self {
            Self::Fixed { value } => Some(*value),
            Self::SharedTagRatio => {
                let largest = source.tags().len().max(target.tags().len());
                if largest == 0 {
                    return Some(0.0);
                }
                Some(shared_tag_count(source, target) as f64 / largest as f64)
            }
            Self::NumericProperty { origin, path } => origin
                .resolve(source, target, ctx, path)
                .and_then(PropertyValue::as_num),
            Self::Average { formulas } => {
                let values: Vec<f64> = formulas
                    .iter()
                    .filter_map(|f| f.evaluate(source, target, ctx))
                    .collect();
                if values.is_empty() {
                    return None;
                }
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
    }
}

/// Where a property mapping or numeric formula reads its value from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueOrigin {
    /// The source item's attributes.
    Source,
    /// The target item's attributes.
    Target,
    /// The context's shared bag.
    Context,
}

impl ValueOrigin {
    fn resolve<'a>(
        &self,
        source: &'a ContextItem,
        target: &'a ContextItem,
        ctx: &'a MappingContext,
        path: &str,
    ) -> Option<&'a PropertyValue> {
        match self {
            Self::Source => source.attribute(path),
            Self::Target => target.attribute(path),
            Self::Context => ctx.shared_value(path),
        }
    }
}

/// Declarative extraction of one output property for a discovered
/// relationship.
///
/// Resolution failure falls back to `default`; with no default the
/// property is omitted. A failed mapping never aborts the relationship.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyMapping {
    /// Output property key.
    pub key: String,

    /// Where to read the value from.
    pub origin: ValueOrigin,

    /// Dotted path at the origin.
    pub path: String,

    /// Fallback when the path does not resolve.
    pub default: Option<PropertyValue>,
}

impl PropertyMapping {
    /// Creates a mapping with no default.
    pub fn new(key: impl Into<String>, origin: ValueOrigin, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            origin,
            path: path.into(),
            default: None,
        }
    }

    /// Sets the fallback value (builder style).
    pub fn with_default(mut self, default: impl Into<PropertyValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Resolves the mapped value for a candidate pair, if any.
    pub fn resolve(
        &self,
        source: &ContextItem,
        target: &ContextItem,
        ctx: &MappingContext,
    ) -> Option<PropertyValue> {
        self.origin
            .resolve(source, target, ctx, &self.path)
            .cloned()
            .or_else(|| self.default.clone())
    }
}

/// Number of tags the two items share.
pub(crate) fn shared_tag_count(source: &ContextItem, target: &ContextItem) -> usize {
    let target_tags = target.tags();
    source
        .tags()
        .iter()
        .filter(|tag| target_tags.contains(tag))
        .count()
}
