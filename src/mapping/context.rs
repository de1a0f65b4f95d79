//! Candidate-item pools for schema application.
//!
//! A [`MappingContext`] maps item-type names to ordered lists of
//! candidate items. Rules draw their cross-products from these pools;
//! conditions and confidence formulas read item attributes and the
//! context-wide shared bag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{lookup_path, ItemRef, PropertyMap, PropertyValue};

/// One candidate knowledge item offered to the mapping engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Item identifier, unique within its type.
    pub id: String,

    /// Item type name; decides which pool the item lands in.
    pub item_type: String,

    /// Arbitrary attributes consumed by rule conditions and confidence
    /// formulas. Tags conventionally live under `"tags"` as a list of
    /// strings.
    pub attributes: PropertyMap,
}

impl ContextItem {
    /// Creates an item with no attributes.
    pub fn new(item_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: item_type.into(),
            attributes: PropertyMap::new(),
        }
    }

    /// Adds one attribute (builder style).
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds a `"tags"` attribute from a list of strings (builder style).
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = tags
            .into_iter()
            .map(|t| PropertyValue::Str(t.into()))
            .collect();
        self.attributes
            .insert("tags".to_string(), PropertyValue::List(list));
        self
    }

    /// Looks up a dotted attribute path.
    pub fn attribute(&self, path: &str) -> Option<&PropertyValue> {
        lookup_path(&self.attributes, path)
    }

    /// The item's tags (the string entries of its `"tags"` list
    /// attribute; empty when absent).
    pub fn tags(&self) -> Vec<&str> {
        self.attributes
            .get("tags")
            .and_then(PropertyValue::as_list)
            .map(|items| items.iter().filter_map(PropertyValue::as_str).collect())
            .unwrap_or_default()
    }

    /// The endpoint reference for relationships produced from this item.
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.item_type.clone(), self.id.clone())
    }
}

/// Pools of candidate items, keyed by item type, plus a context-wide
/// shared attribute bag.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MappingContext {
    pools: BTreeMap<String, Vec<ContextItem>>,

    /// Attributes shared by the whole run, readable from rule
    /// conditions and property mappings.
    pub shared: PropertyMap,
}

impl MappingContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item to the pool named by its `item_type`.
    pub fn add_item(&mut self, item: ContextItem) {
        self.pools.entry(item.item_type.clone()).or_default().push(item);
    }

    /// Adds an item (builder style).
    pub fn with_item(mut self, item: ContextItem) -> Self {
        self.add_item(item);
        self
    }

    /// Sets a shared attribute (builder style).
    pub fn with_shared(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.shared.insert(key.into(), value.into());
        self
    }

    /// The pool for an item type; empty when no such items were added.
    pub fn pool(&self, item_type: &str) -> &[ContextItem] {
        self.pools.get(item_type).map_or(&[], Vec::as_slice)
    }

    /// Looks up a dotted path in the shared attribute bag.
    pub fn shared_value(&self, path: &str) -> Option<&PropertyValue> {
        lookup_path(&self.shared, path)
    }

    /// Total number of items across all pools.
    pub fn item_count(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_land_in_typed_pools() {
        let ctx = MappingContext::new()
            .with_item(ContextItem::new("decision", "d1"))
            .with_item(ContextItem::new("decision", "d2"))
            .with_item(ContextItem::new("pattern", "p1"));

        assert_eq!(ctx.pool("decision").len(), 2);
        assert_eq!(ctx.pool("pattern").len(), 1);
        assert!(ctx.pool("unknown").is_empty());
        assert_eq!(ctx.item_count(), 3);
    }

    #[test]
    fn test_tags_helper() {
        let item = ContextItem::new("decision", "d1").with_tags(["architecture", "scalability"]);
        assert_eq!(item.tags(), vec!["architecture", "scalability"]);

        let untagged = ContextItem::new("decision", "d2");
        assert!(untagged.tags().is_empty());
    }

    #[test]
    fn test_attribute_path_lookup() {
        let mut meta = PropertyMap::new();
        meta.insert("owner".into(), "platform".into());
        let item = ContextItem::new("pattern", "p1")
            .with_attribute("meta", PropertyValue::Map(meta))
            .with_attribute("status", "adopted");

        assert_eq!(
            item.attribute("meta.owner").and_then(PropertyValue::as_str),
            Some("platform")
        );
        assert_eq!(
            item.attribute("status").and_then(PropertyValue::as_str),
            Some("adopted")
        );
        assert!(item.attribute("missing").is_none());
    }

    #[test]
    fn test_shared_values() {
        let ctx = MappingContext::new().with_shared("workspace", "main");
        assert_eq!(
            ctx.shared_value("workspace").and_then(PropertyValue::as_str),
            Some("main")
        );
    }

    #[test]
    fn test_item_ref() {
        let item = ContextItem::new("decision", "d1");
        assert_eq!(item.item_ref(), ItemRef::new("decision", "d1"));
    }
}
