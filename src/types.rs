//! Core type definitions for relgraph identifiers, timestamps, and
//! property values.
//!
//! Relationship IDs are deterministic: the same endpoint pair and
//! relationship type always derive the same ID, which is what makes
//! deduplication and idempotent re-adds work. A time-ordered UUID v7
//! suffix is appended only when a duplicate record must coexist.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relationship identifier.
///
/// Derived deterministically from the relationship's endpoints and type
/// (see [`RelationshipId::derive`]), so re-adding the same logical edge
/// reproduces the same ID. Callers may also supply their own IDs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipId(pub String);

impl RelationshipId {
    /// Creates a RelationshipId from an arbitrary string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the canonical ID for a `(source, target, type)` triple.
    ///
    /// # Example
    /// ```
    /// use relgraph::{ItemRef, RelationshipId};
    ///
    /// let id = RelationshipId::derive(
    ///     &ItemRef::new("decision", "d1"),
    ///     &ItemRef::new("pattern", "p1"),
    ///     "implements",
    /// );
    /// assert_eq!(id.as_str(), "decision:d1->pattern:p1:implements");
    /// ```
    pub fn derive(source: &ItemRef, target: &ItemRef, relationship_type: &str) -> Self {
        Self(format!(
            "{}:{}->{}:{}:{}",
            source.item_type, source.id, target.item_type, target.id, relationship_type
        ))
    }

    /// Returns a copy of this ID with a time-ordered UUID v7 suffix.
    ///
    /// Used when a derived ID is already taken and the new record must
    /// coexist with the old one rather than replace it.
    pub fn with_unique_suffix(&self) -> Self {
        Self(format!("{}-{}", self.0, Uuid::now_v7()))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RelationshipId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Mapping schema identifier.
///
/// Defaults to `"{name}@{version}"` when a schema is registered without
/// an explicit ID.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaId(pub String);

impl SchemaId {
    /// Creates a SchemaId from an arbitrary string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the default ID for a schema name and version.
    pub fn derive(name: &str, version: &str) -> Self {
        Self(format!("{name}@{version}"))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SchemaId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Reference to a knowledge item: a free-form type name plus an ID.
///
/// Item types are not validated against a closed registry — "decision",
/// "pattern", or anything else a caller's domain defines is acceptable.
/// `ItemRef` is hashable so it can key endpoint indices and traversal
/// visited sets.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    /// Item type name (e.g. "decision", "pattern").
    pub item_type: String,
    /// Item identifier, unique within its type.
    pub id: String,
}

impl ItemRef {
    /// Creates an item reference.
    pub fn new(item_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.item_type, self.id)
    }
}

/// Unix timestamp in milliseconds.
///
/// Using i64 allows representing dates far into the future and past.
/// Millisecond precision is sufficient for relationship metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch (should never happen
    /// in practice), returns a timestamp of 0 (epoch) rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// The Unix epoch (0 ms). Used as the ordering fallback for records
    /// without metadata.
    #[inline]
    pub const fn epoch() -> Self {
        Self(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Open key/value property bag.
///
/// A `BTreeMap` rather than a `HashMap` so that serialized forms are
/// deterministic — query cache keys hash the canonical JSON of a query,
/// including its property filters.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A property value: one of string, number, bool, list, or nested map.
///
/// Relationships, mapping-context items, and query filters all carry
/// open-ended attributes as `PropertyValue` trees, keeping serialization
/// and comparison well-defined without resorting to untyped blobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// Numeric value (stored as f64).
    Num(f64),
    /// String value.
    Str(String),
    /// Ordered list of values.
    List(Vec<PropertyValue>),
    /// Nested map of values.
    Map(PropertyMap),
}

impl PropertyValue {
    /// Returns the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric content, if this is a number.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the list content, if this is a list.
    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the map content, if this is a nested map.
    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(items: Vec<PropertyValue>) -> Self {
        Self::List(items)
    }
}

/// Looks up a dotted path (e.g. `"meta.owner"`) in a property map.
///
/// Each path segment descends into a nested [`PropertyValue::Map`];
/// returns `None` if any segment is missing or a non-map value is hit
/// before the final segment.
pub fn lookup_path<'a>(map: &'a PropertyMap, path: &str) -> Option<&'a PropertyValue> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = map.get(first)?;
    for segment in segments {
        current = current.as_map()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_id_derive_is_deterministic() {
        let source = ItemRef::new("decision", "d1");
        let target = ItemRef::new("pattern", "p1");
        let a = RelationshipId::derive(&source, &target, "implements");
        let b = RelationshipId::derive(&source, &target, "implements");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "decision:d1->pattern:p1:implements");
    }

    #[test]
    fn test_relationship_id_suffix_is_unique() {
        let base = RelationshipId::new("decision:d1->pattern:p1:implements");
        let a = base.with_unique_suffix();
        let b = base.with_unique_suffix();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(base.as_str()));
    }

    #[test]
    fn test_schema_id_derive() {
        let id = SchemaId::derive("architecture", "1.2.0");
        assert_eq!(id.as_str(), "architecture@1.2.0");
    }

    #[test]
    fn test_item_ref_display() {
        let item = ItemRef::new("decision", "d1");
        assert_eq!(format!("{item}"), "decision:d1");
    }

    #[test]
    fn test_item_ref_equality_and_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ItemRef::new("decision", "d1"));
        assert!(set.contains(&ItemRef::new("decision", "d1")));
        assert!(!set.contains(&ItemRef::new("pattern", "d1")));
    }

    #[test]
    fn test_timestamp_now() {
        let t1 = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let t2 = Timestamp::now();
        assert!(t1 < t2, "Timestamps should be ordered");
    }

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_millis(1000);
        let t2 = Timestamp::from_millis(2000);
        assert!(t1 < t2);
        assert_eq!(Timestamp::epoch(), Timestamp::from_millis(0));
    }

    #[test]
    fn test_property_value_accessors() {
        assert_eq!(PropertyValue::from("x").as_str(), Some("x"));
        assert_eq!(PropertyValue::from(0.5).as_num(), Some(0.5));
        assert_eq!(PropertyValue::from(true).as_bool(), Some(true));
        assert!(PropertyValue::from("x").as_num().is_none());
    }

    #[test]
    fn test_property_value_json_roundtrip() {
        let mut map = PropertyMap::new();
        map.insert("strength".into(), PropertyValue::from(0.8));
        map.insert(
            "tags".into(),
            PropertyValue::List(vec!["architecture".into(), "scalability".into()]),
        );
        let json = serde_json::to_string(&map).unwrap();
        let restored: PropertyMap = serde_json::from_str(&json).unwrap();
        assert_eq!(map, restored);
    }

    #[test]
    fn test_property_map_serialization_is_deterministic() {
        let mut a = PropertyMap::new();
        a.insert("b".into(), PropertyValue::from(1.0));
        a.insert("a".into(), PropertyValue::from(2.0));

        let mut b = PropertyMap::new();
        b.insert("a".into(), PropertyValue::from(2.0));
        b.insert("b".into(), PropertyValue::from(1.0));

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_lookup_path_flat_and_nested() {
        let mut inner = PropertyMap::new();
        inner.insert("owner".into(), PropertyValue::from("core-team"));
        let mut map = PropertyMap::new();
        map.insert("description".into(), PropertyValue::from("shared pattern"));
        map.insert("meta".into(), PropertyValue::Map(inner));

        assert_eq!(
            lookup_path(&map, "description").and_then(|v| v.as_str()),
            Some("shared pattern")
        );
        assert_eq!(
            lookup_path(&map, "meta.owner").and_then(|v| v.as_str()),
            Some("core-team")
        );
        assert!(lookup_path(&map, "meta.missing").is_none());
        assert!(lookup_path(&map, "description.owner").is_none());
    }
}
