//! Record keys and key ranges.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

/// A record key.
///
/// Keys are either integers (the kind auto-increment generators produce) or
/// text (generated unique strings, or application-chosen identifiers).
///
/// # Ordering
///
/// The engine's natural key order sorts all integer keys before all text
/// keys; integers compare numerically and text compares lexicographically.
/// `get_all` and cursors traverse records in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Integer key.
    Int(i64),
    /// Text key.
    Text(String),
}

impl Key {
    /// Returns the integer value if this is an integer key.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Returns the text value if this is a text key.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Text(value) => Some(value),
        }
    }

    /// Extracts a key from a JSON value.
    ///
    /// Only integers and strings are valid keys; anything else yields `None`.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Returns the JSON representation of the key.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Int(value) => serde_json::Value::from(*value),
            Self::Text(value) => serde_json::Value::from(value.clone()),
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            // Integers sort before text in the engine's key order.
            (Self::Int(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A range of keys for filtered reads and cursor iteration.
///
/// # Example
///
/// ```rust
/// use stashdb_engine::{Key, KeyRange};
///
/// let range = KeyRange::bound(1, 10, false, false);
/// assert!(range.contains(&Key::Int(5)));
/// assert!(!range.contains(&Key::Int(11)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyRange {
    lower: Option<Key>,
    upper: Option<Key>,
    lower_open: bool,
    upper_open: bool,
}

impl KeyRange {
    /// A range matching exactly one key.
    #[must_use]
    pub fn only(key: impl Into<Key>) -> Self {
        let key = key.into();
        Self {
            lower: Some(key.clone()),
            upper: Some(key),
            lower_open: false,
            upper_open: false,
        }
    }

    /// A range of all keys at or above `key` (`open` excludes `key` itself).
    #[must_use]
    pub fn lower_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: Some(key.into()),
            upper: None,
            lower_open: open,
            upper_open: false,
        }
    }

    /// A range of all keys at or below `key` (`open` excludes `key` itself).
    #[must_use]
    pub fn upper_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: None,
            upper: Some(key.into()),
            lower_open: false,
            upper_open: open,
        }
    }

    /// A range between `lower` and `upper` with per-edge openness.
    #[must_use]
    pub fn bound(
        lower: impl Into<Key>,
        upper: impl Into<Key>,
        lower_open: bool,
        upper_open: bool,
    ) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: Some(upper.into()),
            lower_open,
            upper_open,
        }
    }

    /// Whether `key` falls within the range.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        if let Some(lower) = &self.lower {
            match key.cmp(lower) {
                Ordering::Less => return false,
                Ordering::Equal if self.lower_open => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match key.cmp(upper) {
                Ordering::Greater => return false,
                Ordering::Equal if self.upper_open => return false,
                _ => {}
            }
        }
        true
    }

    /// Whether the range can match no key at all (lower above upper).
    pub(crate) fn is_degenerate(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match lower.cmp(upper) {
                Ordering::Greater => true,
                Ordering::Equal => self.lower_open || self.upper_open,
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    /// Bounds usable with `BTreeMap::range`.
    pub(crate) fn bounds(&self) -> (Bound<&Key>, Bound<&Key>) {
        let lower = match &self.lower {
            None => Bound::Unbounded,
            Some(key) if self.lower_open => Bound::Excluded(key),
            Some(key) => Bound::Included(key),
        };
        let upper = match &self.upper {
            None => Bound::Unbounded,
            Some(key) if self.upper_open => Bound::Excluded(key),
            Some(key) => Bound::Included(key),
        };
        (lower, upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn int_ordering() {
        assert!(Key::Int(1) < Key::Int(2));
        assert!(Key::Int(-5) < Key::Int(0));
    }

    #[test]
    fn text_ordering() {
        assert!(Key::Text("a".into()) < Key::Text("b".into()));
    }

    #[test]
    fn int_sorts_before_text() {
        assert!(Key::Int(i64::MAX) < Key::Text(String::new()));
    }

    #[test]
    fn from_value_rejects_non_keys() {
        assert_eq!(Key::from_value(&serde_json::json!(true)), None);
        assert_eq!(Key::from_value(&serde_json::json!(null)), None);
        assert_eq!(Key::from_value(&serde_json::json!([1])), None);
        assert_eq!(Key::from_value(&serde_json::json!(7)), Some(Key::Int(7)));
    }

    #[test]
    fn value_roundtrip() {
        let key = Key::Text("abc".into());
        assert_eq!(Key::from_value(&key.to_value()), Some(key));
    }

    #[test]
    fn only_matches_single_key() {
        let range = KeyRange::only(3);
        assert!(range.contains(&Key::Int(3)));
        assert!(!range.contains(&Key::Int(2)));
        assert!(!range.contains(&Key::Int(4)));
    }

    #[test]
    fn open_bounds_exclude_edges() {
        let range = KeyRange::bound(1, 5, true, true);
        assert!(!range.contains(&Key::Int(1)));
        assert!(range.contains(&Key::Int(2)));
        assert!(range.contains(&Key::Int(4)));
        assert!(!range.contains(&Key::Int(5)));
    }

    #[test]
    fn degenerate_ranges() {
        assert!(KeyRange::bound(5, 1, false, false).is_degenerate());
        assert!(KeyRange::bound(3, 3, true, false).is_degenerate());
        assert!(!KeyRange::only(3).is_degenerate());
    }

    proptest! {
        #[test]
        fn any_int_sorts_before_any_text(n in any::<i64>(), s in ".*") {
            prop_assert!(Key::Int(n) < Key::Text(s));
        }

        #[test]
        fn closed_bound_contains_matches_comparison(
            lower in -100i64..100,
            upper in -100i64..100,
            probe in -100i64..100,
        ) {
            let range = KeyRange::bound(lower, upper, false, false);
            prop_assert_eq!(
                range.contains(&Key::Int(probe)),
                lower <= probe && probe <= upper
            );
        }
    }
}
