//! Core value domain for treescope.
//!
//! The viewer tracks trees over a small, fixed value domain: booleans,
//! numbers, text, containers, callables, opaque external handles, and a
//! catch-all "other" scalar. Containers are ordered maps so every walk of a
//! tree is deterministic.
//!
//! Cloning a [`Value`] is a deep copy; two consecutive snapshots of the same
//! live structure never share storage.

use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// Key
// =============================================================================

/// A container key: text or number.
///
/// Numeric keys sort before text keys. Numbers use total ordering
/// (`f64::total_cmp`) so NaN keys are legal map keys rather than poison.
#[derive(Debug, Clone)]
pub enum Key {
    /// Numeric key.
    Number(f64),
    /// Text key.
    Text(String),
}

impl Key {
    /// Text key from anything string-like.
    pub fn text(s: impl Into<String>) -> Self {
        Key::Text(s.into())
    }

    /// Numeric key.
    pub fn number(n: f64) -> Self {
        Key::Number(n)
    }

    /// The raw text of a text key, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Key::Text(s) => Some(s.as_str()),
            Key::Number(_) => None,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) => a.total_cmp(b),
            (Key::Number(_), Key::Text(_)) => Ordering::Less,
            (Key::Text(_), Key::Number(_)) => Ordering::Greater,
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(n)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n as f64)
    }
}

// =============================================================================
// ValueKind
// =============================================================================

/// Discriminant of a [`Value`], used for ordering buckets, highlight colors,
/// and kind exclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Number,
    Text,
    Container,
    Callable,
    External,
    Other,
}

impl ValueKind {
    /// All kinds, in bucket-index order.
    pub const ALL: [ValueKind; 7] = [
        ValueKind::Boolean,
        ValueKind::Number,
        ValueKind::Text,
        ValueKind::Container,
        ValueKind::Callable,
        ValueKind::External,
        ValueKind::Other,
    ];

    /// Stable name, used in config tables and exclusion lists.
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::Container => "container",
            ValueKind::Callable => "callable",
            ValueKind::External => "external",
            ValueKind::Other => "other",
        }
    }

    /// Parse a kind name (as used by exclusions and config tables).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Dense index for per-kind tables.
    pub const fn index(self) -> usize {
        match self {
            ValueKind::Boolean => 0,
            ValueKind::Number => 1,
            ValueKind::Text => 2,
            ValueKind::Container => 3,
            ValueKind::Callable => 4,
            ValueKind::External => 5,
            ValueKind::Other => 6,
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A container: ordered key-value mapping, heterogeneous in key type.
pub type Table = BTreeMap<Key, Value>;

/// A value in the fixed domain.
///
/// `Callable` and `External` carry caller-assigned identities and compare by
/// identity only; the viewer never invokes or inspects them.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Table(Table),
    /// Callable with caller-assigned identity.
    Callable(u64),
    /// Opaque external handle with caller-assigned identity.
    External(u64),
    /// Any other scalar, pre-stringified by the caller.
    Other(String),
}

impl Value {
    /// The kind discriminant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Table(_) => ValueKind::Container,
            Value::Callable(_) => ValueKind::Callable,
            Value::External(_) => ValueKind::External,
            Value::Other(_) => ValueKind::Other,
        }
    }

    /// True for containers.
    pub fn is_table(&self) -> bool {
        matches!(self, Value::Table(_))
    }

    /// Borrow the container map, if this is one.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Element count for containers, 0 otherwise.
    pub fn element_count(&self) -> usize {
        match self {
            Value::Table(t) => t.len(),
            _ => 0,
        }
    }

    /// An empty container.
    pub fn empty_table() -> Self {
        Value::Table(Table::new())
    }
}

impl PartialEq for Value {
    /// Structural equality. Numbers compare by total order (so NaN equals
    /// itself and re-diffing a snapshot is a fixpoint); callables and
    /// externals compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b) == Ordering::Equal,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            (Value::External(a), Value::External(b)) => a == b,
            (Value::Other(a), Value::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl FromIterator<(Key, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        Value::Table(iter.into_iter().collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering() {
        // Numeric keys sort before text keys
        assert!(Key::number(99.0) < Key::text("a"));
        assert!(Key::number(1.0) < Key::number(2.0));
        assert!(Key::text("a") < Key::text("b"));
    }

    #[test]
    fn test_nan_key_is_usable() {
        let mut t = Table::new();
        t.insert(Key::number(f64::NAN), Value::from(1i64));
        assert_eq!(t.get(&Key::number(f64::NAN)), Some(&Value::from(1i64)));
    }

    #[test]
    fn test_clone_is_deep() {
        let inner: Value = [(Key::from("x"), Value::from("hi"))].into_iter().collect();
        let outer: Value = [(Key::from("b"), inner)].into_iter().collect();

        let mut copy = outer.clone();
        if let Value::Table(t) = &mut copy {
            if let Some(Value::Table(b)) = t.get_mut(&Key::from("b")) {
                b.insert(Key::from("y"), Value::from(true));
            }
        }
        // Original untouched
        let Value::Table(t) = &outer else { unreachable!() };
        let b = t.get(&Key::from("b")).unwrap().as_table().unwrap();
        assert_eq!(b.len(), 1);
        assert_ne!(outer, copy);
    }

    #[test]
    fn test_identity_comparison() {
        assert_eq!(Value::Callable(7), Value::Callable(7));
        assert_ne!(Value::Callable(7), Value::Callable(8));
        assert_ne!(Value::Callable(7), Value::External(7));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ValueKind::ALL {
            assert_eq!(ValueKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(ValueKind::parse("frobnicator"), None);
    }
}
