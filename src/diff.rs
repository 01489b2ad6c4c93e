//! Structural diff/patch over value trees.
//!
//! A [`Delta`] is a tree isomorphic in shape to the parts of the data that
//! changed. Each key maps to a removal marker, a new scalar, or a nested
//! delta for a changed container. Absence means "unchanged".
//!
//! Deltas are built in two ordered phases: removals first (recursively,
//! pruning empty subtrees), then additions/mutations overlaid on top. A key
//! that changes kind (container to scalar or back) first receives a removal
//! entry which the addition phase then overwrites; the reconciler restores
//! the removal-then-addition semantics by destroying and recreating the
//! node at that path.
//!
//! Round-trip law: `apply_delta(old.clone(), diff(new, old))` is
//! structurally equal to `new` for any two trees of the fixed domain.

use crate::value::{Key, Table, Value};

// =============================================================================
// Delta
// =============================================================================

/// One entry in a delta: what happened to a key.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaEntry {
    /// The key was removed. Distinct from any legal value.
    Removed,
    /// The key holds a new or changed non-container value.
    Scalar(Value),
    /// The key is a container with changes inside (or a brand-new container,
    /// in which case every nested entry is an addition).
    Nested(Delta),
}

/// The structural difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delta {
    entries: std::collections::BTreeMap<Key, DeltaEntry>,
}

impl Delta {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entry for a key, if the key changed.
    pub fn get(&self, key: &Key) -> Option<&DeltaEntry> {
        self.entries.get(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &DeltaEntry)> {
        self.entries.iter()
    }

    /// Insert an entry, replacing any prior entry for the key.
    pub fn insert(&mut self, key: Key, entry: DeltaEntry) {
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &Key) -> Option<DeltaEntry> {
        self.entries.remove(key)
    }

    /// A delta in which every key of `table` is an addition.
    pub fn verbatim(table: &Table) -> Self {
        let mut delta = Delta::default();
        for (key, value) in table {
            let entry = match value {
                Value::Table(t) => DeltaEntry::Nested(Delta::verbatim(t)),
                other => DeltaEntry::Scalar(other.clone()),
            };
            delta.insert(key.clone(), entry);
        }
        delta
    }

    /// Rebuild the table a verbatim delta describes. Removal entries are
    /// skipped; they never occur in the verbatim deltas this is used on.
    pub fn materialize(&self) -> Table {
        let mut table = Table::new();
        for (key, entry) in &self.entries {
            match entry {
                DeltaEntry::Removed => {}
                DeltaEntry::Scalar(v) => {
                    table.insert(key.clone(), v.clone());
                }
                DeltaEntry::Nested(sub) => {
                    table.insert(key.clone(), Value::Table(sub.materialize()));
                }
            }
        }
        table
    }
}

// =============================================================================
// Diff
// =============================================================================

/// Compute the structural delta that turns `old` into `new`.
pub fn diff(new: &Table, old: &Table) -> Delta {
    if old.is_empty() {
        // Everything is an addition
        return Delta::verbatim(new);
    }
    let mut delta = Delta::default();
    record_removals(&mut delta, new, old);
    overlay_additions(&mut delta, new, old);
    delta
}

/// Phase 1: walk `old`, marking keys that vanished or changed kind.
fn record_removals(delta: &mut Delta, new: &Table, old: &Table) {
    for (key, old_val) in old {
        match new.get(key) {
            None => {
                delta.insert(key.clone(), DeltaEntry::Removed);
            }
            Some(new_val) => match (old_val, new_val) {
                (Value::Table(old_t), Value::Table(new_t)) => {
                    let mut sub = Delta::default();
                    record_removals(&mut sub, new_t, old_t);
                    if !sub.is_empty() {
                        delta.insert(key.clone(), DeltaEntry::Nested(sub));
                    }
                }
                (old_v, new_v) if old_v.is_table() != new_v.is_table() => {
                    // Kind change: the old node must go before the new one lands
                    delta.insert(key.clone(), DeltaEntry::Removed);
                }
                _ => {}
            },
        }
    }
}

/// Phase 2: walk `new`, overlaying additions and mutations. An addition at a
/// kind-changed key overwrites the removal recorded in phase 1.
fn overlay_additions(delta: &mut Delta, new: &Table, old: &Table) {
    for (key, new_val) in new {
        match (old.get(key), new_val) {
            (Some(Value::Table(old_t)), Value::Table(new_t)) => {
                // Merge into the removal sub-delta from phase 1, if any
                let mut sub = match delta.remove(key) {
                    Some(DeltaEntry::Nested(sub)) => sub,
                    _ => Delta::default(),
                };
                overlay_additions(&mut sub, new_t, old_t);
                if !sub.is_empty() {
                    delta.insert(key.clone(), DeltaEntry::Nested(sub));
                }
            }
            (Some(old_val), _) if old_val == new_val => {}
            (_, Value::Table(new_t)) => {
                // Brand-new container (or container replacing a scalar)
                delta.insert(key.clone(), DeltaEntry::Nested(Delta::verbatim(new_t)));
            }
            _ => {
                delta.insert(key.clone(), DeltaEntry::Scalar(new_val.clone()));
            }
        }
    }
}

// =============================================================================
// Patch
// =============================================================================

/// Apply a delta onto a plain tree, mutating it in place.
pub fn apply_delta(tree: &mut Table, delta: &Delta) {
    for (key, entry) in delta.iter() {
        match entry {
            DeltaEntry::Removed => {
                tree.remove(key);
            }
            DeltaEntry::Scalar(v) => {
                tree.insert(key.clone(), v.clone());
            }
            DeltaEntry::Nested(sub) => match tree.get_mut(key) {
                Some(Value::Table(t)) => apply_delta(t, sub),
                _ => {
                    tree.insert(key.clone(), Value::Table(sub.materialize()));
                }
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: Vec<(&str, Value)>) -> Table {
        entries
            .into_iter()
            .map(|(k, v)| (Key::from(k), v))
            .collect()
    }

    fn round_trip(new: &Table, old: &Table) {
        let delta = diff(new, old);
        let mut patched = old.clone();
        apply_delta(&mut patched, &delta);
        assert_eq!(&patched, new);
    }

    #[test]
    fn test_diff_self_is_empty() {
        let t = table(vec![
            ("a", Value::from(1i64)),
            ("b", [(Key::from("x"), Value::from("hi"))].into_iter().collect()),
        ]);
        assert!(diff(&t, &t).is_empty());
    }

    #[test]
    fn test_diff_against_empty_is_verbatim() {
        let t = table(vec![
            ("a", Value::from(1i64)),
            ("b", [(Key::from("x"), Value::from("hi"))].into_iter().collect()),
        ]);
        let delta = diff(&t, &Table::new());
        assert_eq!(delta.len(), 2);
        assert_eq!(delta.materialize(), t);
    }

    #[test]
    fn test_incremental_update_delta() {
        // {a=1, b={x="hi"}} -> {a=2, b={x="hi", y=true}, c=false}
        let old = table(vec![
            ("a", Value::from(1i64)),
            ("b", [(Key::from("x"), Value::from("hi"))].into_iter().collect()),
        ]);
        let new = table(vec![
            ("a", Value::from(2i64)),
            (
                "b",
                [
                    (Key::from("x"), Value::from("hi")),
                    (Key::from("y"), Value::from(true)),
                ]
                .into_iter()
                .collect(),
            ),
            ("c", Value::from(false)),
        ]);

        let delta = diff(&new, &old);
        assert_eq!(delta.len(), 3);
        assert_eq!(
            delta.get(&Key::from("a")),
            Some(&DeltaEntry::Scalar(Value::from(2i64)))
        );
        assert_eq!(
            delta.get(&Key::from("c")),
            Some(&DeltaEntry::Scalar(Value::from(false)))
        );
        match delta.get(&Key::from("b")) {
            Some(DeltaEntry::Nested(sub)) => {
                assert_eq!(sub.len(), 1);
                assert_eq!(
                    sub.get(&Key::from("y")),
                    Some(&DeltaEntry::Scalar(Value::from(true)))
                );
                // x unchanged: absent
                assert_eq!(sub.get(&Key::from("x")), None);
            }
            other => panic!("expected nested delta for b, got {other:?}"),
        }

        round_trip(&new, &old);
    }

    #[test]
    fn test_removal_scenario() {
        // {a={b=1}} -> {}
        let old = table(vec![(
            "a",
            [(Key::from("b"), Value::from(1i64))].into_iter().collect(),
        )]);
        let new = Table::new();

        let delta = diff(&new, &old);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.get(&Key::from("a")), Some(&DeltaEntry::Removed));

        round_trip(&new, &old);
    }

    #[test]
    fn test_nested_removal_pruned() {
        let old = table(vec![(
            "a",
            [
                (Key::from("x"), Value::from(1i64)),
                (Key::from("y"), Value::from(2i64)),
            ]
            .into_iter()
            .collect(),
        )]);
        let new = table(vec![(
            "a",
            [(Key::from("x"), Value::from(1i64))].into_iter().collect(),
        )]);

        let delta = diff(&new, &old);
        match delta.get(&Key::from("a")) {
            Some(DeltaEntry::Nested(sub)) => {
                assert_eq!(sub.get(&Key::from("y")), Some(&DeltaEntry::Removed));
                assert_eq!(sub.len(), 1);
            }
            other => panic!("expected nested delta, got {other:?}"),
        }

        round_trip(&new, &old);
    }

    #[test]
    fn test_kind_change_container_to_scalar() {
        let old = table(vec![(
            "a",
            [(Key::from("b"), Value::from(1i64))].into_iter().collect(),
        )]);
        let new = table(vec![("a", Value::from(5i64))]);

        // Addition phase overwrites the removal entry
        let delta = diff(&new, &old);
        assert_eq!(
            delta.get(&Key::from("a")),
            Some(&DeltaEntry::Scalar(Value::from(5i64)))
        );

        round_trip(&new, &old);
    }

    #[test]
    fn test_kind_change_scalar_to_container() {
        let old = table(vec![("a", Value::from(5i64))]);
        let new = table(vec![(
            "a",
            [(Key::from("b"), Value::from(1i64))].into_iter().collect(),
        )]);

        let delta = diff(&new, &old);
        match delta.get(&Key::from("a")) {
            Some(DeltaEntry::Nested(sub)) => assert_eq!(sub.len(), 1),
            other => panic!("expected nested delta, got {other:?}"),
        }

        round_trip(&new, &old);
    }

    #[test]
    fn test_mixed_removal_and_addition_in_one_container() {
        let old = table(vec![(
            "a",
            [
                (Key::from("gone"), Value::from(1i64)),
                (Key::from("kept"), Value::from(2i64)),
            ]
            .into_iter()
            .collect(),
        )]);
        let new = table(vec![(
            "a",
            [
                (Key::from("kept"), Value::from(2i64)),
                (Key::from("fresh"), Value::from(3i64)),
            ]
            .into_iter()
            .collect(),
        )]);

        let delta = diff(&new, &old);
        match delta.get(&Key::from("a")) {
            Some(DeltaEntry::Nested(sub)) => {
                assert_eq!(sub.get(&Key::from("gone")), Some(&DeltaEntry::Removed));
                assert_eq!(
                    sub.get(&Key::from("fresh")),
                    Some(&DeltaEntry::Scalar(Value::from(3i64)))
                );
                assert_eq!(sub.len(), 2);
            }
            other => panic!("expected nested delta, got {other:?}"),
        }

        round_trip(&new, &old);
    }

    #[test]
    fn test_callable_identity_diff() {
        let old = table(vec![("f", Value::Callable(1))]);
        let same = table(vec![("f", Value::Callable(1))]);
        let changed = table(vec![("f", Value::Callable(2))]);

        assert!(diff(&same, &old).is_empty());
        assert!(!diff(&changed, &old).is_empty());
    }

    #[test]
    fn test_numeric_and_text_keys_mix() {
        let old: Table = [
            (Key::from(1i64), Value::from("one")),
            (Key::from("z"), Value::from(true)),
        ]
        .into_iter()
        .collect();
        let new: Table = [
            (Key::from(1i64), Value::from("uno")),
            (Key::from(2i64), Value::from("two")),
        ]
        .into_iter()
        .collect();

        round_trip(&new, &old);
        round_trip(&old, &new);
    }

    #[test]
    fn test_deep_round_trip() {
        let old = table(vec![(
            "root",
            [
                (
                    Key::from("left"),
                    [(Key::from("deep"), Value::from(1.5))].into_iter().collect(),
                ),
                (Key::from("right"), Value::from("text")),
            ]
            .into_iter()
            .collect(),
        )]);
        let new = table(vec![
            (
                "root",
                [
                    (Key::from("left"), Value::from(false)),
                    (
                        Key::from("right"),
                        [(Key::from("born"), Value::External(9))].into_iter().collect(),
                    ),
                ]
                .into_iter()
                .collect(),
            ),
            ("extra", Value::Other("?".to_string())),
        ]);

        round_trip(&new, &old);
        round_trip(&old, &new);
    }
}
