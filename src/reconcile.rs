//! Reconciler - walks a delta against the association tree.
//!
//! For each delta entry the reconciler creates, mutates, or destroys
//! association nodes and issues the matching create/refresh/destroy calls to
//! the display surface. Node lifecycle is strict: absent → created →
//! updated* → destroyed. A key whose value changes kind (container to scalar
//! or back) gets a brand-new node and handle; the old subtree is destroyed
//! first.
//!
//! Handle destruction is best-effort: surface failures are logged at trace
//! level and never propagate. A removal for a key with no association is a
//! recoverable no-op.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::config::ViewerConfig;
use crate::diff::{Delta, DeltaEntry};
use crate::format::{container_summary, format_key, format_value, truncate_display};
use crate::surface::{DisplaySurface, HandleSpec, RefreshProps};
use crate::tree::{AssocNode, AssocTree, NodeFlags, NodeId};
use crate::value::{Key, ValueKind};

// =============================================================================
// Refresh
// =============================================================================

/// Push the node's current display state to its handle.
///
/// Shared by the reconciler and the ordering/visibility passes; the root
/// (no handle) is silently skipped.
pub(crate) fn push_refresh<S: DisplaySurface>(
    tree: &AssocTree,
    surface: &mut S,
    config: &ViewerConfig,
    id: NodeId,
) {
    let Some(node) = tree.get(id) else { return };
    let Some(handle) = node.handle else { return };

    let value_text = match (&node.children, &node.scalar) {
        (Some(children), _) => truncate_display(
            &container_summary(children.len(), config.summarize_containers),
            config.truncate_width,
        ),
        (None, Some(value)) => format_value(value, &config.format_options()),
        (None, None) => String::new(),
    };

    let props = RefreshProps {
        key_text: format_key(&node.key),
        value_text,
        kind_color: config.kind_colors.get(node.kind()),
        expandable: node.is_container() && node.child_count() > 0,
        indent: node.depth,
        layout_order: node.order,
        visible: node.flags.contains(NodeFlags::VISIBLE),
    };
    surface.refresh(handle, &props);
}

// =============================================================================
// Reconcile
// =============================================================================

/// Walk `delta` under `parent`, mutating the association tree and the
/// display surface. Every node visited lands in `touched`.
pub fn reconcile<S: DisplaySurface>(
    tree: &mut AssocTree,
    surface: &mut S,
    config: &ViewerConfig,
    parent: NodeId,
    delta: &Delta,
    depth: u16,
    touched: &mut FxHashSet<NodeId>,
) {
    for (key, entry) in delta.iter() {
        match entry {
            DeltaEntry::Removed => {
                remove_association(tree, surface, parent, key, touched);
            }
            DeltaEntry::Nested(sub) => {
                let id = locate_or_create(
                    tree,
                    surface,
                    config,
                    parent,
                    key,
                    depth,
                    ValueKind::Container,
                    touched,
                );
                touched.insert(id);
                reconcile(tree, surface, config, id, sub, depth + 1, touched);
                push_refresh(tree, surface, config, id);
            }
            DeltaEntry::Scalar(value) => {
                let id = locate_or_create(
                    tree,
                    surface,
                    config,
                    parent,
                    key,
                    depth,
                    value.kind(),
                    touched,
                );
                if let Some(node) = tree.get_mut(id) {
                    node.scalar = Some(value.clone());
                }
                touched.insert(id);
                push_refresh(tree, surface, config, id);

                // Keep the parent's element-count summary current
                let parent_has_handle =
                    tree.get(parent).is_some_and(|n| n.handle.is_some());
                if parent_has_handle {
                    push_refresh(tree, surface, config, parent);
                }
            }
        }
    }
}

/// Find the association for `key` under `parent`, or create one.
///
/// An existing node whose container-ness does not match `kind` is destroyed
/// (with its subtree handles) and replaced by a fresh node with a fresh
/// handle: removal-then-addition.
fn locate_or_create<S: DisplaySurface>(
    tree: &mut AssocTree,
    surface: &mut S,
    config: &ViewerConfig,
    parent: NodeId,
    key: &Key,
    depth: u16,
    kind: ValueKind,
    touched: &mut FxHashSet<NodeId>,
) -> NodeId {
    let container = kind == ValueKind::Container;
    if let Some(existing) = tree.child(parent, key) {
        let existing_container = tree
            .get(existing)
            .is_some_and(|node| node.is_container());
        if existing_container == container {
            return existing;
        }
        // Kind change at this path: old identity goes away
        remove_association(tree, surface, parent, key, touched);
    }

    let mut flags = NodeFlags::VISIBLE;
    if container && config.default_expanded {
        flags.insert(NodeFlags::EXPANDED);
    }
    let id = tree.insert_child(
        parent,
        AssocNode {
            key: key.clone(),
            scalar: None,
            children: container.then(BTreeMap::new),
            parent: Some(parent),
            depth,
            handle: None,
            order: 0,
            flags,
        },
    );

    let spec = HandleSpec {
        key_text: format_key(key),
        kind,
        depth,
        container,
        expanded: flags.contains(NodeFlags::EXPANDED),
    };
    let handle = surface.create_handle(&spec);
    if let Some(node) = tree.get_mut(id) {
        node.handle = Some(handle);
    }
    id
}

/// Detach and destroy the association for `key` under `parent`, including
/// every descendant's handle (children first).
fn remove_association<S: DisplaySurface>(
    tree: &mut AssocTree,
    surface: &mut S,
    parent: NodeId,
    key: &Key,
    touched: &mut FxHashSet<NodeId>,
) {
    match tree.detach(parent, key) {
        Some(id) => {
            touched.remove(&id);
            for handle in tree.release_subtree(id) {
                if let Err(err) = surface.destroy_handle(handle) {
                    trace!(?handle, %err, "handle destruction failed, ignoring");
                }
            }
            touched.insert(parent);
        }
        None => {
            debug!(key = %format_key(key), "no association for removed key, skipping");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::surface::RecordingSurface;
    use crate::value::{Table, Value};

    fn run(
        tree: &mut AssocTree,
        surface: &mut RecordingSurface,
        new: &Table,
        old: &Table,
    ) -> FxHashSet<NodeId> {
        let config = ViewerConfig::default();
        let delta = diff(new, old);
        let mut touched = FxHashSet::default();
        let root = tree.root();
        reconcile(tree, surface, &config, root, &delta, 0, &mut touched);
        touched
    }

    fn table(entries: Vec<(&str, Value)>) -> Table {
        entries
            .into_iter()
            .map(|(k, v)| (Key::from(k), v))
            .collect()
    }

    #[test]
    fn test_initial_population_creates_handles() {
        let mut tree = AssocTree::new();
        let mut surface = RecordingSurface::new();
        let data = table(vec![
            ("a", Value::from(1i64)),
            ("b", [(Key::from("x"), Value::from("hi"))].into_iter().collect()),
        ]);

        run(&mut tree, &mut surface, &data, &Table::new());

        // a, b, b.x
        assert_eq!(surface.created.len(), 3);
        assert_eq!(surface.live_count(), 3);
        assert_eq!(tree.len(), 4); // root included

        let b_spec = &surface
            .created
            .iter()
            .find(|(_, s)| s.key_text == "b")
            .unwrap()
            .1;
        assert!(b_spec.container);
        assert_eq!(b_spec.depth, 0);

        let x_spec = &surface
            .created
            .iter()
            .find(|(_, s)| s.key_text == "x")
            .unwrap()
            .1;
        assert_eq!(x_spec.depth, 1);
    }

    #[test]
    fn test_scalar_update_keeps_handle() {
        let mut tree = AssocTree::new();
        let mut surface = RecordingSurface::new();
        let v1 = table(vec![("a", Value::from(1i64))]);
        let v2 = table(vec![("a", Value::from(2i64))]);

        run(&mut tree, &mut surface, &v1, &Table::new());
        let handle = tree
            .get(tree.child(tree.root(), &Key::from("a")).unwrap())
            .unwrap()
            .handle
            .unwrap();

        run(&mut tree, &mut surface, &v2, &v1);

        // No new handle, value refreshed in place
        assert_eq!(surface.created.len(), 1);
        assert!(surface.destroyed.is_empty());
        assert_eq!(surface.last_props(handle).unwrap().value_text, "2");
    }

    #[test]
    fn test_removal_destroys_subtree_handles() {
        let mut tree = AssocTree::new();
        let mut surface = RecordingSurface::new();
        let v1 = table(vec![(
            "a",
            [(Key::from("b"), Value::from(1i64))].into_iter().collect(),
        )]);

        run(&mut tree, &mut surface, &v1, &Table::new());
        assert_eq!(surface.live_count(), 2);

        run(&mut tree, &mut surface, &Table::new(), &v1);
        assert_eq!(surface.live_count(), 0);
        assert_eq!(surface.destroyed.len(), 2);
        assert_eq!(tree.len(), 1); // only the root survives
    }

    #[test]
    fn test_kind_change_recreates_node() {
        let mut tree = AssocTree::new();
        let mut surface = RecordingSurface::new();
        let scalar = table(vec![("a", Value::from(5i64))]);
        let container = table(vec![(
            "a",
            [(Key::from("b"), Value::from(1i64))].into_iter().collect(),
        )]);

        run(&mut tree, &mut surface, &scalar, &Table::new());
        let first = surface.handle_for_key("a").unwrap();

        run(&mut tree, &mut surface, &container, &scalar);
        let second = surface.handle_for_key("a").unwrap();

        // New identity: old handle destroyed, new one created
        assert_ne!(first, second);
        assert!(!surface.is_live(first));
        assert!(surface.is_live(second));

        // And back again
        run(&mut tree, &mut surface, &scalar, &container);
        let third = surface.handle_for_key("a").unwrap();
        assert_ne!(second, third);
        assert!(!surface.is_live(second));
    }

    #[test]
    fn test_untouched_sibling_gets_no_calls() {
        let mut tree = AssocTree::new();
        let mut surface = RecordingSurface::new();
        let v1 = table(vec![(
            "b",
            [(Key::from("x"), Value::from("hi"))].into_iter().collect(),
        )]);
        let v2 = table(vec![(
            "b",
            [
                (Key::from("x"), Value::from("hi")),
                (Key::from("y"), Value::from(true)),
            ]
            .into_iter()
            .collect(),
        )]);

        run(&mut tree, &mut surface, &v1, &Table::new());
        let x_handle = surface.handle_for_key("x").unwrap();
        let before = surface.refresh_count(x_handle);

        run(&mut tree, &mut surface, &v2, &v1);
        assert_eq!(surface.refresh_count(x_handle), before);
    }

    #[test]
    fn test_parent_summary_refreshed_on_child_change() {
        let mut tree = AssocTree::new();
        let mut surface = RecordingSurface::new();
        let v1 = table(vec![(
            "b",
            [(Key::from("x"), Value::from(1i64))].into_iter().collect(),
        )]);
        let v2 = table(vec![(
            "b",
            [
                (Key::from("x"), Value::from(1i64)),
                (Key::from("y"), Value::from(2i64)),
            ]
            .into_iter()
            .collect(),
        )]);

        run(&mut tree, &mut surface, &v1, &Table::new());
        run(&mut tree, &mut surface, &v2, &v1);

        let b_handle = surface.handle_for_key("b").unwrap();
        let props = surface.last_props(b_handle).unwrap();
        assert_eq!(props.value_text, "[2 items]");
        assert!(props.expandable);
    }

    #[test]
    fn test_removal_of_unknown_key_is_a_noop() {
        let mut tree = AssocTree::new();
        let mut surface = RecordingSurface::new();
        let mut delta = Delta::default();
        delta.insert(Key::from("ghost"), DeltaEntry::Removed);

        let config = ViewerConfig::default();
        let mut touched = FxHashSet::default();
        let root = tree.root();
        reconcile(&mut tree, &mut surface, &config, root, &delta, 0, &mut touched);

        assert!(surface.destroyed.is_empty());
        assert_eq!(tree.len(), 1);
    }
}
