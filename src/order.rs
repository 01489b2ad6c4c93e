//! Ordering pass - deterministic sibling layout order.
//!
//! After structural changes, every touched node (plus its ancestors, plus
//! recursively the container children of any container in that set) gets a
//! recomputed numeric layout priority:
//!
//! ```text
//! order = sibling_index + bucket(kind) [+ element_count * 100]
//! ```
//!
//! Sibling index comes from sorting the current siblings: numeric keys
//! before text keys, numeric compared numerically, text compared
//! case-insensitively (or sensitively, per config), ties broken by raw key
//! text. Buckets are large per-kind offsets so siblings group by kind. The
//! pass is idempotent; only changed orders are pushed to the surface.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::ViewerConfig;
use crate::reconcile::push_refresh;
use crate::surface::DisplaySurface;
use crate::tree::{AssocTree, NodeId};
use crate::value::{Key, ValueKind};

/// Weight per contained element when size-based ordering is enabled.
const SIZE_WEIGHT: i64 = 100;

// =============================================================================
// Pass
// =============================================================================

/// Recompute layout order for the touched set and push changed orders.
pub fn ordering_pass<S: DisplaySurface>(
    tree: &mut AssocTree,
    surface: &mut S,
    config: &ViewerConfig,
    touched: &FxHashSet<NodeId>,
) {
    // Touched nodes and their ancestors
    let mut targets: FxHashSet<NodeId> = FxHashSet::default();
    for &id in touched {
        if tree.get(id).is_none() {
            continue;
        }
        targets.insert(id);
        for ancestor in tree.ancestors(id) {
            targets.insert(ancestor);
        }
    }

    // Plus, recursively, container children of containers in the set
    let mut stack: Vec<NodeId> = targets.iter().copied().collect();
    while let Some(id) = stack.pop() {
        if !tree.get(id).is_some_and(|n| n.is_container()) {
            continue;
        }
        for child in tree.child_ids(id) {
            let is_container = tree.get(child).is_some_and(|n| n.is_container());
            if is_container && targets.insert(child) {
                stack.push(child);
            }
        }
    }

    let mut targets: Vec<NodeId> = targets.into_iter().collect();
    targets.sort_unstable();

    // Sorted sibling keys, computed once per parent
    let mut sibling_cache: FxHashMap<NodeId, Vec<Key>> = FxHashMap::default();

    for id in targets {
        if id == tree.root() {
            continue;
        }
        let Some(node) = tree.get(id) else { continue };
        let Some(parent) = node.parent else { continue };
        let key = node.key.clone();
        let kind = node.kind();
        let count = node.child_count();

        let siblings = sibling_cache
            .entry(parent)
            .or_insert_with(|| sorted_sibling_keys(tree, parent, config));
        let base = siblings.iter().position(|k| *k == key).unwrap_or(0) as i64;

        let mut order = base + config.order_buckets.get(kind);
        if kind == ValueKind::Container && config.size_weighted_ordering {
            order += count as i64 * SIZE_WEIGHT;
        }

        let changed = match tree.get_mut(id) {
            Some(node) if node.order != order => {
                node.order = order;
                true
            }
            _ => false,
        };
        if changed {
            push_refresh(tree, surface, config, id);
        }
    }
}

// =============================================================================
// Sibling sort
// =============================================================================

fn sorted_sibling_keys(tree: &AssocTree, parent: NodeId, config: &ViewerConfig) -> Vec<Key> {
    let mut keys: Vec<Key> = tree
        .get(parent)
        .and_then(|n| n.children.as_ref())
        .map(|c| c.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort_by(|a, b| sibling_cmp(a, b, config.case_sensitive_filter));
    keys
}

/// Numeric keys first, then text; ties broken by raw key text.
fn sibling_cmp(a: &Key, b: &Key, case_sensitive: bool) -> Ordering {
    match (a, b) {
        (Key::Number(x), Key::Number(y)) => x.total_cmp(y),
        (Key::Number(_), Key::Text(_)) => Ordering::Less,
        (Key::Text(_), Key::Number(_)) => Ordering::Greater,
        (Key::Text(x), Key::Text(y)) => {
            if case_sensitive {
                x.cmp(y)
            } else {
                x.to_lowercase().cmp(&y.to_lowercase()).then_with(|| x.cmp(y))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
