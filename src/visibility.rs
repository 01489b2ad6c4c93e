//! Visibility passes - key filters, kind exclusions, pinning, and
//! empty-container hiding.
//!
//! Two explicit walks per cycle. The filter pass re-evaluates the touched
//! subtrees: scalars are visible when their formatted key contains a filter
//! substring (case-folded per config), containers are visible unless
//! excluded, and a container whose own key matches a filter is *pinned* -
//! its entire subtree is forced visible with no further filtering below.
//! Kind exclusions override everything, pins included.
//!
//! The emptiness pass then runs over the whole tree, bottom-up: a container
//! with no visible scalar descendant at any depth is hidden, transitively
//! through container-only chains, and a container that regains a visible
//! descendant becomes visible again. The whole tree is covered because a
//! leaf's visibility change can flip an ancestor arbitrarily far up.

use rustc_hash::FxHashSet;

use crate::config::ViewerConfig;
use crate::format::format_key;
use crate::reconcile::push_refresh;
use crate::surface::DisplaySurface;
use crate::tree::{AssocTree, NodeFlags, NodeId};
use crate::value::ValueKind;

// =============================================================================
// Filter state
// =============================================================================

/// Parsed filter and exclusion tokens from the input surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    /// Key-substring filters (whitespace-separated tokens).
    pub filters: Vec<String>,
    /// Kind-exclusion tokens, matched against kind names.
    pub exclusions: Vec<String>,
}

impl FilterState {
    pub fn set_filter_text(&mut self, text: &str) {
        self.filters = text.split_whitespace().map(str::to_string).collect();
    }

    pub fn set_exclusion_text(&mut self, text: &str) {
        self.exclusions = text.split_whitespace().map(str::to_string).collect();
    }

    fn excludes(&self, kind: ValueKind, case_sensitive: bool) -> bool {
        self.exclusions
            .iter()
            .any(|token| fold(token, case_sensitive) == kind.name())
    }

    /// Does the node's key (or, type-aware, its kind) satisfy any filter?
    fn matches(&self, key_text: &str, kind: ValueKind, config: &ViewerConfig) -> bool {
        let key = fold(key_text, config.case_sensitive_filter);
        self.filters.iter().any(|token| {
            let token = fold(token, config.case_sensitive_filter);
            if config.type_aware_filter {
                if let Some(filter_kind) = ValueKind::parse(&token) {
                    return filter_kind == kind;
                }
            }
            key.contains(&token)
        })
    }
}

fn fold(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

// =============================================================================
// Pass
// =============================================================================

/// Re-evaluate visibility: filter pass over the touched subtrees, then the
/// whole-tree emptiness pass. Visibility flips are pushed to the surface.
pub fn visibility_pass<S: DisplaySurface>(
    tree: &mut AssocTree,
    surface: &mut S,
    config: &ViewerConfig,
    filters: &FilterState,
    touched: &FxHashSet<NodeId>,
) {
    let mut changed: FxHashSet<NodeId> = FxHashSet::default();

    for root in subtree_roots(tree, touched) {
        // Pin context inherited from ancestors outside the touched subtree
        let inherited = tree
            .get(root)
            .and_then(|n| n.parent)
            .is_some_and(|p| tree.under_pin(p));
        eval_visible(tree, config, filters, root, inherited, &mut changed);
    }

    hide_empty(tree, config, filters, tree.root(), &mut changed);

    let mut changed: Vec<NodeId> = changed.into_iter().collect();
    changed.sort_unstable();
    for id in changed {
        push_refresh(tree, surface, config, id);
    }
}

/// Whole-tree variant, used when filter or exclusion text changes.
pub fn visibility_pass_all<S: DisplaySurface>(
    tree: &mut AssocTree,
    surface: &mut S,
    config: &ViewerConfig,
    filters: &FilterState,
) {
    let mut roots = FxHashSet::default();
    roots.insert(tree.root());
    visibility_pass(tree, surface, config, filters, &roots);
}

/// Touched nodes with no touched ancestor: the minimal subtree cover.
fn subtree_roots(tree: &AssocTree, touched: &FxHashSet<NodeId>) -> Vec<NodeId> {
    let mut roots: Vec<NodeId> = touched
        .iter()
        .copied()
        .filter(|&id| {
            tree.get(id).is_some()
                && !tree.ancestors(id).iter().any(|a| touched.contains(a))
        })
        .collect();
    roots.sort_unstable();
    roots
}

// =============================================================================
// Filter pass
// =============================================================================

fn eval_visible(
    tree: &mut AssocTree,
    config: &ViewerConfig,
    filters: &FilterState,
    id: NodeId,
    pinned: bool,
    changed: &mut FxHashSet<NodeId>,
) {
    if id == tree.root() {
        // The root is a bookkeeping node; only its children are displayed
        for child in tree.child_ids(id) {
            eval_visible(tree, config, filters, child, false, changed);
        }
        return;
    }
    let Some(node) = tree.get(id) else { return };

    let is_container = node.is_container();
    let kind = node.kind();
    let key_text = format_key(&node.key);
    let excluded = filters.excludes(kind, config.case_sensitive_filter);
    let matches = !filters.filters.is_empty() && filters.matches(&key_text, kind, config);

    let (visible, pin_below) = if is_container {
        // Containers start visible; a matching key pins the subtree
        (!excluded, pinned || matches)
    } else {
        let passes = pinned || filters.filters.is_empty() || matches;
        (passes && !excluded, false)
    };

    set_visible(tree, id, visible, changed);
    if let Some(node) = tree.get_mut(id) {
        node.flags.set(NodeFlags::PINNED, is_container && matches);
    }

    if is_container {
        for child in tree.child_ids(id) {
            eval_visible(tree, config, filters, child, pin_below, changed);
        }
    }
}

// =============================================================================
// Emptiness pass
// =============================================================================

/// Bottom-up: returns whether any scalar descendant (or the node itself,
/// for scalars) is visible. Containers without one are hidden; containers
/// that regain one become visible again unless excluded.
fn hide_empty(
    tree: &mut AssocTree,
    config: &ViewerConfig,
    filters: &FilterState,
    id: NodeId,
    changed: &mut FxHashSet<NodeId>,
) -> bool {
    let Some(node) = tree.get(id) else { return false };
    if !node.is_container() {
        return node.flags.contains(NodeFlags::VISIBLE);
    }

    let mut any_visible = false;
    for child in tree.child_ids(id) {
        any_visible |= hide_empty(tree, config, filters, child, changed);
    }

    if id != tree.root() {
        let excluded =
            filters.excludes(ValueKind::Container, config.case_sensitive_filter);
        set_visible(tree, id, any_visible && !excluded, changed);
    }
    any_visible
}

fn set_visible(
    tree: &mut AssocTree,
    id: NodeId,
    visible: bool,
    changed: &mut FxHashSet<NodeId>,
) {
    if let Some(node) = tree.get_mut(id) {
        if node.flags.contains(NodeFlags::VISIBLE) != visible {
            node.flags.set(NodeFlags::VISIBLE, visible);
            changed.insert(id);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
