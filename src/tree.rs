//! Association tree - the persistent mirror of the data tree.
//!
//! Every data key, at every depth, is bound to one [`AssocNode`] holding its
//! display handle. Nodes live in an arena with a free-index pool; a
//! [`NodeId`] stays valid (and keeps the same handle) for as long as the key
//! exists at that path, which is what makes updates incremental rather than
//! rebuilds.
//!
//! Ownership is strictly top-down: a node owns its handle and its child map.
//! The parent id is a weak back-reference, used only for upward walks after
//! a leaf changes; it never drives destruction.

use std::collections::BTreeMap;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::surface::HandleId;
use crate::value::{Key, Value, ValueKind};

// =============================================================================
// Node
// =============================================================================

bitflags! {
    /// Per-node display state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Shown by the visibility passes.
        const VISIBLE = 1 << 0;
        /// Container whose own key matched a filter; subtree forced visible.
        const PINNED = 1 << 1;
        /// Expansion state handed to the surface at creation.
        const EXPANDED = 1 << 2;
    }
}

/// Arena index of an association node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// One persistent association between a data key and a display handle.
///
/// Uniform shape at every level: either `scalar` is set (leaf) or `children`
/// is set (container), never both. The root is an ordinary container node
/// with no key text of interest, no parent, and no handle.
#[derive(Debug)]
pub struct AssocNode {
    pub key: Key,
    /// Current value for leaves.
    pub scalar: Option<Value>,
    /// Child associations for containers; the child map doubles as the
    /// container's value.
    pub children: Option<BTreeMap<Key, NodeId>>,
    /// Weak back-reference for ancestor lookups only.
    pub parent: Option<NodeId>,
    /// Distance from the tree root; top-level associations are depth 0.
    pub depth: u16,
    /// Owned display handle; `None` only for the root.
    pub handle: Option<HandleId>,
    /// Layout priority last written by the ordering pass.
    pub order: i64,
    pub flags: NodeFlags,
}

impl AssocNode {
    /// True for container nodes.
    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    /// Kind of the mirrored value.
    pub fn kind(&self) -> ValueKind {
        match (&self.children, &self.scalar) {
            (Some(_), _) => ValueKind::Container,
            (None, Some(v)) => v.kind(),
            (None, None) => ValueKind::Other,
        }
    }

    /// Child count for containers, 0 for leaves.
    pub fn child_count(&self) -> usize {
        self.children.as_ref().map_or(0, BTreeMap::len)
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Arena of association nodes with free-index reuse.
#[derive(Debug)]
pub struct AssocTree {
    nodes: Vec<Option<AssocNode>>,
    free: Vec<usize>,
    root: NodeId,
}

impl AssocTree {
    /// A tree holding only the distinguished root node.
    pub fn new() -> Self {
        let root = AssocNode {
            key: Key::text(""),
            scalar: None,
            children: Some(BTreeMap::new()),
            parent: None,
            depth: 0,
            handle: None,
            order: 0,
            flags: NodeFlags::VISIBLE,
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&AssocNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut AssocNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn alloc(&mut self, node: AssocNode) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(node);
                NodeId(index)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Look up the child of `parent` for `key`.
    pub fn child(&self, parent: NodeId, key: &Key) -> Option<NodeId> {
        self.get(parent)?.children.as_ref()?.get(key).copied()
    }

    /// Child ids of a container, in key order.
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .and_then(|n| n.children.as_ref())
            .map(|c| c.values().copied().collect())
            .unwrap_or_default()
    }

    /// Create a child under `parent` and link it into the child map.
    pub fn insert_child(&mut self, parent: NodeId, node: AssocNode) -> NodeId {
        let key = node.key.clone();
        let id = self.alloc(node);
        if let Some(children) = self.get_mut(parent).and_then(|n| n.children.as_mut()) {
            children.insert(key, id);
        }
        id
    }

    /// Unlink a child from its parent's map without freeing it.
    pub fn detach(&mut self, parent: NodeId, key: &Key) -> Option<NodeId> {
        self.get_mut(parent)?.children.as_mut()?.remove(key)
    }

    /// Free a detached subtree, returning the released display handles in
    /// children-first order. Slots go back to the free pool for reuse.
    pub fn release_subtree(&mut self, id: NodeId) -> Vec<HandleId> {
        // Collect bottom-up: children before their parent
        let mut order: Vec<NodeId> = Vec::new();
        let mut stack: Vec<NodeId> = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.child_ids(current));
        }
        order.reverse();

        let mut handles = Vec::new();
        for node_id in order {
            if let Some(node) = self.nodes.get_mut(node_id.0).and_then(Option::take) {
                if let Some(handle) = node.handle {
                    handles.push(handle);
                }
                self.free.push(node_id.0);
            }
        }
        handles
    }

    /// Ancestor chain from the parent of `id` up to (and including) the root.
    pub fn ancestors(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
        let mut chain = SmallVec::new();
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(ancestor) = current {
            chain.push(ancestor);
            current = self.get(ancestor).and_then(|n| n.parent);
        }
        chain
    }

    /// True when any ancestor (or the node itself) carries [`NodeFlags::PINNED`].
    pub fn under_pin(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.get(node_id) else { break };
            if node.flags.contains(NodeFlags::PINNED) {
                return true;
            }
            current = node.parent;
        }
        false
    }
}

impl Default for AssocTree {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(key: &str, parent: NodeId, depth: u16) -> AssocNode {
        AssocNode {
            key: Key::from(key),
            scalar: Some(Value::from(0i64)),
            children: None,
            parent: Some(parent),
            depth,
            handle: Some(HandleId(depth as u64 * 100)),
            order: 0,
            flags: NodeFlags::VISIBLE,
        }
    }

    fn container(key: &str, parent: NodeId, depth: u16) -> AssocNode {
        AssocNode {
            key: Key::from(key),
            scalar: None,
            children: Some(BTreeMap::new()),
            parent: Some(parent),
            depth,
            handle: Some(HandleId(depth as u64 * 100 + 1)),
            order: 0,
            flags: NodeFlags::VISIBLE,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut tree = AssocTree::new();
        let root = tree.root();
        let a = tree.insert_child(root, leaf("a", root, 0));

        assert_eq!(tree.child(root, &Key::from("a")), Some(a));
        assert_eq!(tree.child(root, &Key::from("b")), None);
        assert_eq!(tree.get(a).unwrap().depth, 0);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_release_subtree_returns_handles_bottom_up() {
        let mut tree = AssocTree::new();
        let root = tree.root();
        let a = tree.insert_child(root, container("a", root, 0));
        let b = tree.insert_child(a, leaf("b", a, 1));

        let a_handle = tree.get(a).unwrap().handle.unwrap();
        let b_handle = tree.get(b).unwrap().handle.unwrap();

        tree.detach(root, &Key::from("a"));
        let handles = tree.release_subtree(a);

        // Children first, then the parent
        assert_eq!(handles, vec![b_handle, a_handle]);
        assert!(tree.get(a).is_none());
        assert!(tree.get(b).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut tree = AssocTree::new();
        let root = tree.root();
        let a = tree.insert_child(root, leaf("a", root, 0));

        tree.detach(root, &Key::from("a"));
        tree.release_subtree(a);

        let b = tree.insert_child(root, leaf("b", root, 0));
        // Same slot, new identity
        assert_eq!(b, a);
        assert_eq!(tree.get(b).unwrap().key, Key::from("b"));
    }

    #[test]
    fn test_ancestors() {
        let mut tree = AssocTree::new();
        let root = tree.root();
        let a = tree.insert_child(root, container("a", root, 0));
        let b = tree.insert_child(a, container("b", a, 1));
        let c = tree.insert_child(b, leaf("c", b, 2));

        let chain = tree.ancestors(c);
        assert_eq!(chain.as_slice(), &[b, a, root]);
    }

    #[test]
    fn test_under_pin() {
        let mut tree = AssocTree::new();
        let root = tree.root();
        let a = tree.insert_child(root, container("a", root, 0));
        let b = tree.insert_child(a, leaf("b", a, 1));

        assert!(!tree.under_pin(b));
        tree.get_mut(a).unwrap().flags.insert(NodeFlags::PINNED);
        assert!(tree.under_pin(b));
    }
}
