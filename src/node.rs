// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The arena the command tree's nodes live in.
//!
//! Nodes are addressed by [`NodeId`], a stable integer index, rather than
//! by owning pointers in both directions. This keeps the tree `Send +
//! Sync` without reference counting or interior mutability per node, and
//! makes [`Arena::delete_recursively`] a matter of tombstoning slots
//! rather than tearing down a pointer graph.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::component::AnyComponent;
use crate::permission::PermissionExpr;

/// A stable index into a [`CommandTree`](crate::tree::CommandTree)'s node
/// arena.
///
/// `NodeId`s are never reused within an arena's lifetime: the arena only
/// grows, and a tombstoned slot is skipped rather than recycled. A stale
/// `NodeId` captured before a deletion therefore reliably fails
/// [`Arena::get`] instead of silently aliasing whatever node was later
/// inserted at the same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    fn index(self) -> usize {
        self.0
    }
}

enum Slot<S> {
    Occupied(NodeData<S>),
    Tombstoned,
}

/// One node in the command tree.
///
/// `component` is `None` exactly for the synthetic root. `node_meta` is a
/// string-keyed, type-erased map; the one key every traversal actually
/// reads is the cached resolved permission, exposed via the dedicated
/// [`NodeData::permission`]/[`NodeData::set_permission`] accessors rather
/// than forcing every caller to know the literal key string and downcast.
pub struct NodeData<S> {
    component: Option<Arc<dyn AnyComponent<S>>>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    meta: HashMap<String, Box<dyn Any + Send + Sync>>,
}

const PERMISSION_META_KEY: &str = "permission";

impl<S> NodeData<S> {
    fn root() -> Self {
        NodeData {
            component: None,
            children: Vec::new(),
            parent: None,
            meta: HashMap::new(),
        }
    }

    fn child(component: Arc<dyn AnyComponent<S>>, parent: NodeId) -> Self {
        NodeData {
            component: Some(component),
            children: Vec::new(),
            parent: Some(parent),
            meta: HashMap::new(),
        }
    }

    /// This node's component, or `None` for the synthetic root.
    pub fn component(&self) -> Option<&Arc<dyn AnyComponent<S>>> {
        self.component.as_ref()
    }

    /// This node's children, in the tree's sorted order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// This node's parent, or `None` for the synthetic root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// True if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The permission cached for this node during `verify_and_register`,
    /// if any has been computed yet.
    pub fn permission(&self) -> Option<&PermissionExpr> {
        self.meta
            .get(PERMISSION_META_KEY)
            .and_then(|value| value.downcast_ref::<PermissionExpr>())
    }

    /// Cache `permission` for this node.
    pub fn set_permission(&mut self, permission: PermissionExpr) {
        self.meta
            .insert(PERMISSION_META_KEY.to_string(), Box::new(permission));
    }

    /// Store an arbitrary, type-erased metadata value under `key`.
    pub fn set_meta<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.meta.insert(key.into(), Box::new(value));
    }

    /// Retrieve a previously stored metadata value.
    pub fn meta<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.meta.get(key).and_then(|value| value.downcast_ref())
    }
}

/// The arena backing a [`CommandTree`](crate::tree::CommandTree).
pub struct Arena<S> {
    slots: Vec<Slot<S>>,
    root: NodeId,
}

impl<S> Arena<S> {
    /// A fresh arena containing only the synthetic root.
    pub fn new() -> Self {
        let mut slots = Vec::new();
        slots.push(Slot::Occupied(NodeData::root()));
        Arena {
            slots,
            root: NodeId(0),
        }
    }

    /// The synthetic root's id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node by id. Returns `None` for a stale or tombstoned id.
    pub fn get(&self, id: NodeId) -> Option<&NodeData<S>> {
        match self.slots.get(id.index())? {
            Slot::Occupied(data) => Some(data),
            Slot::Tombstoned => None,
        }
    }

    /// Mutably look up a node by id. Returns `None` for a stale or
    /// tombstoned id.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData<S>> {
        match self.slots.get_mut(id.index())? {
            Slot::Occupied(data) => Some(data),
            Slot::Tombstoned => None,
        }
    }

    /// Append a new child of `parent` wrapping `component`, returning its
    /// id. Does not sort `parent`'s children; callers re-sort after all of
    /// a single insertion's children have been added.
    pub fn add_child(&mut self, parent: NodeId, component: Arc<dyn AnyComponent<S>>) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot::Occupied(NodeData::child(component, parent)));
        if let Some(parent_data) = self.get_mut(parent) {
            parent_data.children.push(id);
        }
        id
    }

    /// Sort `node`'s children per the tree's total order: literals first,
    /// lexicographically by name, then the (at most one) non-literal.
    pub fn sort_children(&mut self, node: NodeId) {
        if self.get(node).is_none() {
            return;
        }

        // Collect sort keys first since we can't borrow `self` immutably
        // (to read each child's component) and mutably (to reorder
        // `node`'s children) at the same time.
        let mut keyed: Vec<(NodeId, bool, String)> = Vec::new();
        if let Some(data) = self.get(node) {
            for &child_id in &data.children {
                if let Some(child) = self.get(child_id) {
                    let is_literal = child
                        .component()
                        .map(|c| c.kind().is_literal())
                        .unwrap_or(false);
                    let name = child.component().map(|c| c.name().to_string()).unwrap_or_default();
                    keyed.push((child_id, is_literal, name));
                }
            }
        }
        keyed.sort_by(|a, b| match (a.1, b.1) {
            (true, true) => a.2.cmp(&b.2),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => std::cmp::Ordering::Equal,
        });

        if let Some(data) = self.get_mut(node) {
            data.children = keyed.into_iter().map(|(id, _, _)| id).collect();
        }
    }

    /// Find an existing child of `parent` equivalent to `component`
    /// (matched by name; value-type equality is checked by the caller,
    /// which has the typed context insertion needs).
    pub fn find_child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let data = self.get(parent)?;
        data.children.iter().copied().find(|&id| {
            self.get(id)
                .and_then(|node| node.component())
                .map(|c| c.name() == name)
                .unwrap_or(false)
        })
    }

    /// Tombstone `node` and everything below it. Tombstoned slots are
    /// skipped by `get`/`get_mut` and never reused.
    pub fn delete_recursively(&mut self, node: NodeId) {
        let children = self.get(node).map(|data| data.children.clone()).unwrap_or_default();
        for child in children {
            self.delete_recursively(child);
        }
        if let Some(parent) = self.get(node).and_then(|data| data.parent) {
            if let Some(parent_data) = self.get_mut(parent) {
                parent_data.children.retain(|&id| id != node);
            }
        }
        if let Some(slot) = self.slots.get_mut(node.index()) {
            *slot = Slot::Tombstoned;
        }
    }

    /// All node ids reachable from the root, including the root itself,
    /// in an unspecified order. Used by `verify_and_register`'s traversal.
    pub fn all_ids(&self) -> Vec<NodeId> {
        (0..self.slots.len())
            .map(NodeId)
            .filter(|id| self.get(*id).is_some())
            .collect()
    }
}

impl<S> Default for Arena<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    fn literal(name: &str) -> Arc<dyn AnyComponent<()>> {
        Arc::new(Component::<(), ()>::literal(name))
    }

    #[test]
    fn fresh_arena_has_only_the_root() {
        let arena: Arena<()> = Arena::new();
        assert!(arena.get(arena.root()).is_some());
        assert!(arena.get(arena.root()).unwrap().is_leaf());
    }

    #[test]
    fn add_child_links_parent_and_child() {
        let mut arena: Arena<()> = Arena::new();
        let root = arena.root();
        let child = arena.add_child(root, literal("foo"));
        assert_eq!(arena.get(child).unwrap().parent(), Some(root));
        assert_eq!(arena.get(root).unwrap().children(), &[child]);
    }

    #[test]
    fn sort_children_puts_literals_first_lexicographically() {
        let mut arena: Arena<()> = Arena::new();
        let root = arena.root();
        let b = arena.add_child(root, literal("b"));
        let a = arena.add_child(root, literal("a"));
        arena.sort_children(root);
        assert_eq!(arena.get(root).unwrap().children(), &[a, b]);
    }

    #[test]
    fn delete_recursively_tombstones_node_and_children() {
        let mut arena: Arena<()> = Arena::new();
        let root = arena.root();
        let parent = arena.add_child(root, literal("a"));
        let child = arena.add_child(parent, literal("b"));
        arena.delete_recursively(parent);
        assert!(arena.get(parent).is_none());
        assert!(arena.get(child).is_none());
        assert!(arena.get(root).unwrap().children().is_empty());
    }

    #[test]
    fn stale_node_id_never_aliases_a_later_insertion() {
        let mut arena: Arena<()> = Arena::new();
        let root = arena.root();
        let stale = arena.add_child(root, literal("a"));
        arena.delete_recursively(stale);
        let _fresh = arena.add_child(root, literal("b"));
        assert!(arena.get(stale).is_none());
    }
}
