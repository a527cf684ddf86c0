//! Subtree and ancestor walkers
//!
//! Callbacks receive the tree mutably together with a [`NodeSlot`] holding
//! the visited node. A callback that deletes or detaches the node clears the
//! slot, and the walker then skips that node's children. Returning `Err`
//! aborts the walk and the same error reaches the caller unchanged.

use tracing::debug;

use crate::dom::{NodeId, NodeKind, XmlTree};
use crate::error::TreeError;

/// The node a walker callback is currently looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSlot {
    node: Option<NodeId>,
}

impl NodeSlot {
    pub fn new(node: NodeId) -> Self {
        NodeSlot { node: Some(node) }
    }

    /// Node held by the slot, `None` once cleared
    pub fn get(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_cleared(&self) -> bool {
        self.node.is_none()
    }

    /// Signal that the node was deleted or detached by the callback
    pub fn clear(&mut self) {
        self.node = None;
    }

    /// Clear the slot, returning the node it held
    pub fn take(&mut self) -> Option<NodeId> {
        self.node.take()
    }

    /// Destroy the held node with its subtree and clear the slot
    ///
    /// Returns the number of nodes removed.
    pub fn remove(&mut self, tree: &mut XmlTree) -> Result<usize, TreeError> {
        match self.node.take() {
            Some(id) => tree.remove(id),
            None => Ok(0),
        }
    }

    /// Detach the held node from its parent and clear the slot
    ///
    /// The detached node is returned so the caller can re-home it.
    pub fn detach(&mut self, tree: &mut XmlTree) -> Result<Option<NodeId>, TreeError> {
        match self.node.take() {
            Some(id) => tree.detach(id).map(|()| Some(id)),
            None => Ok(None),
        }
    }
}

/// Visit `root`, its following siblings and, recursively, their children
///
/// Only nodes of kind `filter` are visited (all nodes when `None`); a node
/// that does not match is not descended into either. Each node's next
/// sibling is read before the callback runs, so the callback may delete the
/// node it was given. If the callback removes that sibling instead, the walk
/// carries on from the current node's new next sibling; when the current
/// node is gone too, the rest of the level is skipped.
pub fn for_each_node_type<E, F>(
    tree: &mut XmlTree,
    root: Option<NodeId>,
    filter: Option<NodeKind>,
    mut callback: F,
) -> Result<(), E>
where
    F: FnMut(&mut XmlTree, &mut NodeSlot) -> Result<(), E>,
{
    walk_level(tree, root, filter, &mut callback)
}

fn walk_level<E, F>(
    tree: &mut XmlTree,
    first: Option<NodeId>,
    filter: Option<NodeKind>,
    callback: &mut F,
) -> Result<(), E>
where
    F: FnMut(&mut XmlTree, &mut NodeSlot) -> Result<(), E>,
{
    let mut current = first.filter(|&id| tree.is_alive(id));
    while let Some(id) = current {
        let next = tree.next_sibling(id);
        let mut survivor = Some(id);

        if filter.is_none_or(|kind| tree.kind(id) == Some(kind)) {
            let mut slot = NodeSlot::new(id);
            callback(tree, &mut slot)?;
            survivor = slot.get().filter(|&n| tree.is_alive(n));
            if let Some(node) = survivor {
                let first_child = tree.first_child(node);
                walk_level(tree, first_child, filter, callback)?;
            }
        }

        current = match next {
            Some(removed) if !tree.is_alive(removed) => {
                let resumed = survivor
                    .filter(|&n| tree.is_alive(n))
                    .and_then(|n| tree.next_sibling(n));
                debug!(node = removed, ?resumed, "next sibling was removed during the walk");
                resumed
            }
            other => other,
        };
    }
    Ok(())
}

/// [`for_each_node_type`] restricted to elements
pub fn for_each_element<E, F>(tree: &mut XmlTree, root: Option<NodeId>, callback: F) -> Result<(), E>
where
    F: FnMut(&mut XmlTree, &mut NodeSlot) -> Result<(), E>,
{
    for_each_node_type(tree, root, Some(NodeKind::Element), callback)
}

/// [`for_each_node_type`] restricted to comments
///
/// Comments have no children and elements are filtered out, so this only
/// sees comments on the starting level.
pub fn for_each_comment<E, F>(tree: &mut XmlTree, root: Option<NodeId>, callback: F) -> Result<(), E>
where
    F: FnMut(&mut XmlTree, &mut NodeSlot) -> Result<(), E>,
{
    for_each_node_type(tree, root, Some(NodeKind::Comment), callback)
}

/// Visit `node`, then its parent, and so on up to the top of its tree
///
/// The parent is read after the callback returns; clearing the slot ends
/// the walk.
pub fn walk_ancestors_and_self<E, F>(
    tree: &mut XmlTree,
    node: Option<NodeId>,
    mut callback: F,
) -> Result<(), E>
where
    F: FnMut(&mut XmlTree, &mut NodeSlot) -> Result<(), E>,
{
    let mut current = node;
    while let Some(id) = current {
        if !tree.is_alive(id) {
            debug!(node = id, "ancestor walk reached a removed node");
            break;
        }
        let mut slot = NodeSlot::new(id);
        callback(tree, &mut slot)?;
        current = slot.get().and_then(|n| tree.parent(n));
    }
    Ok(())
}
