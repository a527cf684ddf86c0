//! Selective deep copy
//!
//! Copies an element subtree into fresh, standalone nodes of the same arena,
//! leaving out hidden, metadata or comment nodes below the starting node as
//! the [`ExcludeFlags`] ask. Only element children are followed.

use std::ops::{BitOr, BitOrAssign};

use tracing::{error, trace};

use crate::dom::{NodeId, NodeKind, XmlTree};
use crate::markers::{HIDDEN_ATTR, META_ELEMENT, TRUE_VALUE};

/// Which descendants [`copy`] leaves out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExcludeFlags(u8);

impl ExcludeFlags {
    pub const NONE: Self = ExcludeFlags(0);
    /// Elements carrying `hidden="true"`
    pub const HIDDEN: Self = ExcludeFlags(1);
    /// `meta` elements
    pub const META: Self = ExcludeFlags(1 << 1);
    /// Comment nodes
    pub const COMMENTS: Self = ExcludeFlags(1 << 2);
    pub const ALL: Self = ExcludeFlags(0b111);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Unknown bits are dropped
    pub const fn from_bits_truncate(bits: u8) -> Self {
        ExcludeFlags(bits & Self::ALL.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ExcludeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        ExcludeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExcludeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Whether a node carries the hidden marker (`hidden="true"`)
pub fn is_hidden(tree: &XmlTree, node: NodeId) -> bool {
    tree.attribute(node, HIDDEN_ATTR) == Some(TRUE_VALUE)
}

fn is_excluded(tree: &XmlTree, node: NodeId, excludes: ExcludeFlags) -> bool {
    (excludes.contains(ExcludeFlags::HIDDEN) && is_hidden(tree, node))
        || (excludes.contains(ExcludeFlags::META) && tree.name(node) == Some(META_ELEMENT))
        || (excludes.contains(ExcludeFlags::COMMENTS) && tree.kind(node) == Some(NodeKind::Comment))
}

/// Deep copy `source` without the descendants `excludes` names
///
/// The starting node itself is always copied. Returns `None` when `source`
/// is `None` or the starting node cannot be copied.
pub fn copy(tree: &mut XmlTree, source: Option<NodeId>, excludes: ExcludeFlags) -> Option<NodeId> {
    copy_at_depth(tree, source?, excludes, 0)
}

fn copy_at_depth(
    tree: &mut XmlTree,
    source: NodeId,
    excludes: ExcludeFlags,
    depth: usize,
) -> Option<NodeId> {
    if depth > 0 && is_excluded(tree, source, excludes) {
        trace!(node = source, depth, "excluded from copy");
        return None;
    }

    let copy = match tree.shallow_copy(source) {
        Ok(id) => id,
        Err(err) => {
            error!(node = source, %err, "failed to copy node");
            return None;
        }
    };

    let children: Vec<NodeId> = tree
        .children(source)
        .filter(|&child| tree.kind(child) == Some(NodeKind::Element))
        .collect();

    for child in children {
        let Some(child_copy) = copy_at_depth(tree, child, excludes, depth + 1) else {
            continue;
        };
        if let Err(err) = tree.append_child(copy, child_copy) {
            error!(parent = copy, child = child_copy, %err, "failed to add child copy, discarding it");
            if let Err(err) = tree.remove(child_copy) {
                error!(node = child_copy, %err, "failed to discard orphaned child copy");
            }
        }
    }

    Some(copy)
}
