// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Arena node types",
//! no bidirectional `Rc`/`RefCell` owning links).

use super::mbr::Mbr;

/// A leaf-level entry: one indexed window's feature MBR and its payload.
#[derive(Clone, Debug)]
pub struct LeafEntry<P> {
    /// The entry's bounding rectangle.
    pub mbr: Mbr,
    /// Caller-supplied payload (typically an encoded `Identifier`).
    pub payload: P,
}

/// An internal-node entry: a child's tight bounding rectangle and its
/// arena index.
#[derive(Clone, Debug)]
pub struct ChildEntry {
    /// The child subtree's bounding rectangle.
    pub mbr: Mbr,
    /// Arena index of the child node.
    pub child: u32,
}

/// One arena slot. `parent` is `None` only for the current root.
#[derive(Clone, Debug)]
pub enum Node<P> {
    /// Holds indexed entries directly.
    Leaf {
        /// This leaf's entries.
        entries: Vec<LeafEntry<P>>,
        /// Arena index of the parent internal node, if any.
        parent: Option<u32>,
    },
    /// Holds references to child nodes.
    Internal {
        /// This node's children.
        children: Vec<ChildEntry>,
        /// Arena index of the parent internal node, if any.
        parent: Option<u32>,
        /// Distance from the leaf level; leaves are depth `0`.
        depth: u32,
    },
}

impl<P> Node<P> {
    /// The arena index of this node's parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<u32> {
        match self {
            Self::Leaf { parent, .. } | Self::Internal { parent, .. } => *parent,
        }
    }

    /// Sets this node's parent pointer.
    pub fn set_parent(&mut self, new_parent: Option<u32>) {
        match self {
            Self::Leaf { parent, .. } | Self::Internal { parent, .. } => *parent = new_parent,
        }
    }

    /// `true` for a leaf node.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Number of entries/children held directly by this node.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Leaf { entries, .. } => entries.len(),
            Self::Internal { children, .. } => children.len(),
        }
    }

    /// `true` if this node holds no entries/children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
