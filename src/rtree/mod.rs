// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An in-memory R-tree indexing feature-space MBRs.
//!
//! Nodes live in a flat arena (`Vec<Node<P>>`) addressed by `u32` index;
//! there is no `Rc`/`RefCell` ownership graph, and parent links are just
//! another index. Construction is bottom-up by
//! repeated single-entry insertion with Guttman-style splits, matching
//! `index_max_entries`/`index_min_entries`/`seed_picker`.

pub mod codec;
mod mbr;
mod node;
mod split;

pub use mbr::Mbr;
pub use split::SeedPicker;

use node::{ChildEntry, LeafEntry, Node};

/// An in-memory R-tree over `feature_dim`-dimensional MBRs, generic over
/// the leaf payload type `P`.
#[derive(Clone, Debug)]
pub struct RTree<P> {
    nodes: Vec<Node<P>>,
    root: u32,
    dim: usize,
    max_entries: usize,
    min_entries: usize,
    seed_picker: SeedPicker,
}

impl<P: Clone> RTree<P> {
    /// Creates an empty tree. `min_entries` must be at most `max_entries /
    /// 2`; callers normalize this at configuration time.
    #[must_use]
    pub fn new(dim: usize, max_entries: usize, min_entries: usize, seed_picker: SeedPicker) -> Self {
        Self {
            nodes: Vec::new(),
            root: 0,
            dim,
            max_entries: max_entries.max(2),
            min_entries: min_entries.max(1).min(max_entries.max(2) / 2),
            seed_picker,
        }
    }

    /// Number of dimensions this tree indexes.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// `true` if the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of leaf entries across the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        self.count_from(self.root)
    }

    fn count_from(&self, idx: u32) -> usize {
        #[allow(clippy::indexing_slicing)]
        match &self.nodes[idx as usize] {
            Node::Leaf { entries, .. } => entries.len(),
            Node::Internal { children, .. } => children.iter().map(|c| self.count_from(c.child)).sum(),
        }
    }

    /// Inserts a single point (a zero-volume MBR) with its payload.
    pub fn insert_point(&mut self, point: &[f32], payload: P) {
        self.insert_rect(point, point, payload);
    }

    /// Inserts a rectangle (`min`, `max`, both length `dim`) with its
    /// payload, maintaining I2 (every internal node's bound is the tight
    /// union of its children) and I3 (no node holds more than
    /// `max_entries`).
    pub fn insert_rect(&mut self, min: &[f32], max: &[f32], payload: P) {
        debug_assert_eq!(min.len(), self.dim);
        debug_assert_eq!(max.len(), self.dim);
        let mbr = Mbr::new(min, max);

        if self.nodes.is_empty() {
            self.nodes.push(Node::Leaf {
                entries: vec![LeafEntry { mbr, payload }],
                parent: None,
            });
            self.root = 0;
            return;
        }

        if let Some(new_idx) = self.insert_into(self.root, mbr, payload) {
            let root_mbr = self.node_mbr(self.root);
            let new_mbr = self.node_mbr(new_idx);
            let depth = self.node_depth(self.root) + 1;
            let new_root = self.nodes.len() as u32;
            self.nodes.push(Node::Internal {
                children: vec![
                    ChildEntry {
                        mbr: root_mbr,
                        child: self.root,
                    },
                    ChildEntry { mbr: new_mbr, child: new_idx },
                ],
                parent: None,
                depth,
            });
            self.set_parent(self.root, new_root);
            self.set_parent(new_idx, new_root);
            self.root = new_root;
        }
    }

    fn insert_into(&mut self, node_idx: u32, mbr: Mbr, payload: P) -> Option<u32> {
        #[allow(clippy::indexing_slicing)]
        let is_leaf = self.nodes[node_idx as usize].is_leaf();

        if is_leaf {
            #[allow(clippy::indexing_slicing)]
            let overflow = if let Node::Leaf { entries, .. } = &mut self.nodes[node_idx as usize] {
                entries.push(LeafEntry { mbr, payload });
                entries.len() > self.max_entries
            } else {
                false
            };
            return if overflow { Some(self.split_leaf(node_idx)) } else { None };
        }

        #[allow(clippy::indexing_slicing)]
        let chosen_pos = if let Node::Internal { children, .. } = &self.nodes[node_idx as usize] {
            choose_subtree(children, &mbr)
        } else {
            0
        };
        #[allow(clippy::indexing_slicing)]
        let child_id = if let Node::Internal { children, .. } = &self.nodes[node_idx as usize] {
            children.get(chosen_pos).map_or(0, |c| c.child)
        } else {
            0
        };

        let split = self.insert_into(child_id, mbr.clone(), payload);

        #[allow(clippy::indexing_slicing)]
        if let Node::Internal { children, .. } = &mut self.nodes[node_idx as usize] {
            if let Some(c) = children.get_mut(chosen_pos) {
                c.mbr = c.mbr.combine(&mbr);
            }
        }

        let Some(new_child_id) = split else {
            return None;
        };

        let new_child_mbr = self.node_mbr(new_child_id);
        self.set_parent(new_child_id, node_idx);

        #[allow(clippy::indexing_slicing)]
        let overflow = if let Node::Internal { children, .. } = &mut self.nodes[node_idx as usize] {
            children.push(ChildEntry {
                mbr: new_child_mbr,
                child: new_child_id,
            });
            children.len() > self.max_entries
        } else {
            false
        };

        if overflow {
            Some(self.split_internal(node_idx))
        } else {
            None
        }
    }

    fn split_leaf(&mut self, node_idx: u32) -> u32 {
        let parent = self.parent_of(node_idx);
        #[allow(clippy::indexing_slicing)]
        let entries = if let Node::Leaf { entries, .. } = &mut self.nodes[node_idx as usize] {
            std::mem::take(entries)
        } else {
            Vec::new()
        };

        let (group_a, group_b) = split::split_entries(entries, |e: &LeafEntry<P>| &e.mbr, self.seed_picker, self.min_entries);

        #[allow(clippy::indexing_slicing)]
        if let Node::Leaf { entries, .. } = &mut self.nodes[node_idx as usize] {
            *entries = group_a;
        }

        let new_idx = self.nodes.len() as u32;
        self.nodes.push(Node::Leaf {
            entries: group_b,
            parent,
        });
        new_idx
    }

    fn split_internal(&mut self, node_idx: u32) -> u32 {
        let parent = self.parent_of(node_idx);
        let depth = self.depth_of(node_idx);
        #[allow(clippy::indexing_slicing)]
        let children = if let Node::Internal { children, .. } = &mut self.nodes[node_idx as usize] {
            std::mem::take(children)
        } else {
            Vec::new()
        };

        let (group_a, group_b) = split::split_entries(children, |c: &ChildEntry| &c.mbr, self.seed_picker, self.min_entries);

        #[allow(clippy::indexing_slicing)]
        if let Node::Internal { children, .. } = &mut self.nodes[node_idx as usize] {
            *children = group_a;
        }

        let new_idx = self.nodes.len() as u32;
        let moved = group_b.clone();
        self.nodes.push(Node::Internal {
            children: group_b,
            parent,
            depth,
        });
        for c in moved {
            self.set_parent(c.child, new_idx);
        }
        new_idx
    }

    fn node_mbr(&self, idx: u32) -> Mbr {
        #[allow(clippy::indexing_slicing)]
        match &self.nodes[idx as usize] {
            Node::Leaf { entries, .. } => {
                #[allow(clippy::expect_used)]
                let first = entries.first().expect("leaf node has at least one entry").mbr.clone();
                entries.iter().skip(1).fold(first, |acc, e| acc.combine(&e.mbr))
            }
            Node::Internal { children, .. } => {
                #[allow(clippy::expect_used)]
                let first = children.first().expect("internal node has at least one child").mbr.clone();
                children.iter().skip(1).fold(first, |acc, c| acc.combine(&c.mbr))
            }
        }
    }

    fn node_depth(&self, idx: u32) -> u32 {
        #[allow(clippy::indexing_slicing)]
        match &self.nodes[idx as usize] {
            Node::Leaf { .. } => 0,
            Node::Internal { depth, .. } => *depth,
        }
    }

    fn depth_of(&self, idx: u32) -> u32 {
        self.node_depth(idx)
    }

    fn parent_of(&self, idx: u32) -> Option<u32> {
        #[allow(clippy::indexing_slicing)]
        self.nodes[idx as usize].parent()
    }

    fn set_parent(&mut self, idx: u32, parent: u32) {
        #[allow(clippy::indexing_slicing)]
        self.nodes[idx as usize].set_parent(Some(parent));
    }

    /// Depth-first range search with a lower-bounding threshold
    /// (`searchWithThreshold(corner, range, threshold)`). `corner` expanded
    /// by `range` on every side forms the query rectangle; a subtree is
    /// descended only if its MBR's minimum distance to the query rectangle
    /// is within `threshold` (I4: no false dismissals, since MINDIST never
    /// overestimates true distance).
    #[must_use]
    pub fn search_with_threshold(&self, corner: &[f32], range: f32, threshold: f64) -> Vec<P> {
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        let query = Mbr::from_point_range(corner, range);
        self.search_from(self.root, &query, threshold, &mut out);
        out
    }

    fn search_from(&self, idx: u32, query: &Mbr, threshold: f64, out: &mut Vec<P>) {
        #[allow(clippy::indexing_slicing)]
        match &self.nodes[idx as usize] {
            Node::Leaf { entries, .. } => {
                for e in entries {
                    if e.mbr.min_distance_sq_to(query) <= threshold {
                        out.push(e.payload.clone());
                    }
                }
            }
            Node::Internal { children, .. } => {
                for c in children {
                    if c.mbr.min_distance_sq_to(query) <= threshold {
                        self.search_from(c.child, query, threshold, out);
                    }
                }
            }
        }
    }
}

/// Chooses the child minimizing area enlargement to absorb `mbr`; ties
/// broken by smaller resulting area, then by smaller child index
/// ("ChooseSubtree").
fn choose_subtree(children: &[ChildEntry], mbr: &Mbr) -> usize {
    let mut best = 0;
    let mut best_enlargement = f64::INFINITY;
    let mut best_area = f64::INFINITY;

    for (i, c) in children.iter().enumerate() {
        let enlargement = c.mbr.enlargement(mbr);
        let area = c.mbr.area();
        let better = enlargement < best_enlargement
            || (enlargement == best_enlargement && area < best_area);
        if better {
            best = i;
            best_enlargement = enlargement;
            best_area = area;
        }
    }

    best
}
