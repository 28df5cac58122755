// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Post-order serialization of an [`RTree`], in this on-disk layout:
//!
//! ```text
//! feature_dim: u32, max_entries: u32, min_entries: u32, seed_picker: u8
//! node_count: u32
//! node* = kind: u8, entry_count: u32,
//!         mbr[entry_count],
//!         (leaf: (len: u32, payload_bytes)[entry_count]
//!          | internal: child_post_order_position: u32 [entry_count])
//! ```
//!
//! Children are always written before their parent, so a child's position
//! in the output stream is already known by the time the parent references
//! it - no forward patching required.

use super::mbr::Mbr;
use super::node::{ChildEntry, LeafEntry, Node};
use super::{RTree, SeedPicker};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

const KIND_LEAF: u8 = 0;
const KIND_INTERNAL: u8 = 1;

fn unpack_err() -> Error {
    Error::ChunkUnpackError(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "truncated rtree chunk",
    ))
}

/// Serializes `tree` to its post-order byte layout. `write_payload`
/// encodes one leaf payload into the output buffer.
pub fn serialize<P>(tree: &RTree<P>, mut write_payload: impl FnMut(&P, &mut Vec<u8>)) -> Vec<u8> {
    let mut out = Vec::new();
    #[allow(clippy::unwrap_used)]
    out.write_u32::<LittleEndian>(tree.dim as u32).unwrap();
    #[allow(clippy::unwrap_used)]
    out.write_u32::<LittleEndian>(tree.max_entries as u32).unwrap();
    #[allow(clippy::unwrap_used)]
    out.write_u32::<LittleEndian>(tree.min_entries as u32).unwrap();
    out.push(match tree.seed_picker {
        SeedPicker::Linear => 0,
        SeedPicker::Quadratic => 1,
    });

    if tree.nodes.is_empty() {
        #[allow(clippy::unwrap_used)]
        out.write_u32::<LittleEndian>(0).unwrap();
        return out;
    }

    let mut order = Vec::with_capacity(tree.nodes.len());
    post_order(tree, tree.root, &mut order);

    let mut positions = vec![0u32; tree.nodes.len()];
    for (pos, &idx) in order.iter().enumerate() {
        if let Some(slot) = positions.get_mut(idx as usize) {
            *slot = pos as u32;
        }
    }

    #[allow(clippy::unwrap_used)]
    out.write_u32::<LittleEndian>(order.len() as u32).unwrap();

    for &idx in &order {
        let Some(node) = tree.nodes.get(idx as usize) else {
            continue;
        };
        match node {
            Node::Leaf { entries, .. } => {
                out.push(KIND_LEAF);
                #[allow(clippy::unwrap_used)]
                out.write_u32::<LittleEndian>(entries.len() as u32).unwrap();
                for e in entries {
                    write_mbr(&e.mbr, &mut out);
                }
                for e in entries {
                    let mut payload_bytes = Vec::new();
                    write_payload(&e.payload, &mut payload_bytes);
                    #[allow(clippy::unwrap_used)]
                    out.write_u32::<LittleEndian>(payload_bytes.len() as u32).unwrap();
                    out.extend_from_slice(&payload_bytes);
                }
            }
            Node::Internal { children, .. } => {
                out.push(KIND_INTERNAL);
                #[allow(clippy::unwrap_used)]
                out.write_u32::<LittleEndian>(children.len() as u32).unwrap();
                for c in children {
                    write_mbr(&c.mbr, &mut out);
                }
                for c in children {
                    let pos = positions.get(c.child as usize).copied().unwrap_or(0);
                    #[allow(clippy::unwrap_used)]
                    out.write_u32::<LittleEndian>(pos).unwrap();
                }
            }
        }
    }

    out
}

fn post_order<P>(tree: &RTree<P>, idx: u32, order: &mut Vec<u32>) {
    if let Some(Node::Internal { children, .. }) = tree.nodes.get(idx as usize) {
        for c in children.clone() {
            post_order(tree, c.child, order);
        }
    }
    order.push(idx);
}

fn write_mbr(mbr: &Mbr, out: &mut Vec<u8>) {
    for &v in &mbr.min {
        #[allow(clippy::unwrap_used)]
        out.write_f32::<LittleEndian>(v).unwrap();
    }
    for &v in &mbr.max {
        #[allow(clippy::unwrap_used)]
        out.write_f32::<LittleEndian>(v).unwrap();
    }
}

fn read_mbr(cursor: &mut &[u8], dim: usize) -> Result<Mbr> {
    let mut min = Vec::with_capacity(dim);
    let mut max = Vec::with_capacity(dim);
    for _ in 0..dim {
        min.push(cursor.read_f32::<LittleEndian>().map_err(|_| unpack_err())?);
    }
    for _ in 0..dim {
        max.push(cursor.read_f32::<LittleEndian>().map_err(|_| unpack_err())?);
    }
    Ok(Mbr { min, max })
}

/// Deserializes a tree previously written by [`serialize`]. `read_payload`
/// decodes one leaf payload from its encoded bytes.
///
/// # Errors
///
/// Returns [`Error::ChunkUnpackError`] if the byte stream is truncated or
/// malformed, or whatever `read_payload` returns for a bad payload.
pub fn deserialize<P>(bytes: &[u8], mut read_payload: impl FnMut(&[u8]) -> Result<P>) -> Result<RTree<P>> {
    let mut cursor: &[u8] = bytes;

    let dim = cursor.read_u32::<LittleEndian>().map_err(|_| unpack_err())? as usize;
    let max_entries = cursor.read_u32::<LittleEndian>().map_err(|_| unpack_err())? as usize;
    let min_entries = cursor.read_u32::<LittleEndian>().map_err(|_| unpack_err())? as usize;

    let mut tag = [0u8; 1];
    cursor.read_exact(&mut tag).map_err(|_| unpack_err())?;
    let seed_picker = if tag[0] == 0 { SeedPicker::Linear } else { SeedPicker::Quadratic };

    let node_count = cursor.read_u32::<LittleEndian>().map_err(|_| unpack_err())? as usize;
    let mut nodes: Vec<Node<P>> = Vec::with_capacity(node_count);

    for _ in 0..node_count {
        let mut kind = [0u8; 1];
        cursor.read_exact(&mut kind).map_err(|_| unpack_err())?;
        let entry_count = cursor.read_u32::<LittleEndian>().map_err(|_| unpack_err())? as usize;

        let mut mbrs = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            mbrs.push(read_mbr(&mut cursor, dim)?);
        }

        if kind[0] == KIND_LEAF {
            let mut entries = Vec::with_capacity(entry_count);
            for mbr in mbrs {
                let len = cursor.read_u32::<LittleEndian>().map_err(|_| unpack_err())? as usize;
                let mut buf = vec![0u8; len];
                cursor.read_exact(&mut buf).map_err(|_| unpack_err())?;
                let payload = read_payload(&buf)?;
                entries.push(LeafEntry { mbr, payload });
            }
            nodes.push(Node::Leaf { entries, parent: None });
        } else {
            let mut children = Vec::with_capacity(entry_count);
            for mbr in mbrs {
                let child_pos = cursor.read_u32::<LittleEndian>().map_err(|_| unpack_err())?;
                children.push(ChildEntry { mbr, child: child_pos });
            }
            nodes.push(Node::Internal {
                children,
                parent: None,
                depth: 0,
            });
        }
    }

    if node_count == 0 {
        return Ok(RTree {
            nodes,
            root: 0,
            dim,
            max_entries,
            min_entries,
            seed_picker,
        });
    }

    let root = (node_count as u32) - 1;
    fix_parents(&mut nodes);
    fix_depths(&mut nodes, root);

    Ok(RTree {
        nodes,
        root,
        dim,
        max_entries,
        min_entries,
        seed_picker,
    })
}

fn fix_parents<P>(nodes: &mut [Node<P>]) {
    for i in 0..nodes.len() {
        let kids: Vec<u32> = if let Node::Internal { children, .. } = &nodes[i] {
            children.iter().map(|c| c.child).collect()
        } else {
            Vec::new()
        };
        for k in kids {
            if let Some(n) = nodes.get_mut(k as usize) {
                n.set_parent(Some(i as u32));
            }
        }
    }
}

fn fix_depths<P>(nodes: &mut [Node<P>], idx: u32) -> u32 {
    let kids: Option<Vec<u32>> = if let Some(Node::Internal { children, .. }) = nodes.get(idx as usize) {
        Some(children.iter().map(|c| c.child).collect())
    } else {
        None
    };

    let Some(kids) = kids else {
        return 0;
    };

    let max_child_depth = kids.iter().map(|&k| fix_depths(nodes, k)).max().unwrap_or(0);
    let d = max_child_depth + 1;
    if let Some(Node::Internal { depth, .. }) = nodes.get_mut(idx as usize) {
        *depth = d;
    }
    d
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rtree::SeedPicker as Picker;

    #[test]
    fn round_trip_preserves_search_results_p2() {
        let mut tree: RTree<u32> = RTree::new(1, 4, 2, Picker::Quadratic);
        for i in 0..30 {
            tree.insert_point(&[f32::from(i)], i as u32);
        }

        let bytes = serialize(&tree, |p, buf| buf.extend_from_slice(&p.to_le_bytes()));

        let restored: RTree<u32> = deserialize(&bytes, |buf| {
            let arr: [u8; 4] = buf.try_into().map_err(|_| unpack_err())?;
            Ok(u32::from_le_bytes(arr))
        })
        .unwrap();

        assert_eq!(restored.len(), tree.len());

        let mut before = tree.search_with_threshold(&[15.0], 0.0, 4.0);
        let mut after = restored.search_with_threshold(&[15.0], 0.0, 4.0);
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }

    #[test]
    fn empty_tree_round_trips() {
        let tree: RTree<u32> = RTree::new(2, 4, 2, Picker::Linear);
        let bytes = serialize(&tree, |_, _| {});
        let restored: RTree<u32> = deserialize(&bytes, |_| Ok(0u32)).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn truncated_bytes_fail_cleanly() {
        let result: Result<RTree<u32>> = deserialize(&[1, 2, 3], |_| Ok(0u32));
        assert!(result.is_err());
    }
}
