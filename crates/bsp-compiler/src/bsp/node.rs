//! Flat node, leaf and portal records.
//!
//! The compiled tree is stored in index-addressed arrays rather than boxed
//! subtrees so that it maps one-to-one onto the exported level file.

use crate::{BoundingBox, Polygon};

/// Encoded child value marking solid space.
pub const SOLID_LEAF: u32 = 0x8000_0000;

/// What lies on one side of a node's plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Child {
    /// Index into the node array.
    Node(usize),
    /// Index into the leaf array.
    Leaf(usize),
    /// Solid (outside) space.
    Solid,
}

impl Child {
    /// Packs the child into the exported 32-bit form.
    ///
    /// Nodes are stored as their index, leaves as `-(index + 1)` in two's
    /// complement, and solid space as [`SOLID_LEAF`].
    pub fn encode(self) -> u32 {
        match self {
            Child::Node(index) => index as u32,
            Child::Leaf(index) => (-(index as i64) - 1) as i32 as u32,
            Child::Solid => SOLID_LEAF,
        }
    }

    /// Unpacks a value produced by [`Child::encode`].
    pub fn decode(value: u32) -> Child {
        if value == SOLID_LEAF {
            return Child::Solid;
        }
        let signed = value as i32;
        if signed >= 0 {
            Child::Node(signed as usize)
        } else {
            Child::Leaf((-(signed as i64) - 1) as usize)
        }
    }

    #[inline]
    pub fn is_solid(self) -> bool {
        self == Child::Solid
    }
}

/// An interior node: a splitting plane and the two half-spaces it separates.
#[derive(Debug, Clone, PartialEq)]
pub struct BspNode {
    /// Index into the tree's plane table.
    pub plane: usize,
    /// Half-space the plane normal points into.
    pub front: Child,
    pub back: Child,
    /// Bounds of every face that reached this node.
    pub bounds: BoundingBox,
}

impl BspNode {
    pub fn new(plane: usize, bounds: BoundingBox) -> Self {
        Self {
            plane,
            front: Child::Solid,
            back: Child::Solid,
            bounds,
        }
    }
}

/// A convex region of empty space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BspLeaf {
    pub bounds: BoundingBox,
    /// Indices into the tree's face array.
    pub faces: Vec<usize>,
    /// Indices into the tree's portal array.
    pub portals: Vec<usize>,
    /// Byte offset of this leaf's row in the visibility data.
    pub pvs_offset: u32,
}

/// A convex window joining two leaves across a node plane.
#[derive(Debug, Clone, PartialEq)]
pub struct BspPortal {
    /// Lies on the owner node's plane, wound to face the front leaf.
    pub polygon: Polygon,
    pub owner_node: usize,
    /// Leaf on the front side of the owner plane, then the back side.
    pub leaf_owner: [usize; 2],
}

impl BspPortal {
    #[inline]
    pub fn front_leaf(&self) -> usize {
        self.leaf_owner[0]
    }

    #[inline]
    pub fn back_leaf(&self) -> usize {
        self.leaf_owner[1]
    }

    /// The leaf on the other side of the portal from `leaf`.
    pub fn neighbour_of(&self, leaf: usize) -> Option<usize> {
        match self.leaf_owner {
            [front, back] if front == leaf => Some(back),
            [front, back] if back == leaf => Some(front),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_encoding() {
        assert_eq!(Child::Node(0).encode(), 0);
        assert_eq!(Child::Node(12).encode(), 12);
        assert_eq!(Child::Leaf(0).encode(), u32::MAX);
        assert_eq!(Child::Leaf(4).encode() as i32, -5);
        assert_eq!(Child::Solid.encode(), SOLID_LEAF);

        for child in [Child::Node(0), Child::Node(77), Child::Leaf(0), Child::Leaf(900), Child::Solid] {
            assert_eq!(Child::decode(child.encode()), child);
        }
    }

    #[test]
    fn new_node_starts_solid() {
        let node = BspNode::new(3, BoundingBox::empty());
        assert!(node.front.is_solid());
        assert!(node.back.is_solid());
    }

    #[test]
    fn portal_neighbour() {
        let portal = BspPortal {
            polygon: Polygon::default(),
            owner_node: 0,
            leaf_owner: [2, 5],
        };
        assert_eq!(portal.neighbour_of(2), Some(5));
        assert_eq!(portal.neighbour_of(5), Some(2));
        assert_eq!(portal.neighbour_of(1), None);
    }
}
