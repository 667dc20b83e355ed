//! One-way portal views used by the visibility passes.

use crate::bsp::BspTree;
use crate::error::{reserve, CompileError, Result};
use crate::{Plane3D, Polygon};

use super::bits::VisBits;

/// Progress of the exact flow for one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowStatus {
    #[default]
    NotDone,
    Working,
    Done,
}

/// A portal seen from one of its two leaves.
///
/// Each tree portal yields two views sharing its polygon: one looking from
/// the back leaf into the front leaf and one the other way. The plane
/// normal always points into `neighbour`.
#[derive(Debug, Clone)]
pub struct PvsPortal {
    /// Index of the tree portal.
    pub portal: usize,
    pub source: usize,
    pub neighbour: usize,
    pub plane: Plane3D,
    pub winding: Polygon,
    /// Leaves reachable by the approximate flood.
    pub possible: VisBits,
    /// Leaves reachable by the exact flow; a subset of `possible`.
    pub actual: VisBits,
    /// Number of leaves the flood visited; cheaper views flow first.
    pub complexity: usize,
    pub status: FlowStatus,
}

impl PvsPortal {
    /// Both views of every portal in `tree`: view `2 * i` looks from the
    /// back leaf of portal `i`, view `2 * i + 1` from its front leaf.
    pub fn views_of(tree: &BspTree) -> Result<Vec<PvsPortal>> {
        let leaf_count = tree.leaves().len();
        let mut views = Vec::new();
        reserve(&mut views, tree.portals().len() * 2)?;

        for (index, portal) in tree.portals().iter().enumerate() {
            let plane = portal.polygon.plane().ok_or_else(|| {
                CompileError::InvalidTreeData(format!("portal {index} is degenerate"))
            })?;
            if portal.leaf_owner.iter().any(|&leaf| leaf >= leaf_count) {
                return Err(CompileError::InvalidTreeData(format!(
                    "portal {index} references a missing leaf"
                )));
            }
            let [front, back] = portal.leaf_owner;
            for (source, neighbour, plane) in [(back, front, plane), (front, back, plane.flipped())] {
                views.push(PvsPortal {
                    portal: index,
                    source,
                    neighbour,
                    plane,
                    winding: portal.polygon.clone(),
                    possible: VisBits::new(leaf_count)?,
                    actual: VisBits::new(leaf_count)?,
                    complexity: 0,
                    status: FlowStatus::NotDone,
                });
            }
        }
        Ok(views)
    }
}

/// Views leaving each leaf, indexed by source leaf.
pub fn leaf_views(views: &[PvsPortal], leaf_count: usize) -> Vec<Vec<usize>> {
    let mut by_leaf = vec![Vec::new(); leaf_count];
    for (index, view) in views.iter().enumerate() {
        by_leaf[view.source].push(index);
    }
    by_leaf
}
