//! Point, segment and polygon queries against a compiled tree.

use nalgebra::Point3;

use crate::error::{CompileError, Result};
use crate::pvs::zrle;
use crate::{Polygon, PlaneSide, SplitResult, PLANE_EPSILON};

use super::node::Child;
use super::tree::BspTree;

impl BspTree {
    /// Returns the leaf containing `point`, or `None` for solid space.
    ///
    /// Points on a node plane are treated as being in front of it.
    pub fn find_leaf(&self, point: Point3<f32>) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut current = Child::Node(0);
        loop {
            match current {
                Child::Node(index) => {
                    let node = &self.nodes[index];
                    current = match self.planes[node.plane].classify_point(point) {
                        PlaneSide::Back => node.back,
                        PlaneSide::Front | PlaneSide::OnPlane => node.front,
                    };
                }
                Child::Leaf(index) => return Some(index),
                Child::Solid => return None,
            }
        }
    }

    /// First point where the segment from `start` to `end` enters solid
    /// space, searching the near side of every crossed plane first.
    pub fn ray_intersect(&self, start: Point3<f32>, end: Point3<f32>) -> Option<Point3<f32>> {
        if self.nodes.is_empty() {
            return None;
        }
        self.ray_child(Child::Node(0), start, end)
    }

    /// True if the segment never touches solid space.
    pub fn is_segment_clear(&self, start: Point3<f32>, end: Point3<f32>) -> bool {
        self.ray_intersect(start, end).is_none()
    }

    fn ray_child(&self, child: Child, start: Point3<f32>, end: Point3<f32>) -> Option<Point3<f32>> {
        let index = match child {
            Child::Solid => return Some(start),
            Child::Leaf(_) => return None,
            Child::Node(index) => index,
        };
        let node = &self.nodes[index];
        let plane = &self.planes[node.plane];
        let d_start = plane.signed_distance(start);
        let d_end = plane.signed_distance(end);

        if d_start >= -PLANE_EPSILON && d_end >= -PLANE_EPSILON {
            return self.ray_child(node.front, start, end);
        }
        if d_start < PLANE_EPSILON && d_end < PLANE_EPSILON {
            return self.ray_child(node.back, start, end);
        }

        let t = d_start / (d_start - d_end);
        let mid = start + (end - start) * t;
        let (near, far) = if d_start >= 0.0 {
            (node.front, node.back)
        } else {
            (node.back, node.front)
        };
        self.ray_child(near, start, mid)
            .or_else(|| self.ray_child(far, mid, end))
    }

    /// True if any part of `polygon` lies in solid space.
    ///
    /// A polygon on a node plane follows its facing, like faces do while
    /// building.
    pub fn intersected_by_face(&self, polygon: &Polygon) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.face_child(Child::Node(0), polygon)
    }

    fn face_child(&self, child: Child, polygon: &Polygon) -> bool {
        let index = match child {
            Child::Solid => return true,
            Child::Leaf(_) => return false,
            Child::Node(index) => index,
        };
        let node = &self.nodes[index];
        let plane = &self.planes[node.plane];
        match polygon.split(plane) {
            SplitResult::Front => self.face_child(node.front, polygon),
            SplitResult::Back => self.face_child(node.back, polygon),
            SplitResult::Coplanar => {
                let same_facing = polygon
                    .unit_normal()
                    .is_none_or(|normal| normal.dot(&plane.normal()) > 0.0);
                let side = if same_facing { node.front } else { node.back };
                self.face_child(side, polygon)
            }
            SplitResult::Spanning { front, back } => {
                self.face_child(node.front, &front) || self.face_child(node.back, &back)
            }
        }
    }

    /// Leaves marked visible from `leaf` in its visibility row.
    pub fn find_pvs_leaf_indices(&self, leaf: usize) -> Result<Vec<usize>> {
        let row = self.pvs_row(leaf)?;
        Ok((0..self.leaves.len())
            .filter(|&i| row[i / 8] & (1 << (i % 8)) != 0)
            .collect())
    }

    /// True if `to` is in the visibility row of `from`.
    pub fn is_leaf_visible(&self, from: usize, to: usize) -> Result<bool> {
        if to >= self.leaves.len() {
            return Err(CompileError::InvalidParameters("leaf index out of range"));
        }
        let row = self.pvs_row(from)?;
        Ok(row[to / 8] & (1 << (to % 8)) != 0)
    }

    /// Uncompressed visibility row of `leaf`.
    pub fn pvs_row(&self, leaf: usize) -> Result<Vec<u8>> {
        let record = self
            .leaves
            .get(leaf)
            .ok_or(CompileError::InvalidParameters("leaf index out of range"))?;
        if self.pvs.is_empty() {
            return Err(CompileError::InvalidTreeData("tree has no visibility data".into()));
        }
        let row_len = self.bytes_per_set();
        let start = record.pvs_offset as usize;
        let tail = self.pvs.data.get(start..).ok_or_else(|| {
            CompileError::InvalidTreeData(format!("leaf {leaf} visibility offset is out of range"))
        })?;

        if self.pvs.compressed {
            zrle::decompress(tail, row_len)
        } else {
            tail.get(..row_len).map(<[u8]>::to_vec).ok_or_else(|| {
                CompileError::InvalidTreeData(format!("leaf {leaf} visibility row is truncated"))
            })
        }
    }
}
