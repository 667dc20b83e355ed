//! Polygon cutting/splitting operations.

use crate::{Classification, Plane3D, PlaneSide, Polygon};

/// Result of splitting a polygon by a plane.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitResult {
    /// Entirely in front; nothing was cut.
    Front,
    /// Entirely behind; nothing was cut.
    Back,
    /// Lies on the plane.
    Coplanar,
    /// Spans the plane and was cut in two.
    Spanning { front: Polygon, back: Polygon },
}

/// Trait for geometry that can be cut by a plane.
pub trait Cuttable {
    /// Cuts the geometry by a plane.
    ///
    /// Returns `(front, back)`:
    ///
    /// - **Front**: `(Some(self), None)` - entire geometry is in front
    /// - **Back**: `(None, Some(self))` - entire geometry is behind
    /// - **Coplanar**: `(Some(self), None)` - treated as front
    /// - **Spanning**: `(Some(front_part), Some(back_part))` - split into two pieces
    fn cut(&self, plane: &Plane3D) -> (Option<Polygon>, Option<Polygon>);
}

impl Cuttable for Polygon {
    fn cut(&self, plane: &Plane3D) -> (Option<Polygon>, Option<Polygon>) {
        match self.split(plane) {
            SplitResult::Front | SplitResult::Coplanar => (Some(self.clone()), None),
            SplitResult::Back => (None, Some(self.clone())),
            SplitResult::Spanning { front, back } => (Some(front), Some(back)),
        }
    }
}

impl Polygon {
    /// Splits the polygon against `plane`.
    ///
    /// New vertices on crossing edges get linearly interpolated normals and
    /// texture coordinates. A spanning polygon whose pieces would degenerate
    /// (fewer than three vertices) is reported on the side that kept them.
    pub fn split(&self, plane: &Plane3D) -> SplitResult {
        match self.classify(plane) {
            Classification::Front => SplitResult::Front,
            Classification::Back => SplitResult::Back,
            Classification::Coplanar => SplitResult::Coplanar,
            Classification::Spanning => match split_polygon(self, plane) {
                (Some(front), Some(back)) => SplitResult::Spanning { front, back },
                (Some(_), None) => SplitResult::Front,
                _ => SplitResult::Back,
            },
        }
    }

    /// Keeps the part of the polygon in front of `plane`.
    ///
    /// On-plane polygons are kept when `keep_on` is set. Returns `None` when
    /// nothing remains.
    pub fn clip_front(self, plane: &Plane3D, keep_on: bool) -> Option<Polygon> {
        match self.split(plane) {
            SplitResult::Front => Some(self),
            SplitResult::Back => None,
            SplitResult::Coplanar => keep_on.then_some(self),
            SplitResult::Spanning { front, .. } => Some(front),
        }
    }
}

/// Splits a spanning polygon into front and back parts.
///
/// Uses a variant of the Sutherland-Hodgman algorithm:
/// walks the polygon edges and builds two vertex lists,
/// adding interpolated vertices where edges cross the plane.
fn split_polygon(polygon: &Polygon, plane: &Plane3D) -> (Option<Polygon>, Option<Polygon>) {
    let vertices = polygon.vertices();
    let n = vertices.len();

    let mut front_verts = Vec::with_capacity(n + 1);
    let mut back_verts = Vec::with_capacity(n + 1);

    let distances: Vec<f32> = vertices
        .iter()
        .map(|v| plane.signed_distance(v.position))
        .collect();
    let sides: Vec<PlaneSide> = vertices
        .iter()
        .map(|v| plane.classify_point(v.position))
        .collect();

    for i in 0..n {
        let next_idx = (i + 1) % n;
        let current = &vertices[i];

        match sides[i] {
            PlaneSide::Front => front_verts.push(*current),
            PlaneSide::Back => back_verts.push(*current),
            PlaneSide::OnPlane => {
                // On-plane vertices go to both sides
                front_verts.push(*current);
                back_verts.push(*current);
            }
        }

        let crosses = matches!(
            (sides[i], sides[next_idx]),
            (PlaneSide::Front, PlaneSide::Back) | (PlaneSide::Back, PlaneSide::Front)
        );

        if crosses {
            let t = distances[i] / (distances[i] - distances[next_idx]);
            let mut split = current.lerp(&vertices[next_idx], t);
            split.position = plane.project_point(split.position);
            front_verts.push(split);
            back_verts.push(split);
        }
    }

    let front = (front_verts.len() >= 3).then(|| Polygon::new(front_verts));
    let back = (back_verts.len() >= 3).then(|| Polygon::new(back_verts));

    (front, back)
}
