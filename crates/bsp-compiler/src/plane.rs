//! Plane representation and classification.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Epsilon for every point-versus-plane and point-versus-edge test in the
/// compiler (tree build, portal clipping, PVS clipping, T-junction search).
/// Points within this distance of the plane are considered "on" the plane.
pub const PLANE_EPSILON: f32 = 1e-2;

/// Tolerance used when comparing two unit normals for plane deduplication.
pub const NORMAL_EPSILON: f32 = 1e-5;

/// Which side of a plane a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Point is in front of the plane (positive side of normal)
    Front,
    /// Point is behind the plane (negative side of normal)
    Back,
    /// Point lies on the plane (within epsilon tolerance)
    OnPlane,
}

/// Classification of a polygon relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No vertex is behind the plane, at least one is in front
    Front,
    /// No vertex is in front of the plane, at least one is behind
    Back,
    /// All vertices are on the plane (coplanar)
    Coplanar,
    /// Vertices are on both sides (spans the plane)
    Spanning,
}

/// A plane in 3D space, represented as `normal · point = offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane3D {
    normal: Vector3<f32>,
    offset: f32,
}

impl Plane3D {
    /// Creates a new plane from a normal vector and offset.
    /// The normal will be normalized automatically.
    ///
    /// Returns `None` if the normal vector has zero length.
    pub fn new(normal: Vector3<f32>, offset: f32) -> Option<Self> {
        let norm = normal.norm();
        if norm <= f32::EPSILON {
            return None;
        }
        Some(Self {
            normal: normal / norm,
            offset: offset / norm,
        })
    }

    /// Creates a plane from a point on the plane and a normal vector.
    ///
    /// Returns `None` if the normal vector has zero length.
    pub fn from_point_and_normal(point: Point3<f32>, normal: Vector3<f32>) -> Option<Self> {
        let norm = normal.norm();
        if norm <= f32::EPSILON {
            return None;
        }
        let unit_normal = normal / norm;
        Some(Self {
            normal: unit_normal,
            offset: unit_normal.dot(&point.coords),
        })
    }

    /// Creates a plane from three points.
    /// The normal direction follows the right-hand rule: (b - a) × (c - a).
    ///
    /// Returns `None` if the points are collinear (or nearly so).
    pub fn from_three_points(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Option<Self> {
        Self::from_point_and_normal(a, (b - a).cross(&(c - a)))
    }

    /// Returns the unit normal vector of the plane.
    #[inline]
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Returns the signed distance from the origin to the plane along the normal.
    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Computes the signed distance from a point to the plane.
    /// - Positive: point is in front (same side as normal)
    /// - Negative: point is behind (opposite side from normal)
    #[inline]
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Classifies which side of the plane a point lies on using `PLANE_EPSILON`.
    #[inline]
    pub fn classify_point(&self, point: Point3<f32>) -> PlaneSide {
        self.classify_point_with_epsilon(point, PLANE_EPSILON)
    }

    /// Classifies which side of the plane a point lies on, with a custom epsilon.
    pub fn classify_point_with_epsilon(&self, point: Point3<f32>, epsilon: f32) -> PlaneSide {
        let dist = self.signed_distance(point);
        if dist > epsilon {
            PlaneSide::Front
        } else if dist < -epsilon {
            PlaneSide::Back
        } else {
            PlaneSide::OnPlane
        }
    }

    /// Returns a new plane with the normal flipped (facing the opposite direction).
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Projects a point onto the plane (finds the closest point on the plane).
    #[inline]
    pub fn project_point(&self, point: Point3<f32>) -> Point3<f32> {
        point - self.normal * self.signed_distance(point)
    }

    /// Returns true if both planes describe the same oriented plane within tolerance.
    pub fn approx_eq(&self, other: &Plane3D) -> bool {
        (self.normal - other.normal).amax() <= NORMAL_EPSILON
            && (self.offset - other.offset).abs() <= PLANE_EPSILON
    }

    /// Returns true if the normals point into the same half-space.
    #[inline]
    pub fn faces_same_direction(&self, other: &Plane3D) -> bool {
        self.normal.dot(&other.normal) > 0.0
    }

    /// Computes the intersection of a line segment with the plane.
    ///
    /// Returns `Some((t, point))` where `t` is the interpolation parameter
    /// (0.0 = start, 1.0 = end). Returns `None` if the segment is parallel to
    /// the plane or doesn't reach it.
    pub fn intersect_segment(
        &self,
        start: Point3<f32>,
        end: Point3<f32>,
    ) -> Option<(f32, Point3<f32>)> {
        let direction = end - start;
        let denom = self.normal.dot(&direction);

        if denom.abs() < f32::EPSILON {
            return None;
        }

        let t = (self.offset - self.normal.dot(&start.coords)) / denom;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }

        Some((t, start + direction * t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn new_normalizes_normal_and_offset() {
        let plane = Plane3D::new(Vector3::new(0.0, 2.0, 0.0), 4.0).unwrap();
        assert_approx_eq!(plane.normal().y, 1.0);
        assert_approx_eq!(plane.offset(), 2.0);
    }

    #[test]
    fn zero_normal_is_rejected() {
        assert!(Plane3D::new(Vector3::zeros(), 1.0).is_none());
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(Plane3D::from_three_points(p, p, p).is_none());
    }

    #[test]
    fn classify_point_uses_epsilon() {
        let plane = Plane3D::new(Vector3::x(), 0.5).unwrap();
        assert_eq!(plane.classify_point(Point3::new(1.0, 0.0, 0.0)), PlaneSide::Front);
        assert_eq!(plane.classify_point(Point3::new(0.0, 0.0, 0.0)), PlaneSide::Back);
        assert_eq!(plane.classify_point(Point3::new(0.505, 3.0, 0.0)), PlaneSide::OnPlane);
    }

    #[test]
    fn flipped_swaps_sides() {
        let plane = Plane3D::new(Vector3::z(), 1.0).unwrap();
        let point = Point3::new(0.0, 0.0, 3.0);
        assert_eq!(plane.classify_point(point), PlaneSide::Front);
        assert_eq!(plane.flipped().classify_point(point), PlaneSide::Back);
    }

    #[test]
    fn approx_eq_tolerates_small_offset_drift() {
        let a = Plane3D::new(Vector3::y(), 1.0).unwrap();
        let b = Plane3D::new(Vector3::y(), 1.005).unwrap();
        let c = Plane3D::new(Vector3::y(), 1.5).unwrap();
        assert!(a.approx_eq(&b));
        assert!(!a.approx_eq(&c));
        assert!(!a.approx_eq(&a.flipped()));
    }

    #[test]
    fn intersect_segment_midpoint() {
        let plane = Plane3D::new(Vector3::x(), 0.5).unwrap();
        let (t, point) = plane
            .intersect_segment(Point3::new(0.0, 1.0, 0.0), Point3::new(1.0, 1.0, 0.0))
            .unwrap();
        assert_approx_eq!(t, 0.5);
        assert_approx_eq!(point.x, 0.5);
        assert!(plane
            .intersect_segment(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0))
            .is_none());
    }
}
