//! Axis-aligned bounding boxes.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
///
/// An empty box has `min > max` on every axis, so that extending it by a
/// single point yields a degenerate box around that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    min: Point3<f32>,
    max: Point3<f32>,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Creates a box from its corners. Components are reordered if needed.
    pub fn new(a: Point3<f32>, b: Point3<f32>) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Box that contains nothing.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Smallest box containing every point of the iterator.
    pub fn from_points(points: impl IntoIterator<Item = Point3<f32>>) -> Self {
        points.into_iter().fold(Self::empty(), |mut bounds, point| {
            bounds.extend_point(point);
            bounds
        })
    }

    #[inline]
    pub fn min(&self) -> Point3<f32> {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Point3<f32> {
        self.max
    }

    /// Returns true if no point was ever added.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grows the box to contain `point`.
    pub fn extend_point(&mut self, point: Point3<f32>) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Box grown by `amount` on every side.
    pub fn inflated(&self, amount: f32) -> Self {
        let delta = Vector3::repeat(amount);
        Self {
            min: self.min - delta,
            max: self.max + delta,
        }
    }

    /// Returns true if the boxes overlap (touching counts).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Returns true if the point is inside or on the boundary.
    pub fn contains_point(&self, point: Point3<f32>) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Corners as the `[min.x, min.y, min.z, max.x, max.y, max.z]` layout used
    /// by the level data writer.
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
    }

    /// Inverse of [`BoundingBox::to_array`].
    pub fn from_array(values: [f32; 6]) -> Self {
        Self {
            min: Point3::new(values[0], values[1], values[2]),
            max: Point3::new(values[3], values[4], values[5]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_grows_around_points() {
        let mut bounds = BoundingBox::empty();
        assert!(bounds.is_empty());

        bounds.extend_point(Point3::new(1.0, 2.0, 3.0));
        assert!(!bounds.is_empty());
        assert_eq!(bounds.min(), bounds.max());

        bounds.extend_point(Point3::new(-1.0, 5.0, 0.0));
        assert_eq!(bounds.min(), Point3::new(-1.0, 2.0, 0.0));
        assert_eq!(bounds.max(), Point3::new(1.0, 5.0, 3.0));
    }

    #[test]
    fn intersects_includes_touching_boxes() {
        let a = BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let b = BoundingBox::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let c = BoundingBox::new(Point3::new(1.5, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.inflated(0.6).intersects(&c));
    }

    #[test]
    fn array_layout_is_min_then_max() {
        let bounds = BoundingBox::new(Point3::new(3.0, 2.0, 1.0), Point3::new(0.0, 5.0, -1.0));
        assert_eq!(bounds.to_array(), [0.0, 2.0, -1.0, 3.0, 5.0, 1.0]);
        assert_eq!(BoundingBox::from_array(bounds.to_array()), bounds);
    }
}
