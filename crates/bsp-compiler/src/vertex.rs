//! Polygon vertex with shading attributes.

use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A polygon corner: position plus the attributes that must survive splitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f32>,
    #[serde(default = "Vector3::zeros")]
    pub normal: Vector3<f32>,
    /// Base texture coordinates.
    #[serde(default = "Point2::origin")]
    pub tex_coords: Point2<f32>,
    /// Lightmap texture coordinates.
    #[serde(default = "Point2::origin")]
    pub lightmap_coords: Point2<f32>,
}

impl Vertex {
    /// Creates a vertex with zeroed attributes.
    pub fn new(position: Point3<f32>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
            tex_coords: Point2::origin(),
            lightmap_coords: Point2::origin(),
        }
    }

    pub fn with_normal(mut self, normal: Vector3<f32>) -> Self {
        self.normal = normal;
        self
    }

    pub fn with_tex_coords(mut self, u: f32, v: f32) -> Self {
        self.tex_coords = Point2::new(u, v);
        self
    }

    pub fn with_lightmap_coords(mut self, u: f32, v: f32) -> Self {
        self.lightmap_coords = Point2::new(u, v);
        self
    }

    /// Linearly interpolates every attribute between `self` (t = 0) and `other` (t = 1).
    ///
    /// The normal is renormalized unless both inputs carry a zero normal.
    pub fn lerp(&self, other: &Vertex, t: f32) -> Vertex {
        let normal = self.normal.lerp(&other.normal, t);
        let normal = normal.try_normalize(f32::EPSILON).unwrap_or(normal);

        Vertex {
            position: self.position + (other.position - self.position) * t,
            normal,
            tex_coords: self.tex_coords + (other.tex_coords - self.tex_coords) * t,
            lightmap_coords: self.lightmap_coords
                + (other.lightmap_coords - self.lightmap_coords) * t,
        }
    }
}

impl From<Point3<f32>> for Vertex {
    fn from(position: Point3<f32>) -> Self {
        Vertex::new(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn lerp_interpolates_all_attributes() {
        let a = Vertex::new(Point3::new(0.0, 0.0, 0.0))
            .with_normal(Vector3::x())
            .with_tex_coords(0.0, 0.0)
            .with_lightmap_coords(0.0, 1.0);
        let b = Vertex::new(Point3::new(2.0, 0.0, 0.0))
            .with_normal(Vector3::x())
            .with_tex_coords(1.0, 4.0)
            .with_lightmap_coords(1.0, 1.0);

        let mid = a.lerp(&b, 0.25);
        assert_approx_eq!(mid.position.x, 0.5);
        assert_approx_eq!(mid.tex_coords.x, 0.25);
        assert_approx_eq!(mid.tex_coords.y, 1.0);
        assert_approx_eq!(mid.lightmap_coords.x, 0.25);
        assert_approx_eq!(mid.normal.norm(), 1.0);
    }

    #[test]
    fn lerp_keeps_zero_normals() {
        let a = Vertex::new(Point3::origin());
        let b = Vertex::new(Point3::new(0.0, 1.0, 0.0));
        assert_eq!(a.lerp(&b, 0.5).normal, Vector3::zeros());
    }
}
