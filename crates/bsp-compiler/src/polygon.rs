//! Convex polygon representation.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{reserve, Result};
use crate::{BoundingBox, Classification, Plane3D, PlaneSide, Vertex};

/// A convex polygon in 3D space, defined by an ordered list of vertices.
///
/// Vertices should be coplanar and in counter-clockwise winding order
/// when viewed from the front (the direction the normal points).
/// A polygon with fewer than three vertices is representable but not
/// [valid](Polygon::is_valid); the compiler rejects such input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<Vertex>,
}

impl Polygon {
    /// Creates a new polygon from a list of vertices.
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    /// Creates a polygon from bare positions; attributes are zeroed.
    pub fn from_points(points: impl IntoIterator<Item = Point3<f32>>) -> Self {
        Self {
            vertices: points.into_iter().map(Vertex::new).collect(),
        }
    }

    /// Returns the vertices of the polygon.
    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Returns the vertices mutably.
    #[inline]
    pub fn vertices_mut(&mut self) -> &mut [Vertex] {
        &mut self.vertices
    }

    /// Iterates over vertex positions.
    pub fn points(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.vertices.iter().map(|v| v.position)
    }

    /// Returns the number of vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// At least three vertices and a non-degenerate normal.
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3 && self.unit_normal().is_some()
    }

    /// Computes the area-weighted (unnormalized) normal of the polygon.
    ///
    /// Uses Newell's method, so the result does not depend on the first three
    /// vertices being non-collinear.
    pub fn normal(&self) -> Vector3<f32> {
        let n = self.vertices.len();
        let mut normal = Vector3::zeros();
        for i in 0..n {
            let a = self.vertices[i].position;
            let b = self.vertices[(i + 1) % n].position;
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal
    }

    /// Computes the unit normal vector of the polygon.
    ///
    /// Returns `None` for degenerate polygons.
    pub fn unit_normal(&self) -> Option<Vector3<f32>> {
        self.normal().try_normalize(f32::EPSILON)
    }

    /// Returns the plane that this polygon lies on.
    pub fn plane(&self) -> Option<Plane3D> {
        let normal = self.unit_normal()?;
        Plane3D::from_point_and_normal(self.centroid(), normal)
    }

    /// Computes the centroid (average of the vertices) of the polygon.
    pub fn centroid(&self) -> Point3<f32> {
        if self.vertices.is_empty() {
            return Point3::origin();
        }
        let sum: Vector3<f32> = self.vertices.iter().map(|v| v.position.coords).sum();
        Point3::from(sum / self.vertices.len() as f32)
    }

    /// Enclosed area.
    pub fn area(&self) -> f32 {
        self.normal().norm() * 0.5
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(self.points())
    }

    /// Classifies this polygon relative to a plane.
    ///
    /// Returns:
    /// - `Coplanar` if all vertices lie on the plane
    /// - `Front` if no vertex is behind the plane
    /// - `Back` if no vertex is in front of the plane
    /// - `Spanning` if vertices are on both sides
    pub fn classify(&self, plane: &Plane3D) -> Classification {
        let mut front = 0;
        let mut back = 0;

        for vertex in &self.vertices {
            match plane.classify_point(vertex.position) {
                PlaneSide::Front => front += 1,
                PlaneSide::Back => back += 1,
                PlaneSide::OnPlane => {}
            }
        }

        match (front, back) {
            (0, 0) => Classification::Coplanar,
            (_, 0) => Classification::Front,
            (0, _) => Classification::Back,
            _ => Classification::Spanning,
        }
    }

    /// Returns the polygon with reversed winding and negated vertex normals.
    pub fn flipped(&self) -> Polygon {
        Polygon {
            vertices: self
                .vertices
                .iter()
                .rev()
                .map(|v| Vertex {
                    normal: -v.normal,
                    ..*v
                })
                .collect(),
        }
    }

    /// Returns the polygon wound so that its normal points along `facing`.
    pub fn oriented(self, facing: &Vector3<f32>) -> Polygon {
        if self.normal().dot(facing) < 0.0 {
            self.flipped()
        } else {
            self
        }
    }

    /// The six faces of `bounds`, with normals pointing inward or outward.
    pub fn box_faces(bounds: &BoundingBox, inward: bool) -> Vec<Polygon> {
        let (lo, hi) = (bounds.min(), bounds.max());
        let mut faces = Vec::with_capacity(6);
        for axis in 0..3 {
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
            for (value, outward) in [(lo[axis], -1.0), (hi[axis], 1.0)] {
                let corner = |a: f32, b: f32| {
                    let mut p = Point3::origin();
                    p[axis] = value;
                    p[u] = a;
                    p[v] = b;
                    p
                };
                let quad = Polygon::from_points([
                    corner(lo[u], lo[v]),
                    corner(hi[u], lo[v]),
                    corner(hi[u], hi[v]),
                    corner(lo[u], hi[v]),
                ]);
                let mut facing = Vector3::zeros();
                facing[axis] = if inward { -outward } else { outward };
                faces.push(quad.oriented(&facing));
            }
        }
        faces
    }

    /// Moves every vertex exactly onto `plane`.
    pub fn snap_to_plane(&mut self, plane: &Plane3D) {
        for vertex in &mut self.vertices {
            vertex.position = plane.project_point(vertex.position);
        }
    }

    /// Inserts a vertex before position `index`.
    pub fn insert_vertex(&mut self, index: usize, vertex: Vertex) -> Result<()> {
        reserve(&mut self.vertices, 1)?;
        self.vertices.insert(index, vertex);
        Ok(())
    }

    /// Consumes the polygon, returning its vertices.
    pub fn into_vertices(self) -> Vec<Vertex> {
        self.vertices
    }
}

impl AsRef<Polygon> for Polygon {
    fn as_ref(&self) -> &Polygon {
        self
    }
}

impl AsMut<Polygon> for Polygon {
    fn as_mut(&mut self) -> &mut Polygon {
        self
    }
}

impl From<Vec<Vertex>> for Polygon {
    fn from(vertices: Vec<Vertex>) -> Self {
        Self::new(vertices)
    }
}
