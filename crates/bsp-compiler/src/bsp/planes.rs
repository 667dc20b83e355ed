//! Deduplicated plane table.

use crate::error::{reserve, Result};
use crate::Plane3D;

/// Planes referenced by faces and nodes, stored once each.
///
/// Two planes are merged when [`Plane3D::approx_eq`] holds; orientation
/// matters, so a plane and its flip get separate entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaneSet {
    planes: Vec<Plane3D>,
}

impl PlaneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of a stored plane matching `plane`, adding it first
    /// if there is none.
    pub fn insert(&mut self, plane: Plane3D) -> Result<usize> {
        if let Some(index) = self.find(&plane) {
            return Ok(index);
        }
        reserve(&mut self.planes, 1)?;
        self.planes.push(plane);
        Ok(self.planes.len() - 1)
    }

    pub fn find(&self, plane: &Plane3D) -> Option<usize> {
        self.planes.iter().position(|p| p.approx_eq(plane))
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Plane3D> {
        self.planes.get(index)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Plane3D] {
        &self.planes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn clear(&mut self) {
        self.planes.clear();
    }
}

impl std::ops::Index<usize> for PlaneSet {
    type Output = Plane3D;

    fn index(&self, index: usize) -> &Plane3D {
        &self.planes[index]
    }
}

impl From<Vec<Plane3D>> for PlaneSet {
    fn from(planes: Vec<Plane3D>) -> Self {
        Self { planes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn near_planes_share_an_entry() {
        let mut set = PlaneSet::new();
        let a = set.insert(Plane3D::new(Vector3::y(), 1.0).unwrap()).unwrap();
        let b = set.insert(Plane3D::new(Vector3::y(), 1.004).unwrap()).unwrap();
        let c = set.insert(Plane3D::new(Vector3::y(), 2.0).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn flipped_plane_is_distinct() {
        let mut set = PlaneSet::new();
        let plane = Plane3D::new(Vector3::x(), 0.5).unwrap();
        let a = set.insert(plane).unwrap();
        let b = set.insert(plane.flipped()).unwrap();
        assert_ne!(a, b);
        assert_eq!(set[b], plane.flipped());
    }
}
