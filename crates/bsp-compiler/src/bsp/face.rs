//! Faces fed to the tree builder.

use serde::{Deserialize, Serialize};

use crate::Polygon;

/// Role of a face in the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FaceKind {
    /// Structural geometry; the only kind used as a splitter.
    #[default]
    World,
    /// Decoration that is filtered into leaves but never splits space.
    Detail,
    /// Movable geometry; treated like detail by the partition.
    Door,
}

/// A polygon with rendering attributes and the bookkeeping the builder needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BspFace {
    pub polygon: Polygon,
    #[serde(default)]
    pub kind: FaceKind,
    #[serde(default)]
    pub material_index: Option<u32>,
    #[serde(default)]
    pub texture_index: Option<u32>,
    #[serde(default)]
    pub shader_index: Option<u32>,

    /// Set once a coplanar, same-facing world face has split a node.
    #[serde(skip)]
    pub used_as_splitter: bool,

    /// Position of this face in the tree's exported face array.
    #[serde(skip)]
    pub original_index: usize,

    /// Index into the tree's plane table.
    #[serde(skip)]
    pub plane: usize,
}

impl BspFace {
    pub fn new(polygon: Polygon) -> Self {
        Self {
            polygon,
            kind: FaceKind::World,
            material_index: None,
            texture_index: None,
            shader_index: None,
            used_as_splitter: false,
            original_index: 0,
            plane: 0,
        }
    }

    pub fn with_kind(mut self, kind: FaceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_material(mut self, material: u32) -> Self {
        self.material_index = Some(material);
        self
    }

    /// True if this face may still be chosen to split a node.
    #[inline]
    pub fn is_splitter_candidate(&self) -> bool {
        self.kind == FaceKind::World && !self.used_as_splitter
    }

    /// A piece of this face carrying the same attributes.
    pub(crate) fn fragment(&self, polygon: Polygon) -> BspFace {
        BspFace {
            polygon,
            ..self.clone_attributes()
        }
    }

    fn clone_attributes(&self) -> BspFace {
        BspFace {
            polygon: Polygon::default(),
            kind: self.kind,
            material_index: self.material_index,
            texture_index: self.texture_index,
            shader_index: self.shader_index,
            used_as_splitter: self.used_as_splitter,
            original_index: self.original_index,
            plane: self.plane,
        }
    }
}

impl AsRef<Polygon> for BspFace {
    fn as_ref(&self) -> &Polygon {
        &self.polygon
    }
}

impl AsMut<Polygon> for BspFace {
    fn as_mut(&mut self) -> &mut Polygon {
        &mut self.polygon
    }
}

/// Number of faces that can still split a node.
pub(crate) fn count_splitters(faces: &[BspFace]) -> usize {
    faces.iter().filter(|f| f.is_splitter_candidate()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn triangle() -> Polygon {
        Polygon::from_points([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn only_unused_world_faces_are_candidates() {
        let world = BspFace::new(triangle());
        let detail = BspFace::new(triangle()).with_kind(FaceKind::Detail);
        let mut used = BspFace::new(triangle());
        used.used_as_splitter = true;

        assert!(world.is_splitter_candidate());
        assert!(!detail.is_splitter_candidate());
        assert!(!used.is_splitter_candidate());
        assert_eq!(count_splitters(&[world, detail, used]), 1);
    }

    #[test]
    fn fragment_keeps_attributes() {
        let mut face = BspFace::new(triangle()).with_material(7).with_kind(FaceKind::Door);
        face.original_index = 3;
        face.plane = 2;

        let piece = face.fragment(Polygon::default());
        assert_eq!(piece.material_index, Some(7));
        assert_eq!(piece.kind, FaceKind::Door);
        assert_eq!(piece.original_index, 3);
        assert_eq!(piece.plane, 2);
        assert!(piece.polygon.is_empty());
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{ "polygon": { "vertices": [
            { "position": [0.0, 0.0, 0.0] },
            { "position": [1.0, 0.0, 0.0] },
            { "position": [0.0, 1.0, 0.0] } ] }, "material_index": 4 }"#;
        let face: BspFace = serde_json::from_str(json).unwrap();
        assert_eq!(face.kind, FaceKind::World);
        assert_eq!(face.material_index, Some(4));
        assert_eq!(face.polygon.len(), 3);
    }
}
