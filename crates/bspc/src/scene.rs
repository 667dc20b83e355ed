//! JSON scene input.

use std::io::Read;

use bsp_compiler::{BspFace, CompilerOptions};
use serde::Deserialize;

/// A flat list of faces, optionally with the options to compile it with.
#[derive(Debug, Deserialize)]
pub struct Scene {
    pub faces: Vec<BspFace>,
    #[serde(default)]
    pub options: Option<CompilerOptions>,
}

impl Scene {
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsp_compiler::{FaceKind, TreeType};

    #[test]
    fn faces_with_default_attributes() {
        let json = r#"{
            "faces": [
                { "polygon": { "vertices": [
                    { "position": [0.0, 0.0, 0.0] },
                    { "position": [1.0, 0.0, 0.0] },
                    { "position": [1.0, 1.0, 0.0], "tex_coords": [1.0, 1.0] }
                ] } },
                { "polygon": { "vertices": [
                    { "position": [0.0, 0.0, 1.0] },
                    { "position": [0.0, 1.0, 1.0] },
                    { "position": [1.0, 1.0, 1.0] }
                ] }, "kind": "Detail", "material_index": 3 }
            ],
            "options": { "bsp": { "tree_type": "NonSplit" } }
        }"#;
        let scene = Scene::from_reader(json.as_bytes()).unwrap();

        assert_eq!(scene.faces.len(), 2);
        assert_eq!(scene.faces[0].kind, FaceKind::World);
        assert_eq!(scene.faces[0].polygon.vertices()[2].tex_coords.x, 1.0);
        assert_eq!(scene.faces[1].kind, FaceKind::Detail);
        assert_eq!(scene.faces[1].material_index, Some(3));
        assert_eq!(scene.options.unwrap().bsp.tree_type, TreeType::NonSplit);
    }

    #[test]
    fn options_are_optional() {
        let scene = Scene::from_reader(r#"{ "faces": [] }"#.as_bytes()).unwrap();
        assert!(scene.faces.is_empty());
        assert!(scene.options.is_none());
    }
}
