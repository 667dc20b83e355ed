//! Scene geometry shared by the unit tests.

use nalgebra::{Point3, Vector3};

use crate::options::BspOptions;
use crate::progress::{NeverCancel, PhaseContext};
use crate::bsp::{BspLeaf, BspPortal};
use crate::{BoundingBox, BspFace, BspTree, Polygon};

/// A closed box of six inward-facing world quads.
pub(crate) fn room(min: Point3<f32>, max: Point3<f32>) -> Vec<BspFace> {
    Polygon::box_faces(&BoundingBox::new(min, max), true)
        .into_iter()
        .map(BspFace::new)
        .collect()
}

fn quad(corners: [[f32; 3]; 4], facing: Vector3<f32>) -> BspFace {
    let polygon = Polygon::from_points(corners.map(|[x, y, z]| Point3::new(x, y, z)));
    BspFace::new(polygon.oriented(&facing))
}

/// Unit rooms side by side along x. Each shared wall at x = 1, 2, ... has a
/// full-height doorway spanning z in [0.25, 0.75].
pub(crate) fn rooms_in_a_row(count: usize) -> Vec<BspFace> {
    let mut faces = room(Point3::origin(), Point3::new(count as f32, 1.0, 1.0));
    for wall in 1..count {
        let x = wall as f32;
        for (z0, z1) in [(0.0, 0.25), (0.75, 1.0)] {
            let corners = [[x, 0.0, z0], [x, 1.0, z0], [x, 1.0, z1], [x, 0.0, z1]];
            faces.push(quad(corners, -Vector3::x()));
            faces.push(quad(corners, Vector3::x()));
        }
    }
    faces
}

pub(crate) fn two_rooms() -> Vec<BspFace> {
    rooms_in_a_row(2)
}

/// Adds and compiles `faces` with a never-cancelled context.
pub(crate) fn compile(faces: Vec<BspFace>, options: &BspOptions) -> BspTree {
    let mut tree = BspTree::new();
    tree.add_faces(faces).unwrap();
    let mut ctx = PhaseContext::new(&NeverCancel);
    tree.compile_tree(options, &mut ctx).unwrap();
    tree
}

/// A bare portal graph: unit rooms along x, room `i` joined to room `i + 1`
/// by a full-height door at x = i + 1 spanning z in `doors[i]`. Portals face
/// the lower-numbered room. The tree has no nodes or faces.
pub(crate) fn portal_chain(doors: &[(f32, f32)]) -> BspTree {
    let mut tree = BspTree::new();
    for room in 0..=doors.len() {
        let x = room as f32;
        tree.leaves.push(BspLeaf {
            bounds: BoundingBox::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0)),
            ..BspLeaf::default()
        });
    }
    for (index, &(z0, z1)) in doors.iter().enumerate() {
        let x = index as f32 + 1.0;
        let polygon = Polygon::from_points([
            Point3::new(x, 0.0, z0),
            Point3::new(x, 1.0, z0),
            Point3::new(x, 1.0, z1),
            Point3::new(x, 0.0, z1),
        ])
        .oriented(&-Vector3::x());
        tree.portals.push(BspPortal {
            polygon,
            owner_node: index,
            leaf_owner: [index, index + 1],
        });
        tree.leaves[index].portals.push(index);
        tree.leaves[index + 1].portals.push(index);
    }
    tree
}
