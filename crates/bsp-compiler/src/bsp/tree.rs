//! BSP tree container and construction.

use log::{debug, info};

use crate::error::{reserve, CompileError, Result};
use crate::options::{BspOptions, TreeType};
use crate::progress::{LogChannel, LogFlags, PhaseContext};
use crate::{BoundingBox, FaceKind, Plane3D, Polygon, SplitResult};

use super::face::{count_splitters, BspFace};
use super::node::{BspLeaf, BspNode, BspPortal, Child};
use super::planes::PlaneSet;
use super::selector::{PlaneSelector, SampledSelector};

/// Packed per-leaf visibility rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PvsData {
    pub data: Vec<u8>,
    /// Rows are zero-run-length encoded.
    pub compressed: bool,
}

impl PvsData {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A compiled level: planes, nodes, leaves, faces, portals and visibility.
///
/// Faces are queued with [`BspTree::add_faces`] and partitioned by
/// [`BspTree::compile_tree`]. Node 0 is the root. Every array is
/// index-addressed so the tree serializes without pointer fix-ups.
#[derive(Debug, Clone, Default)]
pub struct BspTree {
    pub(crate) input: Vec<BspFace>,
    pub(crate) bounds: BoundingBox,
    pub(crate) planes: PlaneSet,
    pub(crate) nodes: Vec<BspNode>,
    pub(crate) leaves: Vec<BspLeaf>,
    pub(crate) faces: Vec<BspFace>,
    pub(crate) portals: Vec<BspPortal>,
    pub(crate) pvs: PvsData,
    pub(crate) tree_type: TreeType,
}

impl BspTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues faces for the next compile.
    ///
    /// Fails with [`CompileError::InvalidParameters`] on an empty list and
    /// with [`CompileError::InvalidGeometry`] if any polygon is degenerate;
    /// in both cases the tree is left untouched.
    pub fn add_faces(&mut self, faces: Vec<BspFace>) -> Result<()> {
        if faces.is_empty() {
            return Err(CompileError::InvalidParameters("no faces supplied"));
        }
        if let Some(index) = faces.iter().position(|f| !f.polygon.is_valid()) {
            return Err(CompileError::InvalidGeometry(format!(
                "face {index} is degenerate"
            )));
        }

        reserve(&mut self.input, faces.len())?;
        for face in &faces {
            self.bounds = self.bounds.union(&face.polygon.bounds());
        }
        self.input.extend(faces);
        Ok(())
    }

    /// Seals the queued scene in a box of six inward-facing world polygons
    /// slightly larger than its bounds.
    pub fn add_bounding_polys(&mut self) -> Result<()> {
        if self.input.is_empty() {
            return Err(CompileError::InvalidParameters("no faces to enclose"));
        }
        let margin = self.bounds.size().amax() * 0.1 + 1.0;
        let bounds = self.bounds.inflated(margin);
        let polygons = Polygon::box_faces(&bounds, true);

        reserve(&mut self.input, polygons.len())?;
        self.input.extend(polygons.into_iter().map(BspFace::new));
        self.bounds = bounds;
        Ok(())
    }

    /// Partitions the queued faces with the sampled splitter heuristic.
    pub fn compile_tree(&mut self, options: &BspOptions, ctx: &mut PhaseContext<'_>) -> Result<()> {
        let selector = SampledSelector::new(options.splitter_sample, options.split_heuristic);
        self.compile_tree_with(&selector, options, ctx)
    }

    /// Partitions the queued faces, choosing splitters with `selector`.
    ///
    /// The queued faces are consumed. On any error, cancellation included,
    /// the tree is released.
    pub fn compile_tree_with<S: PlaneSelector>(
        &mut self,
        selector: &S,
        options: &BspOptions,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<()> {
        if self.input.is_empty() {
            return Err(CompileError::InvalidParameters("no faces to compile"));
        }
        self.clear_output();
        self.tree_type = options.tree_type;

        let faces = std::mem::take(&mut self.input);
        let result = self.build(faces, selector, options, ctx);
        if result.is_err() {
            self.release();
        }
        result
    }

    /// Moves the queued faces straight into the face array without
    /// partitioning, for runs that skip the tree build. Each face still gets
    /// its entry in the plane table.
    pub fn adopt_input_faces(&mut self, ctx: &mut PhaseContext<'_>) -> Result<()> {
        if self.input.is_empty() {
            return Err(CompileError::InvalidParameters("no faces to adopt"));
        }
        self.clear_output();

        let mut faces = std::mem::take(&mut self.input);
        let total = u32::try_from(faces.len()).unwrap_or(u32::MAX);
        let result = ctx.run_step("Selecting planes", total, |ctx| self.assign_planes(&mut faces, ctx));
        if result.is_err() {
            self.release();
            return result;
        }
        self.faces = faces;
        Ok(())
    }

    fn build<S: PlaneSelector>(
        &mut self,
        mut faces: Vec<BspFace>,
        selector: &S,
        options: &BspOptions,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<()> {
        let total = u32::try_from(faces.len()).unwrap_or(u32::MAX);
        ctx.run_step("Selecting planes", total, |ctx| self.assign_planes(&mut faces, ctx))?;

        if count_splitters(&faces) == 0 {
            return Err(CompileError::InvalidGeometry(
                "scene contains no world faces".into(),
            ));
        }
        if self.tree_type == TreeType::NonSplit {
            reserve(&mut self.faces, faces.len())?;
            self.faces.extend(faces.iter().cloned());
        }

        ctx.run_step("Building tree", total, |ctx| {
            reserve(&mut self.nodes, 1)?;
            self.nodes.push(BspNode::new(0, BoundingBox::empty()));
            self.build_node(0, faces, 0, selector, options, ctx)
        })?;

        info!(
            "bsp tree: {} nodes, {} leaves, {} faces, {} planes",
            self.nodes.len(),
            self.leaves.len(),
            self.faces.len(),
            self.planes.len()
        );
        ctx.write(
            LogChannel::Detail,
            LogFlags::INDENT,
            &format!(
                "{} nodes, {} leaves, {} faces",
                self.nodes.len(),
                self.leaves.len(),
                self.faces.len()
            ),
        );
        Ok(())
    }

    /// Gives every face a deduplicated plane and snaps it onto that plane.
    fn assign_planes(&mut self, faces: &mut [BspFace], ctx: &mut PhaseContext<'_>) -> Result<()> {
        for (index, face) in faces.iter_mut().enumerate() {
            ctx.poll()?;
            let plane = face.polygon.plane().ok_or_else(|| {
                CompileError::InvalidGeometry(format!("face {index} has no plane"))
            })?;
            face.plane = self.planes.insert(plane)?;
            face.polygon.snap_to_plane(&self.planes[face.plane]);
            face.original_index = index;
            face.used_as_splitter = false;
            ctx.step();
        }
        Ok(())
    }

    fn build_node<S: PlaneSelector>(
        &mut self,
        node: usize,
        faces: Vec<BspFace>,
        depth: usize,
        selector: &S,
        options: &BspOptions,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<()> {
        ctx.poll()?;
        if depth >= options.max_depth {
            return Err(CompileError::InvalidGeometry(format!(
                "tree exceeds the depth limit of {}",
                options.max_depth
            )));
        }

        let splitter = selector
            .select(&faces, self.planes.as_slice())
            .ok_or_else(|| CompileError::InvalidGeometry(format!("node {node} has no splitter")))?;
        let plane_index = faces[splitter].plane;
        let plane = self.planes[plane_index];
        self.nodes[node] = BspNode::new(plane_index, faces_bounds(&faces));
        ctx.step();

        let (front, back) = self.partition(faces, plane_index, &plane, ctx)?;

        let front_child = self.build_child(front, depth, selector, options, ctx)?;
        self.nodes[node].front = front_child;

        let back_child = if back.is_empty() {
            Child::Solid
        } else if options.remove_back_leaves && count_splitters(&back) == 0 {
            debug!("node {node}: culled {} faces behind the plane", back.len());
            Child::Solid
        } else {
            self.build_child(back, depth, selector, options, ctx)?
        };
        self.nodes[node].back = back_child;
        Ok(())
    }

    /// Turns a face list into a leaf, or into a node when it still holds
    /// splitters.
    fn build_child<S: PlaneSelector>(
        &mut self,
        faces: Vec<BspFace>,
        depth: usize,
        selector: &S,
        options: &BspOptions,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<Child> {
        if count_splitters(&faces) == 0 {
            return Ok(Child::Leaf(self.make_leaf(faces)?));
        }
        reserve(&mut self.nodes, 1)?;
        let index = self.nodes.len();
        self.nodes.push(BspNode::new(0, BoundingBox::empty()));
        self.build_node(index, faces, depth + 1, selector, options, ctx)?;
        Ok(Child::Node(index))
    }

    /// Sorts faces to the front or back of a node plane, cutting the ones
    /// that span it.
    fn partition(
        &self,
        faces: Vec<BspFace>,
        plane_index: usize,
        plane: &Plane3D,
        ctx: &PhaseContext<'_>,
    ) -> Result<(Vec<BspFace>, Vec<BspFace>)> {
        let mut front = Vec::new();
        let mut back = Vec::new();
        reserve(&mut front, faces.len())?;

        for mut face in faces {
            ctx.poll()?;
            if face.plane == plane_index {
                mark_used(&mut face);
                push_face(&mut front, face)?;
                continue;
            }
            match face.polygon.split(plane) {
                SplitResult::Front => push_face(&mut front, face)?,
                SplitResult::Back => push_face(&mut back, face)?,
                SplitResult::Coplanar => {
                    if self.planes[face.plane].faces_same_direction(plane) {
                        mark_used(&mut face);
                        push_face(&mut front, face)?;
                    } else {
                        push_face(&mut back, face)?;
                    }
                }
                SplitResult::Spanning {
                    front: mut front_part,
                    back: mut back_part,
                } => {
                    let own = &self.planes[face.plane];
                    front_part.snap_to_plane(own);
                    back_part.snap_to_plane(own);
                    push_face(&mut front, face.fragment(front_part))?;
                    push_face(&mut back, face.fragment(back_part))?;
                }
            }
        }
        Ok((front, back))
    }

    fn make_leaf(&mut self, faces: Vec<BspFace>) -> Result<usize> {
        let bounds = faces_bounds(&faces);
        let mut indices = Vec::new();
        reserve(&mut indices, faces.len())?;

        match self.tree_type {
            TreeType::Split => {
                reserve(&mut self.faces, faces.len())?;
                for mut face in faces {
                    face.original_index = self.faces.len();
                    indices.push(face.original_index);
                    self.faces.push(face);
                }
            }
            TreeType::NonSplit => {
                for face in &faces {
                    if !indices.contains(&face.original_index) {
                        indices.push(face.original_index);
                    }
                }
            }
        }

        reserve(&mut self.leaves, 1)?;
        self.leaves.push(BspLeaf {
            bounds,
            faces: indices,
            ..BspLeaf::default()
        });
        Ok(self.leaves.len() - 1)
    }

    /// Drops compiled output, keeping queued input faces.
    fn clear_output(&mut self) {
        self.planes.clear();
        self.nodes.clear();
        self.leaves.clear();
        self.faces.clear();
        self.portals.clear();
        self.pvs = PvsData::default();
    }

    /// Frees every array, queued faces included.
    pub fn release(&mut self) {
        *self = BspTree::default();
    }

    /// True once a partition has been built.
    #[inline]
    pub fn is_compiled(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Faces queued for the next compile.
    #[inline]
    pub fn input_faces(&self) -> &[BspFace] {
        &self.input
    }

    /// Bounds of all queued and compiled geometry.
    #[inline]
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    #[inline]
    pub fn planes(&self) -> &[Plane3D] {
        self.planes.as_slice()
    }

    #[inline]
    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    #[inline]
    pub fn leaves(&self) -> &[BspLeaf] {
        &self.leaves
    }

    #[inline]
    pub fn faces(&self) -> &[BspFace] {
        &self.faces
    }

    #[inline]
    pub fn faces_mut(&mut self) -> &mut [BspFace] {
        &mut self.faces
    }

    #[inline]
    pub fn portals(&self) -> &[BspPortal] {
        &self.portals
    }

    #[inline]
    pub fn pvs(&self) -> &PvsData {
        &self.pvs
    }

    #[inline]
    pub fn tree_type(&self) -> TreeType {
        self.tree_type
    }

    /// Bytes in one uncompressed visibility row.
    #[inline]
    pub fn bytes_per_set(&self) -> usize {
        self.leaves.len().div_ceil(8)
    }

    /// Installs visibility rows; `offsets` gives each leaf's row start.
    pub fn set_pvs_data(&mut self, data: Vec<u8>, compressed: bool, offsets: &[u32]) -> Result<()> {
        if offsets.len() != self.leaves.len() {
            return Err(CompileError::InvalidParameters(
                "one visibility offset is required per leaf",
            ));
        }
        if offsets.iter().any(|&offset| offset as usize > data.len()) {
            return Err(CompileError::InvalidParameters("visibility offset out of range"));
        }
        for (leaf, &offset) in self.leaves.iter_mut().zip(offsets) {
            leaf.pvs_offset = offset;
        }
        self.pvs = PvsData { data, compressed };
        Ok(())
    }
}

fn mark_used(face: &mut BspFace) {
    if face.kind == FaceKind::World {
        face.used_as_splitter = true;
    }
}

fn push_face(list: &mut Vec<BspFace>, face: BspFace) -> Result<()> {
    reserve(list, 1)?;
    list.push(face);
    Ok(())
}

fn faces_bounds(faces: &[BspFace]) -> BoundingBox {
    faces
        .iter()
        .fold(BoundingBox::empty(), |bounds, face| bounds.union(&face.polygon.bounds()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{compile, room, two_rooms};
    use crate::progress::tests::CancelAfter;
    use crate::progress::NeverCancel;
    use crate::Vertex;
    use nalgebra::Point3;

    #[test]
    fn single_room_is_one_leaf_inside_solid() {
        let tree = compile(room(Point3::origin(), Point3::new(1.0, 1.0, 1.0)), &BspOptions::default());

        assert_eq!(tree.leaves().len(), 1);
        assert_eq!(tree.nodes()[0].back, Child::Solid);
        assert_eq!(tree.leaves()[0].faces.len(), 6);
        assert_eq!(tree.faces().len(), 6);
        assert_eq!(tree.planes().len(), 6);
        // A convex room is a chain of nodes with empty space in front.
        assert_eq!(tree.nodes().len(), 6);
        assert!(tree.nodes().iter().all(|n| n.back == Child::Solid));
    }

    #[test]
    fn doorway_splits_into_two_rooms() {
        let tree = compile(two_rooms(), &BspOptions::default());
        assert_eq!(tree.leaves().len(), 2);

        let open_backs = tree.nodes().iter().filter(|n| !n.back.is_solid()).count();
        assert_eq!(open_backs, 1);
    }

    #[test]
    fn split_faces_are_tiled_into_leaves() {
        let tree = compile(two_rooms(), &BspOptions::default());
        // Every face fragment appears in exactly one leaf.
        let mut seen = vec![0; tree.faces().len()];
        for leaf in tree.leaves() {
            for &face in &leaf.faces {
                seen[face] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
        for (index, face) in tree.faces().iter().enumerate() {
            assert_eq!(face.original_index, index);
        }
    }

    #[test]
    fn non_split_tree_references_input_faces() {
        let faces = two_rooms();
        let count = faces.len();
        let options = BspOptions {
            tree_type: TreeType::NonSplit,
            ..BspOptions::default()
        };
        let tree = compile(faces, &options);

        assert_eq!(tree.faces().len(), count);
        let listed: usize = tree.leaves().iter().map(|l| l.faces.len()).sum();
        // Shared floor, ceiling and side walls are listed by both rooms.
        assert!(listed > count);
        for leaf in tree.leaves() {
            let mut sorted = leaf.faces.clone();
            sorted.dedup();
            assert_eq!(sorted.len(), leaf.faces.len());
            assert!(leaf.faces.iter().all(|&f| f < count));
        }
    }

    #[test]
    fn adopted_faces_index_the_plane_table() {
        let mut tree = BspTree::new();
        tree.add_faces(two_rooms()).unwrap();
        let count = tree.input_faces().len();
        let mut ctx = PhaseContext::new(&NeverCancel);
        tree.adopt_input_faces(&mut ctx).unwrap();

        assert!(!tree.is_compiled());
        assert_eq!(tree.faces().len(), count);
        assert!(!tree.planes().is_empty());
        for (index, face) in tree.faces().iter().enumerate() {
            assert_eq!(face.original_index, index);
            let plane = &tree.planes()[face.plane];
            let own = face.polygon.plane().unwrap();
            assert!(plane.approx_eq(&own));
        }
        // Floor, ceiling, two side walls, two end walls and both sides of
        // the doorway wall.
        assert_eq!(tree.planes().len(), 8);
    }

    #[test]
    fn empty_face_list_leaves_tree_untouched() {
        let mut tree = BspTree::new();
        tree.add_faces(room(Point3::origin(), Point3::new(1.0, 1.0, 1.0))).unwrap();
        let before = tree.input_faces().len();

        let err = tree.add_faces(Vec::new()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidParameters(_)));
        assert_eq!(tree.input_faces().len(), before);
    }

    #[test]
    fn degenerate_face_is_rejected() {
        let mut tree = BspTree::new();
        let line = Polygon::new(vec![
            Vertex::new(Point3::new(0.0, 0.0, 0.0)),
            Vertex::new(Point3::new(1.0, 0.0, 0.0)),
            Vertex::new(Point3::new(2.0, 0.0, 0.0)),
        ]);
        let err = tree.add_faces(vec![BspFace::new(line)]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidGeometry(_)));
        assert!(tree.input_faces().is_empty());
    }

    #[test]
    fn detail_only_scene_is_invalid() {
        let faces = room(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .into_iter()
            .map(|f| f.with_kind(FaceKind::Detail))
            .collect();
        let mut tree = BspTree::new();
        tree.add_faces(faces).unwrap();

        let mut ctx = PhaseContext::new(&NeverCancel);
        let err = tree.compile_tree(&BspOptions::default(), &mut ctx).unwrap_err();
        assert!(matches!(err, CompileError::InvalidGeometry(_)));
        assert!(tree.input_faces().is_empty());
        assert!(!tree.is_compiled());
    }

    #[test]
    fn compile_without_faces_is_invalid() {
        let mut tree = BspTree::new();
        let mut ctx = PhaseContext::new(&NeverCancel);
        let err = tree.compile_tree(&BspOptions::default(), &mut ctx).unwrap_err();
        assert!(matches!(err, CompileError::InvalidParameters(_)));
    }

    #[test]
    fn cancellation_releases_the_tree() {
        let mut tree = BspTree::new();
        tree.add_faces(two_rooms()).unwrap();

        let stop = CancelAfter::new(20);
        let mut ctx = PhaseContext::new(&stop);
        let err = tree.compile_tree(&BspOptions::default(), &mut ctx).unwrap_err();
        assert!(err.is_cancelled());
        assert!(tree.nodes().is_empty());
        assert!(tree.input_faces().is_empty());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let options = BspOptions {
            max_depth: 2,
            ..BspOptions::default()
        };
        let mut tree = BspTree::new();
        tree.add_faces(room(Point3::origin(), Point3::new(1.0, 1.0, 1.0))).unwrap();
        let mut ctx = PhaseContext::new(&NeverCancel);
        let err = tree.compile_tree(&options, &mut ctx).unwrap_err();
        assert!(matches!(err, CompileError::InvalidGeometry(_)));
    }

    #[test]
    fn stray_geometry_behind_walls_is_culled() {
        let mut faces = room(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        // A detail quad outside the room, behind the x = 1 wall.
        let stray = Polygon::box_faces(
            &BoundingBox::new(Point3::new(2.0, 0.2, 0.2), Point3::new(2.5, 0.8, 0.8)),
            false,
        );
        faces.extend(stray.into_iter().map(|p| BspFace::new(p).with_kind(FaceKind::Detail)));

        let tree = compile(faces.clone(), &BspOptions::default());
        assert_eq!(tree.leaves().len(), 1);
        assert_eq!(tree.faces().len(), 6);

        let keep = BspOptions {
            remove_back_leaves: false,
            ..BspOptions::default()
        };
        let tree = compile(faces, &keep);
        assert_eq!(tree.leaves().len(), 2);
        assert_eq!(tree.faces().len(), 12);
    }

    #[test]
    fn bounding_polys_enclose_open_geometry() {
        let wall = room(Point3::origin(), Point3::new(1.0, 1.0, 1.0)).remove(0);
        let mut tree = BspTree::new();
        tree.add_faces(vec![wall]).unwrap();
        tree.add_bounding_polys().unwrap();
        assert_eq!(tree.input_faces().len(), 7);

        let mut ctx = PhaseContext::new(&NeverCancel);
        tree.compile_tree(&BspOptions::default(), &mut ctx).unwrap();
        assert!(tree.leaves().len() >= 1);
        assert!(tree.bounds().contains_point(Point3::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn pvs_offsets_must_match_leaves() {
        let mut tree = compile(two_rooms(), &BspOptions::default());
        assert!(tree.set_pvs_data(vec![3, 3], false, &[0]).is_err());
        tree.set_pvs_data(vec![3, 3], false, &[0, 1]).unwrap();
        assert_eq!(tree.leaves()[1].pvs_offset, 1);
        assert_eq!(tree.bytes_per_set(), 1);
    }
}
