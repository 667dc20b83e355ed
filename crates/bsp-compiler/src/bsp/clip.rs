//! Clipping foreign faces against a compiled tree.
//!
//! Used for constructive solid geometry: the faces of one brush are pushed
//! through another brush's tree and the pieces landing in solid space are
//! dropped.

use crate::error::{reserve, Result};
use crate::progress::PhaseContext;
use crate::SplitResult;

use super::face::BspFace;
use super::node::Child;
use super::tree::BspTree;

/// A surviving piece of a clipped face.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedFace {
    pub face: BspFace,
    /// Index of the face in the clipped list this piece came from.
    pub source: usize,
}

/// Output of [`BspTree::clip_faces`].
#[derive(Debug, Clone, Default)]
pub struct ClippedFaces {
    pub fragments: Vec<ClippedFace>,
    originals: Vec<BspFace>,
    /// Pieces each source face was cut into, surviving or not.
    produced: Vec<usize>,
}

impl ClippedFaces {
    /// Number of surviving pieces of source face `source`.
    pub fn survivors(&self, source: usize) -> usize {
        self.fragments.iter().filter(|f| f.source == source).count()
    }

    /// Number of pieces source face `source` was cut into.
    pub fn produced(&self, source: usize) -> usize {
        self.produced.get(source).copied().unwrap_or(0)
    }

    /// Replaces the pieces of every face that was cut but lost nothing to
    /// solid space with the uncut original. Returns the number of faces
    /// restored.
    pub fn repair_splits(&mut self) -> usize {
        let mut survived = vec![0usize; self.originals.len()];
        for fragment in &self.fragments {
            survived[fragment.source] += 1;
        }
        let whole: Vec<bool> = self
            .produced
            .iter()
            .zip(&survived)
            .map(|(&produced, &survived)| produced > 1 && produced == survived)
            .collect();

        let mut placed = vec![false; self.originals.len()];
        let mut repaired = 0;
        let fragments = std::mem::take(&mut self.fragments);
        for fragment in fragments {
            let source = fragment.source;
            if !whole[source] {
                self.fragments.push(fragment);
            } else if !placed[source] {
                placed[source] = true;
                repaired += 1;
                self.fragments.push(ClippedFace {
                    face: self.originals[source].clone(),
                    source,
                });
            }
        }
        repaired
    }

    /// The surviving faces, dropping the bookkeeping.
    pub fn into_faces(self) -> Vec<BspFace> {
        self.fragments.into_iter().map(|f| f.face).collect()
    }
}

impl BspTree {
    /// Pushes `faces` through the tree, keeping the pieces that end in a
    /// leaf.
    ///
    /// A face on a node plane facing the same way goes to the back when
    /// `remove_coplanar` is set and to the front otherwise; one facing the
    /// other way always goes to the back.
    pub fn clip_faces(
        &self,
        faces: Vec<BspFace>,
        remove_coplanar: bool,
        ctx: &PhaseContext<'_>,
    ) -> Result<ClippedFaces> {
        let mut clipped = ClippedFaces {
            fragments: Vec::new(),
            produced: vec![1; faces.len()],
            originals: faces,
        };
        if self.nodes.is_empty() {
            for (source, face) in clipped.originals.iter().enumerate() {
                clipped.fragments.push(ClippedFace {
                    face: face.clone(),
                    source,
                });
            }
            return Ok(clipped);
        }

        for source in 0..clipped.originals.len() {
            ctx.poll()?;
            let face = clipped.originals[source].clone();
            self.clip_child(
                Child::Node(0),
                face,
                source,
                remove_coplanar,
                &mut clipped.fragments,
                &mut clipped.produced,
            )?;
        }
        Ok(clipped)
    }

    /// Clips every face of `other` against this tree.
    pub fn clip_tree(
        &self,
        other: &BspTree,
        remove_coplanar: bool,
        ctx: &PhaseContext<'_>,
    ) -> Result<ClippedFaces> {
        let faces = if other.faces.is_empty() {
            other.input.clone()
        } else {
            other.faces.clone()
        };
        self.clip_faces(faces, remove_coplanar, ctx)
    }

    fn clip_child(
        &self,
        child: Child,
        face: BspFace,
        source: usize,
        remove_coplanar: bool,
        out: &mut Vec<ClippedFace>,
        produced: &mut [usize],
    ) -> Result<()> {
        let index = match child {
            Child::Solid => return Ok(()),
            Child::Leaf(_) => {
                reserve(out, 1)?;
                out.push(ClippedFace { face, source });
                return Ok(());
            }
            Child::Node(index) => index,
        };
        let node = &self.nodes[index];
        let plane = &self.planes[node.plane];

        match face.polygon.split(plane) {
            SplitResult::Front => {
                self.clip_child(node.front, face, source, remove_coplanar, out, produced)
            }
            SplitResult::Back => {
                self.clip_child(node.back, face, source, remove_coplanar, out, produced)
            }
            SplitResult::Coplanar => {
                let same_facing = face
                    .polygon
                    .unit_normal()
                    .is_some_and(|normal| normal.dot(&plane.normal()) > 0.0);
                let side = if same_facing && !remove_coplanar {
                    node.front
                } else {
                    node.back
                };
                self.clip_child(side, face, source, remove_coplanar, out, produced)
            }
            SplitResult::Spanning { front, back } => {
                produced[source] += 1;
                let front = face.fragment(front);
                let back = face.fragment(back);
                self.clip_child(node.front, front, source, remove_coplanar, out, produced)?;
                self.clip_child(node.back, back, source, remove_coplanar, out, produced)
            }
        }
    }
}
