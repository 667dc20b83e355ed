//! Splitter selection for BSP tree construction.
//!
//! The choice of splitting plane decides how balanced the tree is and how
//! many faces get cut while building it.

use crate::{Classification, Plane3D};

use super::face::BspFace;

/// Strategy for choosing the face whose plane splits a node.
pub trait PlaneSelector {
    /// Returns the index into `faces` of the chosen splitter.
    ///
    /// Only faces for which [`BspFace::is_splitter_candidate`] holds may be
    /// returned. Returns `None` if there is no candidate.
    fn select(&self, faces: &[BspFace], planes: &[Plane3D]) -> Option<usize>;
}

/// Scores candidates by balance and split count, examining a bounded sample.
///
/// A candidate's score is `|front - back| + splits * split_heuristic`, where
/// the counts are over every other face in the list; faces on the
/// candidate's plane are ignored. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledSelector {
    /// Candidates to score before taking the best so far; zero scores all.
    pub sample: usize,
    pub split_heuristic: f32,
}

impl Default for SampledSelector {
    fn default() -> Self {
        Self {
            sample: 60,
            split_heuristic: 3.0,
        }
    }
}

impl SampledSelector {
    pub fn new(sample: usize, split_heuristic: f32) -> Self {
        Self {
            sample,
            split_heuristic,
        }
    }

    fn score(&self, candidate: usize, faces: &[BspFace], planes: &[Plane3D]) -> f32 {
        let plane_index = faces[candidate].plane;
        let plane = &planes[plane_index];
        let (mut front, mut back, mut splits) = (0i64, 0i64, 0u32);

        for (i, face) in faces.iter().enumerate() {
            if i == candidate || face.plane == plane_index {
                continue;
            }
            match face.polygon.classify(plane) {
                Classification::Front => front += 1,
                Classification::Back => back += 1,
                Classification::Spanning => splits += 1,
                Classification::Coplanar => {}
            }
        }

        (front - back).abs() as f32 + splits as f32 * self.split_heuristic
    }
}

impl PlaneSelector for SampledSelector {
    fn select(&self, faces: &[BspFace], planes: &[Plane3D]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        let mut examined = 0;
        let mut scored_planes = Vec::new();

        for (i, face) in faces.iter().enumerate() {
            if !face.is_splitter_candidate() || scored_planes.contains(&face.plane) {
                continue;
            }
            if self.sample != 0 && examined >= self.sample && best.is_some() {
                break;
            }
            scored_planes.push(face.plane);
            examined += 1;

            let score = self.score(i, faces, planes);
            if best.is_none_or(|(_, best_score)| score < best_score) {
                best = Some((i, score));
            }
        }

        best.map(|(index, _)| index)
    }
}
