//! T-junction repair.
//!
//! Where a vertex of one polygon lies in the interior of another polygon's
//! edge, the edge is split at that vertex. Renderers then see matching
//! vertices on both sides of the seam and no cracks open up.

use log::info;

use crate::bsp::BspTree;
use crate::error::{reserve, CompileError, Result};
use crate::options::TJunctionOptions;
use crate::progress::{LogChannel, LogFlags, PhaseContext};
use crate::{BoundingBox, Polygon};

/// Welds vertices into neighbouring edges.
#[derive(Debug, Clone, Default)]
pub struct TJunctionRepairer {
    options: TJunctionOptions,
}

impl TJunctionRepairer {
    pub fn new(options: TJunctionOptions) -> Self {
        Self { options }
    }

    /// Repairs every face of a compiled tree. Returns the number of
    /// vertices inserted.
    pub fn repair_tree(&self, tree: &mut BspTree, ctx: &mut PhaseContext<'_>) -> Result<usize> {
        if tree.faces().is_empty() {
            return Err(CompileError::InvalidTreeData("tree has no faces to repair".into()));
        }
        self.repair(tree.faces_mut(), ctx)
    }

    /// Repairs a batch of polygons. On error or cancellation nothing is
    /// changed.
    pub fn repair_polygons(&self, polygons: &mut [Polygon], ctx: &mut PhaseContext<'_>) -> Result<usize> {
        self.repair(polygons, ctx)
    }

    /// Repairs anything that holds a polygon.
    pub fn repair<P>(&self, items: &mut [P], ctx: &mut PhaseContext<'_>) -> Result<usize>
    where
        P: AsRef<Polygon> + AsMut<Polygon>,
    {
        let epsilon = self.options.epsilon;
        let mut polygons = Vec::new();
        reserve(&mut polygons, items.len())?;
        polygons.extend(items.iter().map(|item| item.as_ref().clone()));

        let bounds: Vec<BoundingBox> = polygons
            .iter()
            .map(|polygon| polygon.bounds().inflated(epsilon))
            .collect();

        let total = u32::try_from(polygons.len()).unwrap_or(u32::MAX);
        let inserted = ctx.run_step("Repairing T-junctions", total, |ctx| {
            let mut inserted = 0;
            for i in 0..polygons.len() {
                ctx.poll()?;
                ctx.step();
                for j in i + 1..polygons.len() {
                    if !bounds[i].intersects(&bounds[j]) {
                        continue;
                    }
                    let (head, tail) = polygons.split_at_mut(j);
                    let (a, b) = (&mut head[i], &mut tail[0]);
                    inserted += weld(a, b, epsilon)?;
                    inserted += weld(b, a, epsilon)?;
                }
            }
            Ok(inserted)
        })?;

        for (item, polygon) in items.iter_mut().zip(polygons) {
            *item.as_mut() = polygon;
        }

        info!("t-junctions: {inserted} vertices inserted");
        ctx.write(
            LogChannel::Detail,
            LogFlags::INDENT,
            &format!("{inserted} vertices inserted"),
        );
        Ok(inserted)
    }
}

/// Inserts into the edges of `target` every vertex of `other` that lies
/// strictly inside one of them. Returns the number of vertices inserted.
fn weld(target: &mut Polygon, other: &Polygon, epsilon: f32) -> Result<usize> {
    let mut inserted = 0;
    let mut edge = 0;
    while edge < target.len() {
        let vertices = target.vertices();
        let a = vertices[edge];
        let b = vertices[(edge + 1) % vertices.len()];
        let direction = b.position - a.position;
        let length = direction.norm();
        if length <= epsilon {
            edge += 1;
            continue;
        }

        // Nearest vertex along the edge first, so that later inserts land
        // on the remaining sub-edge in order.
        let mut nearest: Option<(f32, usize)> = None;
        for (k, vertex) in other.vertices().iter().enumerate() {
            let offset = vertex.position - a.position;
            let along = offset.dot(&direction) / length;
            if along <= epsilon || along >= length - epsilon {
                continue;
            }
            let off_line = (offset - direction * (along / length)).norm();
            if off_line > epsilon {
                continue;
            }
            let t = along / length;
            if nearest.is_none_or(|(best, _)| t < best) {
                nearest = Some((t, k));
            }
        }

        match nearest {
            Some((t, k)) => {
                let mut vertex = a.lerp(&b, t);
                vertex.position = other.vertices()[k].position;
                target.insert_vertex(edge + 1, vertex)?;
                inserted += 1;
            }
            None => edge += 1,
        }
    }
    Ok(inserted)
}
