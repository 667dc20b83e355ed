//! Approximate flood and exact portal flow.

use std::collections::VecDeque;

use nalgebra::Point3;

use crate::error::Result;
use crate::progress::PhaseContext;
use crate::{Plane3D, Polygon, NORMAL_EPSILON, PLANE_EPSILON};

use super::bits::VisBits;
use super::portal::{FlowStatus, PvsPortal};

/// Views plus the per-leaf lists of views leaving each leaf.
pub(crate) struct PortalFlow {
    pub views: Vec<PvsPortal>,
    pub leaf_views: Vec<Vec<usize>>,
    pub leaf_count: usize,
    /// Separator tests per step, 0 to 4.
    pub clip_tests: u8,
}

/// State handed down one level of the exact flow.
struct FlowLevel<'a> {
    source: &'a Polygon,
    /// Portal the flow last passed through; `None` in the first leaf.
    pass: Option<&'a Polygon>,
    /// Plane of the last portal passed, pointing away from the source.
    plane: Plane3D,
    might: &'a VisBits,
}

impl PortalFlow {
    /// True if `q` could be seen through `p` at all: part of `q` is in front
    /// of `p` and part of `p` is behind `q`.
    fn might_see(p: &PvsPortal, q: &PvsPortal) -> bool {
        q.winding.points().any(|point| p.plane.signed_distance(point) > PLANE_EPSILON)
            && p.winding.points().any(|point| q.plane.signed_distance(point) < -PLANE_EPSILON)
    }

    /// Fills every view's `possible` set by flooding through the portals
    /// that pass the facing test, and records the flood size.
    pub fn initial_vis(&mut self, ctx: &mut PhaseContext<'_>) -> Result<()> {
        for p in 0..self.views.len() {
            ctx.poll()?;
            ctx.step();

            let front: Vec<bool> = (0..self.views.len())
                .map(|q| q != p && Self::might_see(&self.views[p], &self.views[q]))
                .collect();

            let mut possible = VisBits::new(self.leaf_count)?;
            let mut complexity = 0;
            let start = self.views[p].neighbour;
            possible.set(start);
            let mut queue = VecDeque::from([start]);
            while let Some(leaf) = queue.pop_front() {
                complexity += 1;
                for &q in &self.leaf_views[leaf] {
                    let next = self.views[q].neighbour;
                    if front[q] && !possible.get(next) {
                        possible.set(next);
                        queue.push_back(next);
                    }
                }
            }

            let view = &mut self.views[p];
            view.possible = possible;
            view.complexity = complexity;
        }
        Ok(())
    }

    /// Runs the exact flow for every view, cheapest floods first.
    pub fn flow_all(&mut self, ctx: &mut PhaseContext<'_>) -> Result<()> {
        let mut order: Vec<usize> = (0..self.views.len()).collect();
        order.sort_by_key(|&p| self.views[p].complexity);

        for p in order {
            ctx.poll()?;
            ctx.step();
            self.views[p].status = FlowStatus::Working;
            let actual = self.portal_flow(p, ctx)?;
            let view = &mut self.views[p];
            view.actual = actual;
            view.status = FlowStatus::Done;
        }
        Ok(())
    }

    fn portal_flow(&self, p: usize, ctx: &PhaseContext<'_>) -> Result<VisBits> {
        let generator = &self.views[p];
        let mut actual = VisBits::new(self.leaf_count)?;
        let level = FlowLevel {
            source: &generator.winding,
            pass: None,
            plane: generator.plane,
            might: &generator.possible,
        };
        self.leaf_flow(p, generator.neighbour, &level, &mut actual, ctx)?;
        Ok(actual)
    }

    fn leaf_flow(
        &self,
        p: usize,
        leaf: usize,
        level: &FlowLevel<'_>,
        actual: &mut VisBits,
        ctx: &PhaseContext<'_>,
    ) -> Result<()> {
        ctx.poll()?;
        actual.set(leaf);
        let generator = &self.views[p];

        for &q in &self.leaf_views[leaf] {
            let view = &self.views[q];
            if !level.might.get(view.neighbour) {
                continue;
            }

            let test = if view.status == FlowStatus::Done {
                &view.actual
            } else {
                &view.possible
            };
            let might = level.might.intersection(test)?;
            if !might.has_bits_not_in(actual) && actual.get(view.neighbour) {
                continue;
            }

            // Can't leave through a portal facing straight back.
            if (view.plane.normal() + level.plane.normal()).amax() <= NORMAL_EPSILON {
                continue;
            }

            let Some(target) = view.winding.clone().clip_front(&generator.plane, false) else {
                continue;
            };

            let Some(pass) = level.pass else {
                // The second leaf can only be blocked by coplanar portals.
                let next = FlowLevel {
                    source: level.source,
                    pass: Some(&target),
                    plane: view.plane,
                    might: &might,
                };
                self.leaf_flow(p, view.neighbour, &next, actual, ctx)?;
                continue;
            };

            let Some(mut target) = target.clip_front(&level.plane, false) else {
                continue;
            };
            let Some(mut source) = level.source.clone().clip_front(&view.plane.flipped(), false)
            else {
                continue;
            };

            if self.clip_tests > 0 {
                let Some(t) = clip_to_separators(&source, pass, target, false) else {
                    continue;
                };
                target = t;
            }
            if self.clip_tests > 1 {
                let Some(t) = clip_to_separators(pass, &source, target, true) else {
                    continue;
                };
                target = t;
            }
            if self.clip_tests > 2 {
                let Some(s) = clip_to_separators(&target, pass, source, false) else {
                    continue;
                };
                source = s;
            }
            if self.clip_tests > 3 {
                let Some(s) = clip_to_separators(pass, &target, source, true) else {
                    continue;
                };
                source = s;
            }

            let next = FlowLevel {
                source: &source,
                pass: Some(&target),
                plane: view.plane,
                might: &might,
            };
            self.leaf_flow(p, view.neighbour, &next, actual, ctx)?;
        }
        Ok(())
    }
}

/// Clips `target` by the planes that separate `source` from `pass`.
///
/// Each candidate plane runs through an edge of `source` and a vertex of
/// `pass`, with `source` entirely on one side and `pass` on the other.
/// `target` keeps the side `pass` is on, or the source side when `flip` is
/// set. Returns `None` once nothing of `target` is left.
pub(crate) fn clip_to_separators(
    source: &Polygon,
    pass: &Polygon,
    mut target: Polygon,
    flip: bool,
) -> Option<Polygon> {
    let source_points: Vec<Point3<f32>> = source.points().collect();
    let pass_points: Vec<Point3<f32>> = pass.points().collect();
    let n = source_points.len();

    for i in 0..n {
        let l = (i + 1) % n;
        let edge = source_points[l] - source_points[i];

        for (j, &apex) in pass_points.iter().enumerate() {
            let Some(normal) = edge
                .cross(&(apex - source_points[i]))
                .try_normalize(PLANE_EPSILON)
            else {
                continue;
            };
            let Some(mut plane) = Plane3D::from_point_and_normal(apex, normal) else {
                continue;
            };

            // Which side is the source on?
            let source_side = source_points
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != i && k != l)
                .map(|(_, &point)| plane.signed_distance(point))
                .find(|d| d.abs() > PLANE_EPSILON);
            let Some(distance) = source_side else {
                continue;
            };
            if distance > 0.0 {
                plane = plane.flipped();
            }

            // The pass portal must lie entirely on the positive side.
            let mut in_front = 0;
            let mut separates = true;
            for (k, &point) in pass_points.iter().enumerate() {
                if k == j {
                    continue;
                }
                let d = plane.signed_distance(point);
                if d < -PLANE_EPSILON {
                    separates = false;
                    break;
                }
                if d > PLANE_EPSILON {
                    in_front += 1;
                }
            }
            if !separates || in_front == 0 {
                continue;
            }

            if flip {
                plane = plane.flipped();
            }
            target = target.clip_front(&plane, false)?;
            break;
        }
    }
    Some(target)
}
