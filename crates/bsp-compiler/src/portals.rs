//! Portal generation.
//!
//! Every node with open space behind it gets one huge polygon on its plane.
//! The polygon is pushed down the tree, cut by every node plane it crosses,
//! and each surviving fragment that touches a leaf on both sides of the
//! owning node becomes a portal between those two leaves.

use log::{debug, info};
use nalgebra::{Point3, Vector3};

use crate::bsp::{BspPortal, BspTree, Child, PvsData};
use crate::error::{reserve, CompileError, Result};
use crate::options::PortalOptions;
use crate::progress::{LogChannel, LogFlags, PhaseContext};
use crate::{Plane3D, Polygon, SplitResult};

/// Side of a node a subtree hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Front,
    Back,
}

/// A portal polygon on its way down the tree.
#[derive(Debug, Clone)]
struct Fragment {
    polygon: Polygon,
    leaf_owner: [Option<usize>; 2],
}

impl Fragment {
    fn piece(&self, polygon: Polygon) -> Fragment {
        Fragment {
            polygon,
            leaf_owner: self.leaf_owner,
        }
    }
}

/// Parent links of a flat tree.
struct Parents {
    nodes: Vec<Option<(usize, Side)>>,
    leaves: Vec<Option<(usize, Side)>>,
}

impl Parents {
    fn of(tree: &BspTree) -> Self {
        let mut parents = Parents {
            nodes: vec![None; tree.nodes().len()],
            leaves: vec![None; tree.leaves().len()],
        };
        for (index, node) in tree.nodes().iter().enumerate() {
            for (child, side) in [(node.front, Side::Front), (node.back, Side::Back)] {
                match child {
                    Child::Node(child) => parents.nodes[child] = Some((index, side)),
                    Child::Leaf(leaf) => parents.leaves[leaf] = Some((index, side)),
                    Child::Solid => {}
                }
            }
        }
        parents
    }

    /// Which side of `owner` the leaf lies on, if it is under `owner` at all.
    fn side_of(&self, owner: usize, leaf: usize) -> Option<Side> {
        let (mut node, mut side) = self.leaves[leaf]?;
        while node != owner {
            (node, side) = self.nodes[node]?;
        }
        Some(side)
    }
}

/// Builds the portals of a compiled tree.
#[derive(Debug, Clone, Default)]
pub struct PortalCompiler {
    options: PortalOptions,
}

impl PortalCompiler {
    pub fn new(options: PortalOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PortalOptions {
        &self.options
    }

    /// Replaces the tree's portals and each leaf's portal list. Visibility
    /// data computed from earlier portals is dropped.
    pub fn compile(&self, tree: &mut BspTree, ctx: &mut PhaseContext<'_>) -> Result<usize> {
        if !tree.is_compiled() {
            return Err(CompileError::InvalidTreeData(
                "portals require a compiled tree".into(),
            ));
        }
        tree.portals.clear();
        tree.pvs = PvsData::default();
        for leaf in &mut tree.leaves {
            leaf.portals.clear();
        }

        let total = u32::try_from(tree.nodes().len()).unwrap_or(u32::MAX);
        let portals = ctx.run_step("Generating portals", total, |ctx| {
            let parents = Parents::of(tree);
            let mut portals = Vec::new();
            for owner in 0..tree.nodes().len() {
                ctx.poll()?;
                ctx.step();
                if tree.nodes()[owner].back.is_solid() {
                    continue;
                }
                let fragment = Fragment {
                    polygon: node_polygon(tree, owner),
                    leaf_owner: [None, None],
                };
                for fragment in clip_portal(tree, &parents, owner, Child::Node(0), fragment, ctx)? {
                    let [Some(front), Some(back)] = fragment.leaf_owner else {
                        continue;
                    };
                    if !fragment.polygon.is_valid() {
                        continue;
                    }
                    reserve(&mut portals, 1)?;
                    portals.push(BspPortal {
                        polygon: fragment.polygon,
                        owner_node: owner,
                        leaf_owner: [front, back],
                    });
                }
            }
            Ok(portals)
        })?;

        for (index, portal) in portals.iter().enumerate() {
            for leaf in portal.leaf_owner {
                let list = &mut tree.leaves[leaf].portals;
                reserve(list, 1)?;
                list.push(index);
            }
        }
        let count = portals.len();
        tree.portals = portals;

        info!("portals: {count} between {} leaves", tree.leaves().len());
        ctx.write(LogChannel::Detail, LogFlags::INDENT, &format!("{count} portals"));
        Ok(count)
    }
}

/// A square on the node's plane, facing the front side and large enough to
/// cover the whole tree.
fn node_polygon(tree: &BspTree, node: usize) -> Polygon {
    let plane: &Plane3D = &tree.planes()[tree.nodes()[node].plane];
    let bounds = &tree.nodes()[0].bounds;
    let normal = plane.normal();
    let center: Point3<f32> = plane.project_point(bounds.center());
    let half = bounds.size().norm() + 1.0;

    let helper = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = normal.cross(&helper).normalize() * half;
    let v = normal.cross(&u);

    Polygon::from_points([center - u - v, center + u - v, center + u + v, center - u + v])
        .oriented(&normal)
}

/// Cuts `fragment` down the subtree at `child`, returning the pieces that
/// reached a leaf.
fn clip_portal(
    tree: &BspTree,
    parents: &Parents,
    owner: usize,
    child: Child,
    mut fragment: Fragment,
    ctx: &PhaseContext<'_>,
) -> Result<Vec<Fragment>> {
    let index = match child {
        Child::Solid => return Ok(Vec::new()),
        Child::Leaf(leaf) => {
            return Ok(match parents.side_of(owner, leaf) {
                Some(Side::Front) => {
                    fragment.leaf_owner[0] = Some(leaf);
                    vec![fragment]
                }
                Some(Side::Back) => {
                    fragment.leaf_owner[1] = Some(leaf);
                    vec![fragment]
                }
                None => Vec::new(),
            });
        }
        Child::Node(index) => index,
    };
    ctx.poll()?;

    let node = &tree.nodes()[index];
    let plane = &tree.planes()[node.plane];
    match fragment.polygon.split(plane) {
        SplitResult::Front => clip_portal(tree, parents, owner, node.front, fragment, ctx),
        SplitResult::Back => clip_portal(tree, parents, owner, node.back, fragment, ctx),
        SplitResult::Spanning { front, back } => {
            let back = fragment.piece(back);
            let mut pieces = clip_portal(tree, parents, owner, node.front, fragment.piece(front), ctx)?;
            let behind = clip_portal(tree, parents, owner, node.back, back, ctx)?;
            reserve(&mut pieces, behind.len())?;
            pieces.extend(behind);
            Ok(pieces)
        }
        SplitResult::Coplanar => {
            // Down the front first, then every front piece down the back.
            let fronts = if node.front.is_solid() {
                vec![fragment]
            } else {
                clip_portal(tree, parents, owner, node.front, fragment, ctx)?
            };
            if node.back.is_solid() {
                return Ok(fronts);
            }
            let mut pieces = Vec::new();
            for piece in fronts {
                let behind = clip_portal(tree, parents, owner, node.back, piece, ctx)?;
                reserve(&mut pieces, behind.len())?;
                pieces.extend(behind);
            }
            debug!("node {index}: {} coplanar portal pieces", pieces.len());
            Ok(pieces)
        }
    }
}
