//! Potentially visible sets.
//!
//! Visibility is computed per portal view in two passes. A flood through
//! every portal that passes a cheap facing test gives each view a superset
//! of what it can see. The exact pass then walks the same graph, clipping
//! portals by the planes separating the source from the last portal passed,
//! and stops wherever nothing is left. Each leaf's row is the union over the
//! views leaving it, plus the leaf itself.

mod bits;
mod flow;
mod portal;
pub mod zrle;

pub use bits::VisBits;
pub use portal::{leaf_views, FlowStatus, PvsPortal};

use log::info;

use crate::bsp::BspTree;
use crate::error::{reserve, CompileError, Result};
use crate::options::PvsOptions;
use crate::progress::{LogChannel, LogFlags, PhaseContext};

use self::flow::PortalFlow;

/// Computes and stores the visibility rows of a tree with portals.
#[derive(Debug, Clone, Default)]
pub struct PvsCompiler {
    options: PvsOptions,
}

impl PvsCompiler {
    pub fn new(options: PvsOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PvsOptions {
        &self.options
    }

    /// Computes visibility for every leaf of `tree` and installs it with
    /// [`BspTree::set_pvs_data`]. The tree is not modified on error.
    pub fn compile(&self, tree: &mut BspTree, ctx: &mut PhaseContext<'_>) -> Result<()> {
        let leaf_count = tree.leaves().len();
        if leaf_count == 0 {
            return Err(CompileError::InvalidTreeData(
                "visibility requires a tree with leaves".into(),
            ));
        }

        let views = PvsPortal::views_of(tree)?;
        let mut flow = PortalFlow {
            leaf_views: leaf_views(&views, leaf_count),
            views,
            leaf_count,
            clip_tests: self.options.clip_test_count.min(4),
        };
        let total = u32::try_from(flow.views.len()).unwrap_or(u32::MAX);

        ctx.run_step("Initial visibility", total, |ctx| flow.initial_vis(ctx))?;
        if self.options.full_compile {
            ctx.run_step("Portal flow", total, |ctx| flow.flow_all(ctx))?;
        }

        let total = u32::try_from(leaf_count).unwrap_or(u32::MAX);
        let PackedRows {
            data,
            offsets,
            visible,
        } = ctx.run_step("Packing visibility", total, |ctx| self.pack_rows(&flow, ctx))?;
        info!(
            "pvs: {} views, {:.1} leaves visible on average, {} bytes",
            flow.views.len(),
            visible as f32 / leaf_count as f32,
            data.len()
        );
        ctx.write(
            LogChannel::Detail,
            LogFlags::INDENT,
            &format!("{visible} visible leaf pairs, {} bytes", data.len()),
        );

        tree.set_pvs_data(data, self.options.compress, &offsets)
    }

    /// Visibility of one leaf: itself plus everything its views reach.
    fn leaf_row(&self, flow: &PortalFlow, leaf: usize) -> Result<VisBits> {
        let mut row = VisBits::new(flow.leaf_count)?;
        row.set(leaf);
        for &view in &flow.leaf_views[leaf] {
            let view = &flow.views[view];
            if self.options.full_compile {
                row.union_with(&view.actual);
            } else {
                row.union_with(&view.possible);
            }
        }
        Ok(row)
    }

    fn pack_rows(&self, flow: &PortalFlow, ctx: &mut PhaseContext<'_>) -> Result<PackedRows> {
        let mut data = Vec::new();
        let mut offsets = Vec::new();
        let mut visible = 0;
        reserve(&mut offsets, flow.leaf_count)?;

        for leaf in 0..flow.leaf_count {
            ctx.poll()?;
            ctx.step();
            let row = self.leaf_row(flow, leaf)?;
            visible += row.count_ones();
            let row = row.to_row_bytes();
            let row = if self.options.compress {
                zrle::compress(&row)
            } else {
                row
            };
            let offset = u32::try_from(data.len())
                .map_err(|_| CompileError::Generic("visibility data exceeds 4 GiB".into()))?;
            offsets.push(offset);
            reserve(&mut data, row.len())?;
            data.extend(row);
        }
        Ok(PackedRows {
            data,
            offsets,
            visible,
        })
    }
}

/// Exported rows with their start offsets and the number of set bits.
struct PackedRows {
    data: Vec<u8>,
    offsets: Vec<u32>,
    visible: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{compile, portal_chain, two_rooms};
    use crate::options::BspOptions;
    use crate::portals::PortalCompiler;
    use crate::progress::tests::{CancelAfter, RecordingLogger};
    use crate::progress::NeverCancel;
    use nalgebra::Point3;

    /// Four rooms whose doors alternate between the low and high ends of
    /// the shared walls.
    fn zigzag() -> BspTree {
        portal_chain(&[(0.0, 0.2), (0.8, 1.0), (0.0, 0.2)])
    }

    fn run(tree: &mut BspTree, options: PvsOptions) {
        let mut ctx = PhaseContext::new(&NeverCancel);
        PvsCompiler::new(options).compile(tree, &mut ctx).unwrap();
    }

    #[test]
    fn doorway_rooms_see_each_other() {
        let mut tree = compile(two_rooms(), &BspOptions::default());
        let mut ctx = PhaseContext::new(&NeverCancel);
        PortalCompiler::default().compile(&mut tree, &mut ctx).unwrap();
        run(&mut tree, PvsOptions::default());

        let a = tree.find_leaf(Point3::new(0.5, 0.5, 0.5)).unwrap();
        let b = tree.find_leaf(Point3::new(1.5, 0.5, 0.5)).unwrap();
        let visible = tree.find_pvs_leaf_indices(a).unwrap();
        assert!(visible.contains(&a) && visible.contains(&b));
    }

    #[test]
    fn exact_flow_hides_rooms_around_corners() {
        let mut tree = zigzag();
        run(&mut tree, PvsOptions::default());

        assert_eq!(tree.find_pvs_leaf_indices(0).unwrap(), vec![0, 1, 2]);
        assert_eq!(tree.find_pvs_leaf_indices(1).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(tree.find_pvs_leaf_indices(2).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(tree.find_pvs_leaf_indices(3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn packing_counts_visible_pairs_once_per_row() {
        let mut tree = zigzag();
        let mut logger = RecordingLogger::default();
        let mut ctx = PhaseContext::new(&NeverCancel).with_logger(&mut logger);
        PvsCompiler::new(PvsOptions::default()).compile(&mut tree, &mut ctx).unwrap();
        drop(ctx);

        let expected = format!("14 visible leaf pairs, {} bytes", tree.pvs().data.len());
        assert!(logger.messages.contains(&expected), "{:?}", logger.messages);
        assert_eq!(logger.messages.iter().filter(|m| m.starts_with("Packing visibility")).count(), 1);
    }

    #[test]
    fn flood_only_is_conservative() {
        let mut tree = zigzag();
        run(
            &mut tree,
            PvsOptions {
                full_compile: false,
                ..PvsOptions::default()
            },
        );
        for leaf in 0..4 {
            assert_eq!(tree.find_pvs_leaf_indices(leaf).unwrap(), vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn separator_tests_can_be_disabled() {
        let mut tree = zigzag();
        run(
            &mut tree,
            PvsOptions {
                clip_test_count: 0,
                ..PvsOptions::default()
            },
        );
        assert!(tree.is_leaf_visible(0, 3).unwrap());
    }

    #[test]
    fn exact_is_subset_of_possible() {
        let tree = zigzag();
        let views = PvsPortal::views_of(&tree).unwrap();
        let mut flow = PortalFlow {
            leaf_views: leaf_views(&views, 4),
            views,
            leaf_count: 4,
            clip_tests: 4,
        };
        let mut ctx = PhaseContext::new(&NeverCancel);
        flow.initial_vis(&mut ctx).unwrap();
        flow.flow_all(&mut ctx).unwrap();

        for view in &flow.views {
            assert_eq!(view.status, FlowStatus::Done);
            assert!(view.actual.is_subset_of(&view.possible));
            assert!(view.actual.get(view.neighbour));
        }
    }

    #[test]
    fn compressed_and_raw_rows_agree() {
        let mut raw = zigzag();
        run(
            &mut raw,
            PvsOptions {
                compress: false,
                ..PvsOptions::default()
            },
        );
        let mut packed = zigzag();
        run(&mut packed, PvsOptions::default());

        assert!(!raw.pvs().compressed);
        assert!(packed.pvs().compressed);
        for leaf in 0..4 {
            assert_eq!(raw.pvs_row(leaf).unwrap(), packed.pvs_row(leaf).unwrap());
        }
    }

    #[test]
    fn leaf_without_portals_sees_itself() {
        let mut tree = portal_chain(&[]);
        run(&mut tree, PvsOptions::default());
        assert_eq!(tree.find_pvs_leaf_indices(0).unwrap(), vec![0]);
    }

    #[test]
    fn cancellation_leaves_tree_without_visibility() {
        let mut tree = zigzag();
        let stop = CancelAfter::new(3);
        let mut ctx = PhaseContext::new(&stop);
        let err = PvsCompiler::default().compile(&mut tree, &mut ctx).unwrap_err();
        assert!(err.is_cancelled());
        assert!(tree.pvs().is_empty());
    }
}
