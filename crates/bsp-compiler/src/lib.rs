//! Offline level compiler.
//!
//! Takes the polygons of a closed scene and produces a BSP tree, the
//! portals joining its empty leaves, per-leaf potentially visible sets and
//! crack-free geometry. [`Compiler`] runs the phases in order; each phase
//! can also be driven on its own through [`BspTree`], [`PortalCompiler`],
//! [`PvsCompiler`] and [`TJunctionRepairer`].

mod bounds;
mod cuttable;
mod plane;
mod polygon;
mod vertex;

pub mod bsp;
pub mod compiler;
pub mod error;
pub mod level;
pub mod options;
pub mod portals;
pub mod progress;
pub mod pvs;
pub mod tjunction;

#[cfg(test)]
mod fixtures;

pub use bounds::BoundingBox;
pub use cuttable::{Cuttable, SplitResult};
pub use plane::{Classification, Plane3D, PlaneSide, NORMAL_EPSILON, PLANE_EPSILON};
pub use polygon::Polygon;
pub use vertex::Vertex;

pub use bsp::{BspFace, BspTree, FaceKind};
pub use compiler::{CompileOutcome, Compiler, CompilerControl, CompilerStatus, LightmapBaker};
pub use error::{CompileError, Result};
pub use level::{read_level_data, write_level_data, LevelData};
pub use options::{
    BspOptions, CompilerOptions, LightmapOptions, OptionSet, PortalOptions, ProcessId, PvsOptions,
    TJunctionOptions, TreeType,
};
pub use portals::PortalCompiler;
pub use progress::{Checkpoint, CompileLogger, ConsoleLogger, LogChannel, LogFlags, NeverCancel, PhaseContext};
pub use pvs::PvsCompiler;
pub use tjunction::TJunctionRepairer;
