//! Binary space partition of a polygon scene.
//!
//! The tree recursively splits space with planes taken from world faces
//! until every remaining face list bounds a convex region. Those regions
//! become leaves; regions with no faces in front of them are solid.
//!
//! # Example
//!
//! ```ignore
//! use bsp_compiler::{BspFace, BspTree, NeverCancel, PhaseContext, BspOptions};
//!
//! let mut tree = BspTree::new();
//! tree.add_faces(faces)?;
//! let mut ctx = PhaseContext::new(&NeverCancel);
//! tree.compile_tree(&BspOptions::default(), &mut ctx)?;
//!
//! let leaf = tree.find_leaf(eye);
//! ```
//!
//! # Architecture
//!
//! - [`BspTree`]: owns every array of the compiled level
//! - [`BspNode`], [`BspLeaf`], [`BspPortal`]: flat records addressed by index
//! - [`Child`]: node/leaf/solid reference with its exported encoding
//! - [`PlaneSelector`]: strategy trait for choosing splitting planes
//! - [`ClippedFaces`]: result of clipping faces against a tree

mod clip;
mod face;
mod node;
mod planes;
mod query;
mod selector;
mod tree;

pub use clip::{ClippedFace, ClippedFaces};
pub use face::{BspFace, FaceKind};
pub use node::{BspLeaf, BspNode, BspPortal, Child, SOLID_LEAF};
pub use planes::PlaneSet;
pub use selector::{PlaneSelector, SampledSelector};
pub use tree::{BspTree, PvsData};
