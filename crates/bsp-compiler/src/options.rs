//! Per-phase option records.
//!
//! Each phase reads one immutable record. They are grouped in
//! [`CompilerOptions`] and can be loaded from JSON; missing fields take
//! their defaults.

use serde::{Deserialize, Serialize};

use crate::plane::PLANE_EPSILON;

/// How spanning faces end up in the exported face array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TreeType {
    /// Leaves reference the split fragments; the face array holds fragments.
    #[default]
    Split,
    /// Leaves reference the original faces; the face array holds the input
    /// faces unchanged and a face may be listed by several leaves.
    NonSplit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BspOptions {
    pub enabled: bool,
    pub tree_type: TreeType,
    /// Number of splitter candidates scored per node before settling for the
    /// best one seen so far. Zero scores every candidate.
    pub splitter_sample: usize,
    /// Weight of each split in the splitter score.
    pub split_heuristic: f32,
    /// Discard back branches that contain no splitter (illegal geometry
    /// behind walls) instead of turning them into leaves.
    pub remove_back_leaves: bool,
    /// Seal the scene with six inward-facing polygons around its bounds.
    pub add_bounding_box: bool,
    /// Build recursion limit; exceeding it fails with invalid geometry.
    pub max_depth: usize,
}

impl Default for BspOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            tree_type: TreeType::Split,
            splitter_sample: 60,
            split_heuristic: 3.0,
            remove_back_leaves: true,
            add_bounding_box: false,
            max_depth: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalOptions {
    pub enabled: bool,
}

impl Default for PortalOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvsOptions {
    pub enabled: bool,
    /// Run the exact portal flow after the approximate flood.
    pub full_compile: bool,
    /// Number of anti-penumbra separator tests per recursion step, 0 to 4.
    pub clip_test_count: u8,
    /// Zero-run-length encode each leaf's visibility row.
    pub compress: bool,
}

impl Default for PvsOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            full_compile: true,
            clip_test_count: 4,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TJunctionOptions {
    pub enabled: bool,
    /// Maximum distance between a vertex and an edge for the vertex to be
    /// welded into the edge.
    pub epsilon: f32,
}

impl Default for TJunctionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            epsilon: PLANE_EPSILON,
        }
    }
}

/// Options of the external lightmap phase. It only runs when a baker is
/// installed on the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapOptions {
    pub enabled: bool,
}

impl Default for LightmapOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Identifies a compiler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    Bsp,
    Portals,
    Pvs,
    TJunction,
    Lightmap,
}

/// One phase's option record, tagged by phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionSet {
    Bsp(BspOptions),
    Portals(PortalOptions),
    Pvs(PvsOptions),
    TJunction(TJunctionOptions),
    Lightmap(LightmapOptions),
}

impl OptionSet {
    pub fn process(&self) -> ProcessId {
        match self {
            OptionSet::Bsp(_) => ProcessId::Bsp,
            OptionSet::Portals(_) => ProcessId::Portals,
            OptionSet::Pvs(_) => ProcessId::Pvs,
            OptionSet::TJunction(_) => ProcessId::TJunction,
            OptionSet::Lightmap(_) => ProcessId::Lightmap,
        }
    }
}

/// Options of every phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub bsp: BspOptions,
    pub portals: PortalOptions,
    pub pvs: PvsOptions,
    pub tjunction: TJunctionOptions,
    pub lightmap: LightmapOptions,
}

impl CompilerOptions {
    /// Replaces the record of the phase `set` belongs to.
    pub fn set(&mut self, set: OptionSet) {
        match set {
            OptionSet::Bsp(options) => self.bsp = options,
            OptionSet::Portals(options) => self.portals = options,
            OptionSet::Pvs(options) => self.pvs = options,
            OptionSet::TJunction(options) => self.tjunction = options,
            OptionSet::Lightmap(options) => self.lightmap = options,
        }
    }

    /// Copy of one phase's record.
    pub fn get(&self, process: ProcessId) -> OptionSet {
        match process {
            ProcessId::Bsp => OptionSet::Bsp(self.bsp.clone()),
            ProcessId::Portals => OptionSet::Portals(self.portals.clone()),
            ProcessId::Pvs => OptionSet::Pvs(self.pvs.clone()),
            ProcessId::TJunction => OptionSet::TJunction(self.tjunction.clone()),
            ProcessId::Lightmap => OptionSet::Lightmap(self.lightmap.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips_per_phase() {
        let mut options = CompilerOptions::default();
        let pvs = PvsOptions {
            clip_test_count: 2,
            compress: false,
            ..PvsOptions::default()
        };
        options.set(OptionSet::Pvs(pvs.clone()));

        assert_eq!(options.get(ProcessId::Pvs), OptionSet::Pvs(pvs));
        assert_eq!(options.get(ProcessId::Bsp), OptionSet::Bsp(BspOptions::default()));
        assert_eq!(options.get(ProcessId::TJunction).process(), ProcessId::TJunction);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{ "bsp": { "splitter_sample": 0, "tree_type": "NonSplit" }, "pvs": { "full_compile": false } }"#;
        let options: CompilerOptions = serde_json::from_str(json).unwrap();

        assert_eq!(options.bsp.splitter_sample, 0);
        assert_eq!(options.bsp.tree_type, TreeType::NonSplit);
        assert_eq!(options.bsp.split_heuristic, 3.0);
        assert!(!options.pvs.full_compile);
        assert_eq!(options.pvs.clip_test_count, 4);
        assert!(options.portals.enabled);
    }
}
