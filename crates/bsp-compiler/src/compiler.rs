//! Phase sequencing with cooperative pause, resume and stop.
//!
//! [`Compiler::compile_scene`] runs on the calling thread. Other threads
//! steer it through a [`CompilerControl`] handle; the compiling thread only
//! notices at the checkpoints every phase polls.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::bsp::{BspFace, BspTree};
use crate::error::{CompileError, Result};
use crate::options::{CompilerOptions, LightmapOptions, OptionSet, ProcessId};
use crate::portals::PortalCompiler;
use crate::progress::{Checkpoint, CompileLogger, LogChannel, LogFlags, PhaseContext};
use crate::pvs::PvsCompiler;
use crate::tjunction::TJunctionRepairer;

/// Run state of a [`Compiler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompilerStatus {
    Idle = 0,
    InProgress = 1,
    Paused = 2,
    Cancelled = 3,
}

impl CompilerStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CompilerStatus::InProgress,
            2 => CompilerStatus::Paused,
            3 => CompilerStatus::Cancelled,
            _ => CompilerStatus::Idle,
        }
    }
}

#[derive(Debug)]
struct ControlState {
    status: AtomicU8,
    progress: AtomicU32,
    progress_max: AtomicU32,
    poll_interval_ms: AtomicU64,
}

/// Shared handle to a compiler's status and progress.
///
/// Cloning is cheap; every clone steers the same compile.
#[derive(Debug, Clone)]
pub struct CompilerControl {
    state: Arc<ControlState>,
}

impl Default for CompilerControl {
    fn default() -> Self {
        Self {
            state: Arc::new(ControlState {
                status: AtomicU8::new(CompilerStatus::Idle as u8),
                progress: AtomicU32::new(0),
                progress_max: AtomicU32::new(0),
                poll_interval_ms: AtomicU64::new(50),
            }),
        }
    }
}

impl CompilerControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> CompilerStatus {
        CompilerStatus::from_u8(self.state.status.load(Ordering::SeqCst))
    }

    fn transition(&self, from: &[CompilerStatus], to: CompilerStatus) -> bool {
        self.state
            .status
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                from.contains(&CompilerStatus::from_u8(current))
                    .then_some(to as u8)
            })
            .is_ok()
    }

    /// Pauses a running compile. Returns false if nothing was running.
    pub fn pause(&self) -> bool {
        let paused = self.transition(&[CompilerStatus::InProgress], CompilerStatus::Paused);
        if paused {
            info!("compiler paused");
        }
        paused
    }

    /// Resumes a paused compile. Returns false if it was not paused.
    pub fn resume(&self) -> bool {
        let resumed = self.transition(&[CompilerStatus::Paused], CompilerStatus::InProgress);
        if resumed {
            info!("compiler resumed");
        }
        resumed
    }

    /// Requests that a running or paused compile unwinds.
    pub fn stop(&self) -> bool {
        let stopped = self.transition(
            &[CompilerStatus::InProgress, CompilerStatus::Paused],
            CompilerStatus::Cancelled,
        );
        if stopped {
            info!("compiler stop requested");
        }
        stopped
    }

    /// Claims the control for a new compile.
    pub(crate) fn begin(&self) -> bool {
        let started = self.transition(&[CompilerStatus::Idle], CompilerStatus::InProgress);
        if started {
            self.state.progress.store(0, Ordering::SeqCst);
            self.state.progress_max.store(0, Ordering::SeqCst);
        }
        started
    }

    pub(crate) fn finish(&self) {
        self.state
            .status
            .store(CompilerStatus::Idle as u8, Ordering::SeqCst);
    }

    /// Sleep between status checks while paused.
    pub fn set_poll_interval(&self, interval: Duration) {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
        self.state.poll_interval_ms.store(millis, Ordering::Relaxed);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.state.poll_interval_ms.load(Ordering::Relaxed))
    }

    /// Progress of the current step as `(value, max)`.
    pub fn progress(&self) -> (u32, u32) {
        (
            self.state.progress.load(Ordering::Relaxed),
            self.state.progress_max.load(Ordering::Relaxed),
        )
    }
}

impl Checkpoint for CompilerControl {
    fn should_continue(&self) -> bool {
        loop {
            match self.status() {
                CompilerStatus::Paused => thread::sleep(self.poll_interval()),
                CompilerStatus::Cancelled => return false,
                CompilerStatus::Idle | CompilerStatus::InProgress => return true,
            }
        }
    }

    fn report_progress(&self, value: u32, max: u32) {
        self.state.progress.store(value, Ordering::Relaxed);
        self.state.progress_max.store(max, Ordering::Relaxed);
    }
}

/// External lightmap phase, run last on the finished tree.
pub trait LightmapBaker {
    fn bake(
        &mut self,
        tree: &BspTree,
        options: &LightmapOptions,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<()>;
}

/// How a compile that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Completed,
    Cancelled,
}

/// Runs every enabled phase over a scene and keeps the resulting tree.
#[derive(Default)]
pub struct Compiler {
    tree: BspTree,
    options: CompilerOptions,
    logger: Option<Box<dyn CompileLogger + Send>>,
    lightmap_baker: Option<Box<dyn LightmapBaker + Send>>,
    control: CompilerControl,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Compiles `faces` from scratch: tree, portals, visibility, T-junction
    /// repair and lightmaps, each when enabled.
    ///
    /// A stop request yields `Ok(CompileOutcome::Cancelled)`. On
    /// cancellation or error the tree is released. The compiler is idle
    /// again when this returns.
    pub fn compile_scene(&mut self, faces: Vec<BspFace>) -> Result<CompileOutcome> {
        if !self.control.begin() {
            return Err(CompileError::InvalidParameters("compiler is already running"));
        }
        info!("compiling scene of {} faces", faces.len());

        let result = self.run_phases(faces);
        let outcome = match result {
            Ok(()) => {
                info!("compile finished");
                self.write_outcome(LogChannel::Info, "Compile finished");
                Ok(CompileOutcome::Completed)
            }
            Err(CompileError::Cancelled) => {
                warn!("compile cancelled");
                self.tree.release();
                self.write_outcome(LogChannel::Warning, "Compile cancelled");
                Ok(CompileOutcome::Cancelled)
            }
            Err(err) => {
                error!("compile failed: {err}");
                self.tree.release();
                self.write_outcome(LogChannel::Error, &format!("Compile failed: {err}"));
                Err(err)
            }
        };

        self.control.finish();
        outcome
    }

    fn write_outcome(&mut self, channel: LogChannel, text: &str) {
        if let Some(logger) = self.logger.as_deref_mut() {
            logger.log_write(channel, LogFlags::HEADER, true, text);
        }
    }

    fn run_phases(&mut self, faces: Vec<BspFace>) -> Result<()> {
        let Compiler {
            tree,
            options,
            logger,
            lightmap_baker,
            control,
        } = self;

        let mut ctx = PhaseContext::new(&*control);
        if let Some(logger) = logger.as_deref_mut() {
            ctx = ctx.with_logger(logger);
        }

        ctx.header("BSP tree");
        tree.release();
        tree.add_faces(faces)?;
        if options.bsp.enabled {
            if options.bsp.add_bounding_box {
                tree.add_bounding_polys()?;
            }
            tree.compile_tree(&options.bsp, &mut ctx)?;
        } else {
            debug!("bsp phase disabled, exporting input faces unchanged");
            tree.adopt_input_faces(&mut ctx)?;
        }

        ctx.poll()?;
        let mut has_portals = false;
        if options.portals.enabled && tree.is_compiled() {
            ctx.header("Portals");
            PortalCompiler::new(options.portals.clone()).compile(tree, &mut ctx)?;
            has_portals = true;
        }

        ctx.poll()?;
        if options.pvs.enabled && has_portals {
            ctx.header("Visibility");
            PvsCompiler::new(options.pvs.clone()).compile(tree, &mut ctx)?;
        }

        ctx.poll()?;
        if options.tjunction.enabled && !tree.faces().is_empty() {
            ctx.header("T-junctions");
            TJunctionRepairer::new(options.tjunction.clone()).repair_tree(tree, &mut ctx)?;
        }

        ctx.poll()?;
        if options.lightmap.enabled {
            if let Some(baker) = lightmap_baker.as_deref_mut() {
                ctx.header("Lightmaps");
                baker.bake(tree, &options.lightmap, &mut ctx)?;
            }
        }
        Ok(())
    }

    /// Same as [`CompilerControl::pause`]. A compile in progress holds
    /// `&mut self`, so other threads steer it through [`Compiler::control`].
    pub fn pause_compiler(&self) -> bool {
        self.control.pause()
    }

    pub fn resume_compiler(&self) -> bool {
        self.control.resume()
    }

    pub fn stop_compiler(&self) -> bool {
        self.control.stop()
    }

    /// Replaces one phase's options.
    pub fn set_options(&mut self, set: OptionSet) {
        debug!("options set for {:?}", set.process());
        self.options.set(set);
    }

    pub fn get_options(&self, process: ProcessId) -> OptionSet {
        self.options.get(process)
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn set_logger(&mut self, logger: Option<Box<dyn CompileLogger + Send>>) {
        self.logger = logger;
    }

    pub fn set_lightmap_baker(&mut self, baker: Option<Box<dyn LightmapBaker + Send>>) {
        self.lightmap_baker = baker;
    }

    /// Handle for steering this compiler from another thread.
    ///
    /// Take it before calling [`Compiler::compile_scene`]; its `pause`,
    /// `resume` and `stop` act on the running compile at its next
    /// checkpoint.
    pub fn control(&self) -> CompilerControl {
        self.control.clone()
    }

    pub fn tree(&self) -> &BspTree {
        &self.tree
    }

    /// Moves the compiled tree out, leaving an empty one behind.
    pub fn take_tree(&mut self) -> BspTree {
        std::mem::take(&mut self.tree)
    }
}
