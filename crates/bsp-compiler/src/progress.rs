//! Progress reporting and cooperative cancellation.
//!
//! Phases never talk to a console directly. They receive a [`PhaseContext`]
//! holding a [`Checkpoint`] (polled at every long-running loop) and an
//! optional [`CompileLogger`] for user-visible progress text. Diagnostic
//! tracing goes through the `log` facade independently of either.

use bitflags::bitflags;
use log::{debug, error, info, trace, warn};

use crate::error::{CompileError, Result};

/// Destination of a user-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannel {
    Info,
    Warning,
    Error,
    /// Verbose statistics.
    Detail,
}

bitflags! {
    /// Presentation hints attached to a message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LogFlags: u32 {
        /// Phase title.
        const HEADER = 0x01;
        /// Sub-step of the current phase.
        const INDENT = 0x02;
        /// Outcome text written after a rewind.
        const RESULT = 0x04;
    }
}

/// Sink for user-visible compiler output.
///
/// Only [`CompileLogger::log_write`] is required; progress handling is
/// optional for loggers that have no use for it.
pub trait CompileLogger {
    /// Writes `text`. When `new_message` is false the text continues the
    /// previous message.
    fn log_write(&mut self, channel: LogChannel, flags: LogFlags, new_message: bool, text: &str);

    /// Remembers the current output position for a later [`CompileLogger::rewind`].
    fn set_rewind_marker(&mut self) {}

    /// Discards output written since the rewind marker.
    fn rewind(&mut self) {}

    fn set_progress_range(&mut self, _min: u32, _max: u32) {}

    fn set_progress_value(&mut self, _value: u32) {}

    /// Advances progress by one.
    fn update_progress(&mut self) {}

    fn progress_success(&mut self) {}

    fn progress_failure(&mut self) {}
}

/// Cooperative "should continue" query polled by every phase.
pub trait Checkpoint {
    /// Returns false once the compile has been cancelled. May block while
    /// the compile is paused.
    fn should_continue(&self) -> bool;

    /// Publishes progress to observers on other threads.
    fn report_progress(&self, _value: u32, _max: u32) {}
}

/// Checkpoint for stand-alone phase runs that can never be cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl Checkpoint for NeverCancel {
    fn should_continue(&self) -> bool {
        true
    }
}

/// Per-phase execution context: cancellation plus optional logger.
pub struct PhaseContext<'a> {
    checkpoint: &'a dyn Checkpoint,
    logger: Option<&'a mut dyn CompileLogger>,
    progress: u32,
    progress_max: u32,
}

impl<'a> PhaseContext<'a> {
    pub fn new(checkpoint: &'a dyn Checkpoint) -> Self {
        Self {
            checkpoint,
            logger: None,
            progress: 0,
            progress_max: 0,
        }
    }

    pub fn with_logger(mut self, logger: &'a mut dyn CompileLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Polls the checkpoint, turning a stop request into [`CompileError::Cancelled`].
    pub fn poll(&self) -> Result<()> {
        if self.checkpoint.should_continue() {
            Ok(())
        } else {
            Err(CompileError::Cancelled)
        }
    }

    pub fn write(&mut self, channel: LogChannel, flags: LogFlags, text: &str) {
        if let Some(logger) = self.logger.as_deref_mut() {
            logger.log_write(channel, flags, true, text);
        }
    }

    /// Writes the title line of a phase.
    pub fn header(&mut self, text: &str) {
        self.write(LogChannel::Info, LogFlags::HEADER, text);
    }

    /// Starts a sub-step whose progress text is later replaced by its outcome.
    pub fn begin_step(&mut self, text: &str, total: u32) {
        self.progress = 0;
        self.progress_max = total;
        if let Some(logger) = self.logger.as_deref_mut() {
            logger.log_write(LogChannel::Info, LogFlags::INDENT, true, text);
            logger.set_rewind_marker();
            logger.set_progress_range(0, total);
            logger.set_progress_value(0);
        }
        self.checkpoint.report_progress(0, total);
    }

    /// Advances the current step by one unit.
    pub fn step(&mut self) {
        self.progress = self.progress.saturating_add(1);
        if let Some(logger) = self.logger.as_deref_mut() {
            logger.update_progress();
        }
        self.checkpoint.report_progress(self.progress, self.progress_max);
    }

    /// Rewinds the step's progress text and writes its outcome.
    pub fn end_step<T>(&mut self, result: &Result<T>) {
        let Some(logger) = self.logger.as_deref_mut() else {
            return;
        };
        logger.rewind();
        match result {
            Ok(_) => {
                logger.log_write(LogChannel::Info, LogFlags::RESULT, false, "Success");
                logger.progress_success();
            }
            Err(CompileError::Cancelled) => {
                logger.log_write(LogChannel::Warning, LogFlags::RESULT, false, "Cancelled");
                logger.progress_failure();
            }
            Err(err) => {
                logger.log_write(LogChannel::Error, LogFlags::RESULT, false, "Failure!");
                logger.log_write(LogChannel::Error, LogFlags::INDENT, true, &err.to_string());
                logger.progress_failure();
            }
        }
    }

    /// Runs `body` as a reported step: banner, progress, outcome.
    pub fn run_step<T>(
        &mut self,
        text: &str,
        total: u32,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.begin_step(text, total);
        let result = body(self);
        self.end_step(&result);
        result
    }
}

/// [`CompileLogger`] that forwards to the `log` facade.
///
/// Messages are buffered until complete so that rewound progress text never
/// reaches the log. Progress is reported at trace level every ten percent.
#[derive(Debug)]
pub struct ConsoleLogger {
    line: String,
    channel: LogChannel,
    rewind_at: usize,
    progress_max: u32,
    progress: u32,
    last_decile: u32,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            line: String::new(),
            channel: LogChannel::Info,
            rewind_at: 0,
            progress_max: 0,
            progress: 0,
            last_decile: 0,
        }
    }
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush(&mut self) {
        if !self.line.is_empty() {
            match self.channel {
                LogChannel::Info => info!("{}", self.line),
                LogChannel::Warning => warn!("{}", self.line),
                LogChannel::Error => error!("{}", self.line),
                LogChannel::Detail => debug!("{}", self.line),
            }
        }
        self.line.clear();
        self.rewind_at = 0;
    }
}

impl Drop for ConsoleLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

impl CompileLogger for ConsoleLogger {
    fn log_write(&mut self, channel: LogChannel, flags: LogFlags, new_message: bool, text: &str) {
        if new_message {
            self.flush();
            if flags.contains(LogFlags::HEADER) {
                self.line.push_str("== ");
            } else if flags.contains(LogFlags::INDENT) {
                self.line.push_str("   ");
            }
        }
        if flags.contains(LogFlags::RESULT) {
            self.line.push_str(" ... ");
        }
        self.channel = channel;
        self.line.push_str(text);
        if flags.intersects(LogFlags::HEADER | LogFlags::RESULT) {
            self.flush();
        }
    }

    fn set_rewind_marker(&mut self) {
        self.rewind_at = self.line.len();
    }

    fn rewind(&mut self) {
        self.line.truncate(self.rewind_at);
    }

    fn set_progress_range(&mut self, _min: u32, max: u32) {
        self.progress_max = max;
        self.progress = 0;
        self.last_decile = 0;
    }

    fn set_progress_value(&mut self, value: u32) {
        self.progress = value;
    }

    fn update_progress(&mut self) {
        self.progress = self.progress.saturating_add(1);
        if self.progress_max == 0 {
            return;
        }
        let decile = self.progress.min(self.progress_max) * 10 / self.progress_max;
        if decile > self.last_decile {
            self.last_decile = decile;
            trace!("{}%", decile * 10);
        }
    }
}
