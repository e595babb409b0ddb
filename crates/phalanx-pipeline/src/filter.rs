//! The [`CommandFilter`] capability trait and its per-tick context.
//!
//! Every stage of a command pipeline (optimizer, cheat filter,
//! synchronizer, replay recorder and player, and the terminal executor)
//! implements the same small interface: commands are *handled* (queued)
//! at any time, and once per tick the stage is *advanced*, flushing zero
//! or more commands downstream through its [`FilterContext`].

use std::error::Error;
use std::io;

use phalanx_core::{CodecError, Command, Simulation, UpdateNumber};
use thiserror::Error;

/// Whether a stage can take part in the coming tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The stage is ready to advance.
    Ready,
    /// The stage is waiting on something outside the process (typically
    /// remote peers). The whole pipeline pauses for this tick.
    Stalled,
}

/// Errors a stage can report from [`poll`](CommandFilter::poll),
/// [`advance`](CommandFilter::advance) or [`finish`](CommandFilter::finish).
#[derive(Debug, Error)]
pub enum FilterError {
    /// Reading or writing durable storage or a socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A command could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// Any other stage-specific failure.
    #[error("{0}")]
    Other(Box<dyn Error + Send + Sync>),
}

impl FilterError {
    /// Wrap an arbitrary error as [`FilterError::Other`].
    pub fn other(error: impl Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(error))
    }
}

/// Execution context passed to each stage's `advance()`.
///
/// Carries the update number being executed, the frame time, mutable
/// access to the simulation, and the output buffer for flushed commands.
/// Commands flushed here are handed to the next stage before that stage
/// advances in the same tick.
pub struct FilterContext<'a> {
    update: UpdateNumber,
    dt: f32,
    simulation: &'a mut dyn Simulation,
    flushed: &'a mut Vec<Command>,
}

impl<'a> FilterContext<'a> {
    /// Construct a new filter context.
    ///
    /// Typically called by the pipeline, not by stages directly.
    pub fn new(
        update: UpdateNumber,
        dt: f32,
        simulation: &'a mut dyn Simulation,
        flushed: &'a mut Vec<Command>,
    ) -> Self {
        Self {
            update,
            dt,
            simulation,
            flushed,
        }
    }

    /// The update number being executed this tick.
    pub fn update(&self) -> UpdateNumber {
        self.update
    }

    /// Frame time in seconds.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// The simulation commands execute against.
    pub fn simulation(&mut self) -> &mut dyn Simulation {
        self.simulation
    }

    /// Forward a command to the next stage.
    pub fn flush(&mut self, command: Command) {
        self.flushed.push(command);
    }

    /// Number of commands flushed so far through this context.
    pub fn flushed_len(&self) -> usize {
        self.flushed.len()
    }
}

/// One stage of a command pipeline.
///
/// # Contract
///
/// - `handle()` only queues. It never executes commands, never touches
///   the simulation, and never blocks.
/// - `advance()` is called once per executed tick, in pipeline order.
///   A stage flushes a command with its entity set unchanged unless the
///   stage is explicitly a transforming one (the optimizer).
/// - Stages share no state; the only coupling is the forwarding order
///   fixed when the pipeline is built.
///
/// # Object safety
///
/// This trait is object-safe; the pipeline stores stages as
/// `Vec<Box<dyn CommandFilter>>`.
pub trait CommandFilter: Send {
    /// Human-readable name for logs and error reports.
    fn name(&self) -> &str;

    /// Queue a command for the next `advance()`.
    fn handle(&mut self, command: Command);

    /// Pre-tick readiness check.
    ///
    /// Called for every stage at the start of every tick, including ticks
    /// that end up paused. Stages that talk to the network deliver inbound
    /// traffic here. Default: always ready.
    fn poll(&mut self, simulation: &mut dyn Simulation) -> Result<Readiness, FilterError> {
        let _ = simulation;
        Ok(Readiness::Ready)
    }

    /// Advance one tick, flushing zero or more commands downstream.
    fn advance(&mut self, ctx: &mut FilterContext<'_>) -> Result<(), FilterError>;

    /// End-of-match hook (flush storage, say goodbye to peers).
    ///
    /// Default: no-op.
    fn finish(&mut self) -> Result<(), FilterError> {
        Ok(())
    }
}
