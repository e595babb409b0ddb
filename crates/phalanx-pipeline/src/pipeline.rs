//! The [`CommandPipeline`]: commanders, an ordered filter chain, and the
//! terminal executor, driven once per simulation tick.

use std::fmt;

use log::{debug, error, info};
use phalanx_core::{Command, Commander, Simulation, UpdateNumber};
use thiserror::Error;

use crate::executor::CommandExecutor;
use crate::filter::{CommandFilter, FilterContext, FilterError, Readiness};

// ── Identifiers ────────────────────────────────────────────────────

/// Position of a stage in the filter chain (0 = head).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub usize);

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a commander's (or a direct submission's) commands enter the
/// pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    /// The first stage, or the executor when the chain is empty.
    Head,
    /// A specific stage. Stages before it are bypassed.
    Stage(StageId),
    /// Straight to the executor, bypassing every stage.
    Executor,
}

/// Result of one [`CommandPipeline::update`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The tick ran: commanders were updated, every stage advanced, and
    /// the executor applied `executed` commands during `update`.
    Advanced {
        /// The update number that was executed.
        update: UpdateNumber,
        /// Commands applied to the simulation this tick.
        executed: usize,
    },
    /// A stage reported [`Readiness::Stalled`]. Nothing ran and the
    /// update number did not advance.
    Paused {
        /// The first stage that stalled.
        stage: StageId,
    },
}

// ── Errors ─────────────────────────────────────────────────────────

/// Errors from pipeline setup and per-tick execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The chain is fixed once the first update has run.
    #[error("pipeline is sealed: stages and commanders cannot change after the first update")]
    Sealed,
    /// An [`Entry::Stage`] names a stage that does not exist.
    #[error("entry stage {stage} does not exist (pipeline has {stages} stages)")]
    UnknownStage {
        /// The requested stage.
        stage: StageId,
        /// Number of stages in the chain.
        stages: usize,
    },
    /// A stage failed while polling, advancing, or finishing.
    #[error("stage {stage} '{name}' failed: {source}")]
    Filter {
        /// Position of the failing stage.
        stage: StageId,
        /// Name of the failing stage.
        name: String,
        /// The underlying failure.
        #[source]
        source: FilterError,
    },
}

impl PipelineError {
    fn filter(stage: StageId, filter: &dyn CommandFilter, source: FilterError) -> Self {
        Self::Filter {
            stage,
            name: filter.name().to_string(),
            source,
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

/// Owns the commanders, the ordered filter chain and the executor.
///
/// Each [`update`](Self::update):
///
/// 1. polls every stage; if any stalls, the tick is paused;
/// 2. updates every commander, routing its commands to its entry point;
/// 3. advances every stage head to tail, handing each stage's flushed
///    commands to the next stage before that stage advances;
/// 4. executes everything that reached the executor.
///
/// Steps 3 and 4 run in the same fixed order on every peer. The chain is
/// sealed by the first update.
///
/// # Examples
///
/// ```
/// use phalanx_core::{Command, CommandPayload, EntityId, FactionId, Simulation};
/// use phalanx_pipeline::{CommandOptimizer, CommandPipeline, Entry, UpdateOutcome};
///
/// #[derive(Default)]
/// struct Counter(usize);
///
/// impl Simulation for Counter {
///     fn execute(&mut self, _command: &Command) { self.0 += 1; }
///     fn is_defeated(&self, _faction: FactionId) -> bool { false }
///     fn give_up(&mut self, _faction: FactionId) {}
/// }
///
/// let mut pipeline = CommandPipeline::new();
/// pipeline.push_filter(Box::new(CommandOptimizer::new())).unwrap();
/// pipeline
///     .submit(Entry::Head, Command::new(FactionId(0), [EntityId(1)], CommandPayload::Stop))
///     .unwrap();
///
/// let mut sim = Counter::default();
/// let outcome = pipeline.update(&mut sim, 1.0 / 30.0).unwrap();
/// assert!(matches!(outcome, UpdateOutcome::Advanced { executed: 1, .. }));
/// assert_eq!(sim.0, 1);
/// ```
pub struct CommandPipeline {
    stages: Vec<Box<dyn CommandFilter>>,
    executor: CommandExecutor,
    commanders: Vec<(Box<dyn Commander>, Entry)>,
    update: UpdateNumber,
    sealed: bool,
    paused_on: Option<StageId>,
    produced: Vec<Command>,
    flushed: Vec<Command>,
}

impl Default for CommandPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandPipeline {
    /// Create an empty pipeline: no stages, no commanders.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            executor: CommandExecutor::new(),
            commanders: Vec::new(),
            update: UpdateNumber(0),
            sealed: false,
            paused_on: None,
            produced: Vec::new(),
            flushed: Vec::new(),
        }
    }

    /// Append a stage to the tail of the chain (just before the executor).
    pub fn push_filter(&mut self, filter: Box<dyn CommandFilter>) -> Result<StageId, PipelineError> {
        if self.sealed {
            return Err(PipelineError::Sealed);
        }
        let id = StageId(self.stages.len());
        debug!("pipeline stage {id}: '{}'", filter.name());
        self.stages.push(filter);
        Ok(id)
    }

    /// Register a commander whose commands enter at `entry`.
    pub fn add_commander(
        &mut self,
        commander: Box<dyn Commander>,
        entry: Entry,
    ) -> Result<(), PipelineError> {
        if self.sealed {
            return Err(PipelineError::Sealed);
        }
        self.check_entry(entry)?;
        self.commanders.push((commander, entry));
        Ok(())
    }

    /// Inject a command without a commander (e.g. direct UI input).
    ///
    /// Allowed at any time; the command is handled immediately and takes
    /// part in the next executed tick.
    pub fn submit(&mut self, entry: Entry, command: Command) -> Result<(), PipelineError> {
        self.check_entry(entry)?;
        deliver(&mut self.stages, &mut self.executor, entry, command);
        Ok(())
    }

    /// Run one tick. See the type-level docs for the exact order.
    pub fn update(
        &mut self,
        simulation: &mut dyn Simulation,
        dt: f32,
    ) -> Result<UpdateOutcome, PipelineError> {
        self.sealed = true;

        let mut stalled = None;
        for (index, stage) in self.stages.iter_mut().enumerate() {
            let id = StageId(index);
            match stage.poll(simulation) {
                Ok(Readiness::Ready) => {}
                Ok(Readiness::Stalled) => {
                    stalled.get_or_insert(id);
                }
                Err(source) => return Err(PipelineError::filter(id, &**stage, source)),
            }
        }

        if let Some(stage) = stalled {
            if self.paused_on.is_none() {
                info!(
                    "pipeline paused before update {} by stage {stage} '{}'",
                    self.update,
                    self.stages[stage.0].name()
                );
            }
            self.paused_on = Some(stage);
            return Ok(UpdateOutcome::Paused { stage });
        }
        if let Some(stage) = self.paused_on.take() {
            info!(
                "pipeline resumed at update {} (was held by stage {stage})",
                self.update
            );
        }

        for (commander, entry) in &mut self.commanders {
            commander.update(&*simulation, dt, &mut self.produced);
            for command in self.produced.drain(..) {
                deliver(&mut self.stages, &mut self.executor, *entry, command);
            }
        }

        for index in 0..self.stages.len() {
            let mut ctx = FilterContext::new(self.update, dt, &mut *simulation, &mut self.flushed);
            if let Err(source) = self.stages[index].advance(&mut ctx) {
                return Err(PipelineError::filter(
                    StageId(index),
                    &*self.stages[index],
                    source,
                ));
            }
            let next = self.stages.get_mut(index + 1);
            match next {
                Some(stage) => self.flushed.drain(..).for_each(|c| stage.handle(c)),
                None => self.flushed.drain(..).for_each(|c| self.executor.handle(c)),
            }
        }

        let executed = self.executor.execute_pending(simulation);
        let update = self.update;
        self.update = update.next();
        Ok(UpdateOutcome::Advanced { update, executed })
    }

    /// Call [`finish`](CommandFilter::finish) on every stage, head to tail.
    ///
    /// Every stage is finished even if an earlier one fails; the first
    /// failure is returned.
    pub fn shutdown(&mut self) -> Result<(), PipelineError> {
        let mut first_error = None;
        for (index, stage) in self.stages.iter_mut().enumerate() {
            if let Err(source) = stage.finish() {
                let err = PipelineError::filter(StageId(index), &**stage, source);
                error!("{err}");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The update number the next executed tick will carry.
    pub fn current_update(&self) -> UpdateNumber {
        self.update
    }

    /// Whether the most recent tick was paused.
    pub fn is_paused(&self) -> bool {
        self.paused_on.is_some()
    }

    /// Whether the chain has been sealed by a first update.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of stages in the chain (the executor excluded).
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage names, head to tail.
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name())
    }

    /// The terminal executor.
    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    fn check_entry(&self, entry: Entry) -> Result<(), PipelineError> {
        match entry {
            Entry::Stage(stage) if stage.0 >= self.stages.len() => Err(PipelineError::UnknownStage {
                stage,
                stages: self.stages.len(),
            }),
            _ => Ok(()),
        }
    }
}

fn deliver(
    stages: &mut [Box<dyn CommandFilter>],
    executor: &mut CommandExecutor,
    entry: Entry,
    command: Command,
) {
    let stage = match entry {
        Entry::Head => stages.first_mut(),
        Entry::Stage(id) => stages.get_mut(id.0),
        Entry::Executor => None,
    };
    match stage {
        Some(stage) => stage.handle(command),
        None => executor.handle(command),
    }
}
