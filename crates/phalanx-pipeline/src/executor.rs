//! The terminal stage that applies commands to the simulation.

use std::collections::VecDeque;

use log::trace;
use phalanx_core::{Command, Simulation};

use crate::filter::{CommandFilter, FilterContext, FilterError};

/// Applies queued commands to the simulation in arrival order.
///
/// Every pipeline ends in one executor. It can also be used on its own
/// as a [`CommandFilter`], in which case it flushes nothing.
#[derive(Debug, Default)]
pub struct CommandExecutor {
    queue: VecDeque<Command>,
    executed_total: u64,
}

impl CommandExecutor {
    /// Create an executor with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total number of commands executed since creation.
    pub fn executed_total(&self) -> u64 {
        self.executed_total
    }

    /// Execute every queued command, in order. Returns how many ran.
    pub fn execute_pending(&mut self, simulation: &mut dyn Simulation) -> usize {
        let count = self.queue.len();
        while let Some(command) = self.queue.pop_front() {
            trace!("executing {command}");
            simulation.execute(&command);
        }
        self.executed_total += count as u64;
        count
    }
}

impl CommandFilter for CommandExecutor {
    fn name(&self) -> &str {
        "executor"
    }

    fn handle(&mut self, command: Command) {
        self.queue.push_back(command);
    }

    fn advance(&mut self, ctx: &mut FilterContext<'_>) -> Result<(), FilterError> {
        self.execute_pending(ctx.simulation());
        Ok(())
    }
}
