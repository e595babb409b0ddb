//! Per-tick deduplication of orders addressed to the same entities.
//!
//! When a player clicks twice on the same unit within one tick only the
//! later order should survive: two orders to the same unit would both
//! execute and visibly conflict. The [`CommandOptimizer`] resolves this
//! by letting the most recently handled command claim its entities
//! first; older commands keep only the entities nobody has claimed yet.

use std::collections::HashSet;

use log::trace;
use phalanx_core::{Command, EntityId, EntitySet};

use crate::filter::{CommandFilter, FilterContext, FilterError};

/// A transforming filter that guarantees no entity receives two
/// commands in the same tick.
///
/// Commands are examined newest-first. A command whose entities are all
/// unclaimed is forwarded as-is; one with some claimed entities is
/// forwarded as a reduced copy addressed only to the unclaimed ones; one
/// whose entities are all claimed is dropped. Commands that address no
/// entities (chat, cheats) are always forwarded.
///
/// Surviving commands are flushed in their original handling order so
/// the faction's generation order is preserved downstream.
#[derive(Debug, Default)]
pub struct CommandOptimizer {
    pending: Vec<Command>,
    claimed: HashSet<EntityId>,
    dropped: u64,
}

impl CommandOptimizer {
    /// Create an optimizer with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands dropped entirely because every entity was already claimed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl CommandFilter for CommandOptimizer {
    fn name(&self) -> &str {
        "optimizer"
    }

    fn handle(&mut self, command: Command) {
        self.pending.push(command);
    }

    fn advance(&mut self, ctx: &mut FilterContext<'_>) -> Result<(), FilterError> {
        self.claimed.clear();
        let mut survivors = Vec::with_capacity(self.pending.len());

        while let Some(command) = self.pending.pop() {
            if command.entities().is_empty() {
                survivors.push(command);
                continue;
            }

            let mut unclaimed = EntitySet::new();
            for &entity in command.entities() {
                if self.claimed.insert(entity) {
                    unclaimed.push(entity);
                }
            }

            if unclaimed.is_empty() {
                trace!("optimizer dropped superseded {command}");
                self.dropped += 1;
            } else if unclaimed.len() == command.entities().len() {
                survivors.push(command);
            } else {
                survivors.push(command.with_entities(unclaimed));
            }
        }

        for command in survivors.into_iter().rev() {
            ctx.flush(command);
        }
        Ok(())
    }
}
