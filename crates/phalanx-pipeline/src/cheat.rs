//! Gatekeeper for cheat codes.

use log::warn;
use phalanx_core::{Command, CommandPayload};

use crate::filter::{CommandFilter, FilterContext, FilterError};

/// Drops [`CommandPayload::Cheat`] commands unless cheats are enabled.
///
/// Every other command passes through unchanged and in order.
#[derive(Debug, Default)]
pub struct CheatFilter {
    enabled: bool,
    pending: Vec<Command>,
    dropped: u64,
}

impl CheatFilter {
    /// A filter that drops every cheat.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter that lets cheats through.
    pub fn allowing_cheats() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Whether cheats are forwarded.
    pub fn cheats_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of cheat commands dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl CommandFilter for CheatFilter {
    fn name(&self) -> &str {
        "cheat_filter"
    }

    fn handle(&mut self, command: Command) {
        self.pending.push(command);
    }

    fn advance(&mut self, ctx: &mut FilterContext<'_>) -> Result<(), FilterError> {
        for command in self.pending.drain(..) {
            if !self.enabled {
                if let CommandPayload::Cheat { code } = command.payload() {
                    warn!(
                        "dropping cheat {code:?} from faction {} (cheats disabled)",
                        command.faction()
                    );
                    self.dropped += 1;
                    continue;
                }
            }
            ctx.flush(command);
        }
        Ok(())
    }
}
