//! Data types for replay recording and playback.

use std::fmt;

use phalanx_core::{Command, UpdateNumber};

/// Match parameters stored at the head of a replay.
///
/// # Examples
///
/// ```
/// use phalanx_replay::ReplayHeader;
///
/// let header = ReplayHeader::new(42, ["red", "blue"]);
/// assert_eq!(header.seed, 42);
/// assert_eq!(header.factions, vec!["red".to_string(), "blue".to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayHeader {
    /// Seed of the simulation's random number generator.
    pub seed: u64,
    /// Faction names, indexed by faction id.
    pub factions: Vec<String>,
}

impl ReplayHeader {
    /// Build a header from a seed and the faction roster.
    pub fn new(seed: u64, factions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            seed,
            factions: factions.into_iter().map(Into::into).collect(),
        }
    }
}

/// One recorded command and the update it executed on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayEvent {
    /// Update number the command was recorded at.
    pub update: UpdateNumber,
    /// The command.
    pub command: Command,
}

impl fmt::Display for ReplayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}  {}", self.update, self.command)
    }
}
