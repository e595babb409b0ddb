//! Strongly-typed identifiers shared across the pipeline.

use std::fmt;

/// Identifies a player faction (one per peer in a networked match).
///
/// Faction IDs also define the deterministic execution order of a closed
/// command frame: lower IDs execute first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactionId(pub u8);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for FactionId {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

/// Identifies a simulated entity (unit, building, resource node).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// A synchronization epoch.
///
/// Every peer agrees on the exact batch of commands that belongs to frame
/// `N`. Frame numbers start at zero and increase by one per cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandFrame(pub u32);

impl CommandFrame {
    /// The frame that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CommandFrame {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Counts simulation updates (ticks that actually stepped the world).
///
/// Paused ticks do not advance the update number, so two peers that
/// executed the same command stream agree on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateNumber(pub u32);

impl UpdateNumber {
    /// The update that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for UpdateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for UpdateNumber {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
