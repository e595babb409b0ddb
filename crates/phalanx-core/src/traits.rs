//! Collaborator traits at the pipeline boundary.
//!
//! The world model and the decision-making that produces commands live
//! outside this framework. The pipeline only needs to execute commands
//! against the former and ask the latter for new ones.

use crate::command::Command;
use crate::id::FactionId;

/// The deterministic simulation that commands mutate.
///
/// Implementations must be deterministic: executing the same commands in
/// the same order from the same state must yield the same state on every
/// peer.
pub trait Simulation {
    /// Apply one command to the world.
    fn execute(&mut self, command: &Command);

    /// Whether `faction` has been defeated.
    ///
    /// The synchronizer stops waiting on defeated factions.
    fn is_defeated(&self, faction: FactionId) -> bool;

    /// Mark `faction` as having surrendered or disconnected.
    fn give_up(&mut self, faction: FactionId);
}

/// A source of commands: a human player's input layer or an AI.
///
/// Commanders are updated once per simulation update and may append any
/// number of commands to `commands`. The pipeline routes them to the
/// commander's configured entry point.
pub trait Commander: Send {
    /// The faction this commander issues commands for.
    fn faction(&self) -> FactionId;

    /// Produce commands for the current update.
    fn update(&mut self, simulation: &dyn Simulation, dt: f32, commands: &mut Vec<Command>);
}
