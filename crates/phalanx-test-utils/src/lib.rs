//! Test utilities and mock types for Phalanx development.
//!
//! Provides a mock [`Simulation`] that records every executed command, a
//! [`ScriptedCommander`] that emits pre-planned commands at chosen
//! updates, command fixtures, and seeded random command generation for
//! determinism tests.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use phalanx_core::{Command, Commander, FactionId, Simulation};

pub use fixtures::*;

/// Initialise `env_logger` for a test binary.
///
/// Safe to call from every test; only the first call installs the logger.
/// Honors `RUST_LOG` as usual.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Mock implementation of [`Simulation`].
///
/// Records executed commands in order so tests can compare execution
/// streams across peers. Factions can be defeated up front with
/// [`defeat`](MockSimulation::defeat); [`give_up`](Simulation::give_up)
/// also marks the faction defeated.
#[derive(Default)]
pub struct MockSimulation {
    executed: Vec<Command>,
    defeated: BTreeSet<FactionId>,
    given_up: Vec<FactionId>,
}

impl MockSimulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command executed so far, in execution order.
    pub fn executed(&self) -> &[Command] {
        &self.executed
    }

    /// Take the executed commands, leaving the log empty.
    pub fn take_executed(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.executed)
    }

    /// Mark a faction as defeated.
    pub fn defeat(&mut self, faction: FactionId) {
        self.defeated.insert(faction);
    }

    /// Factions passed to `give_up`, in call order.
    pub fn given_up(&self) -> &[FactionId] {
        &self.given_up
    }
}

impl Simulation for MockSimulation {
    fn execute(&mut self, command: &Command) {
        self.executed.push(command.clone());
    }

    fn is_defeated(&self, faction: FactionId) -> bool {
        self.defeated.contains(&faction)
    }

    fn give_up(&mut self, faction: FactionId) {
        self.given_up.push(faction);
        self.defeated.insert(faction);
    }
}

/// A [`Commander`] that replays a fixed script.
///
/// Commands scheduled with [`at`](ScriptedCommander::at) are emitted on
/// the given update call (zero-based count of `update` invocations).
pub struct ScriptedCommander {
    faction: FactionId,
    script: BTreeMap<u32, Vec<Command>>,
    calls: u32,
}

impl ScriptedCommander {
    pub fn new(faction: FactionId) -> Self {
        Self {
            faction,
            script: BTreeMap::new(),
            calls: 0,
        }
    }

    /// Schedule `command` for the `call`-th update.
    pub fn at(mut self, call: u32, command: Command) -> Self {
        self.script.entry(call).or_default().push(command);
        self
    }

    /// Number of times `update` has been called.
    pub fn calls(&self) -> u32 {
        self.calls
    }
}

impl Commander for ScriptedCommander {
    fn faction(&self) -> FactionId {
        self.faction
    }

    fn update(&mut self, _simulation: &dyn Simulation, _dt: f32, commands: &mut Vec<Command>) {
        if let Some(batch) = self.script.remove(&self.calls) {
            commands.extend(batch);
        }
        self.calls += 1;
    }
}
/// A cloneable in-memory `Write` sink.
///
/// Hand one clone to a stage that owns its writer (such as a replay
/// recorder boxed inside a pipeline) and read the bytes back through
/// another.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phalanx_core::EntityId;

    #[test]
    fn scripted_commander_emits_on_schedule() {
        let sim = MockSimulation::new();
        let mut commander = ScriptedCommander::new(FactionId(1))
            .at(0, stop_cmd(1, &[3]))
            .at(2, move_cmd(1, &[4], 1, 1));

        let mut out = Vec::new();
        commander.update(&sim, 0.1, &mut out);
        assert_eq!(out.len(), 1);
        commander.update(&sim, 0.1, &mut out);
        assert_eq!(out.len(), 1);
        commander.update(&sim, 0.1, &mut out);
        assert_eq!(out.len(), 2);
        assert!(out[1].addresses(EntityId(4)));
        assert_eq!(commander.calls(), 3);
    }

    #[test]
    fn give_up_marks_defeated() {
        let mut sim = MockSimulation::new();
        sim.give_up(FactionId(2));
        assert!(sim.is_defeated(FactionId(2)));
        assert!(!sim.is_defeated(FactionId(1)));
        assert_eq!(sim.given_up(), &[FactionId(2)]);
    }

    #[test]
    fn shared_buffer_clones_see_writes() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        writer.write_all(b"phalanx").unwrap();
        assert_eq!(buffer.contents(), b"phalanx");
    }
}
