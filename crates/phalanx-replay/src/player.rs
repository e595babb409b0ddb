//! Source stage that plays a replay back into a pipeline.

use std::io::Read;

use log::{debug, info};
use phalanx_core::Command;
use phalanx_pipeline::{CommandFilter, FilterContext, FilterError};

use crate::error::ReplayError;
use crate::reader::ReplayReader;
use crate::types::{ReplayEvent, ReplayHeader};

/// Re-emits recorded commands on the update they were recorded at.
///
/// The player keeps one event read ahead. On every advance it first
/// flushes commands handed to it live (chat typed while watching, for
/// example), then every recorded event stamped at or before the current
/// update. Recorded stamps never decrease, so stopping at the first
/// later stamp is exact.
///
/// # Examples
///
/// ```
/// use phalanx_core::{Command, CommandPayload, FactionId, UpdateNumber};
/// use phalanx_pipeline::{CommandPipeline, Entry, UpdateOutcome};
/// use phalanx_replay::{ReplayHeader, ReplayPlayer, ReplayReader, ReplayWriter};
/// # use phalanx_core::Simulation;
/// # struct Log(Vec<Command>);
/// # impl Simulation for Log {
/// #     fn execute(&mut self, c: &Command) { self.0.push(c.clone()); }
/// #     fn is_defeated(&self, _: FactionId) -> bool { false }
/// #     fn give_up(&mut self, _: FactionId) {}
/// # }
///
/// let stop = Command::new(FactionId(0), [], CommandPayload::Stop);
/// let mut log = Vec::new();
/// let mut writer = ReplayWriter::new(&mut log, &ReplayHeader::new(0, ["solo"])).unwrap();
/// writer.record(UpdateNumber(1), &stop).unwrap();
/// drop(writer);
///
/// let player = ReplayPlayer::new(ReplayReader::open(std::io::Cursor::new(log)).unwrap()).unwrap();
/// let mut pipeline = CommandPipeline::new();
/// pipeline.push_filter(Box::new(player)).unwrap();
///
/// let mut sim = Log(Vec::new());
/// pipeline.update(&mut sim, 0.1).unwrap();
/// assert!(sim.0.is_empty());
/// pipeline.update(&mut sim, 0.1).unwrap();
/// assert_eq!(sim.0, vec![stop]);
/// ```
pub struct ReplayPlayer<R: Read + Send> {
    reader: ReplayReader<R>,
    next: Option<ReplayEvent>,
    live: Vec<Command>,
    played: u64,
}

impl<R: Read + Send> ReplayPlayer<R> {
    /// Start playing `reader`, reading the first event ahead.
    pub fn new(mut reader: ReplayReader<R>) -> Result<Self, ReplayError> {
        let next = reader.next_event()?;
        info!(
            "replay player: seed {}, factions {:?}",
            reader.header().seed,
            reader.header().factions
        );
        Ok(Self {
            reader,
            next,
            live: Vec::new(),
            played: 0,
        })
    }

    /// The replay header.
    pub fn header(&self) -> &ReplayHeader {
        self.reader.header()
    }

    /// Whether every recorded event has been played.
    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    /// Recorded events played so far.
    pub fn played(&self) -> u64 {
        self.played
    }
}

impl<R: Read + Send> CommandFilter for ReplayPlayer<R> {
    fn name(&self) -> &str {
        "replay_player"
    }

    fn handle(&mut self, command: Command) {
        self.live.push(command);
    }

    fn advance(&mut self, ctx: &mut FilterContext<'_>) -> Result<(), FilterError> {
        for command in self.live.drain(..) {
            ctx.flush(command);
        }

        let now = ctx.update();
        while self.next.as_ref().is_some_and(|event| event.update <= now) {
            let Some(event) = self.next.take() else {
                break;
            };
            ctx.flush(event.command);
            self.played += 1;
            self.next = self.reader.next_event()?;
            if self.next.is_none() {
                debug!("replay finished at update {now} after {} events", self.played);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ReplayWriter;
    use phalanx_core::UpdateNumber;
    use phalanx_test_utils::{message_cmd, move_cmd, stop_cmd, MockSimulation};

    fn player(events: &[(u32, Command)]) -> ReplayPlayer<std::io::Cursor<Vec<u8>>> {
        let mut buf = Vec::new();
        let mut writer = ReplayWriter::new(&mut buf, &ReplayHeader::new(5, ["a", "b"])).unwrap();
        for (update, command) in events {
            writer.record(UpdateNumber(*update), command).unwrap();
        }
        drop(writer);
        ReplayPlayer::new(ReplayReader::open(std::io::Cursor::new(buf)).unwrap()).unwrap()
    }

    fn advance(stage: &mut dyn CommandFilter, update: u32) -> Vec<Command> {
        let mut sim = MockSimulation::new();
        let mut out = Vec::new();
        let mut ctx = FilterContext::new(UpdateNumber(update), 0.1, &mut sim, &mut out);
        stage.advance(&mut ctx).unwrap();
        out
    }

    #[test]
    fn releases_events_on_their_update() {
        let mut stage = player(&[
            (1, move_cmd(0, &[1], 0, 0)),
            (1, stop_cmd(1, &[2])),
            (3, stop_cmd(0, &[1])),
        ]);
        assert_eq!(stage.header().seed, 5);
        assert_eq!(advance(&mut stage, 0), vec![]);
        assert_eq!(
            advance(&mut stage, 1),
            vec![move_cmd(0, &[1], 0, 0), stop_cmd(1, &[2])]
        );
        assert_eq!(advance(&mut stage, 2), vec![]);
        assert!(!stage.is_finished());
        assert_eq!(advance(&mut stage, 3), vec![stop_cmd(0, &[1])]);
        assert!(stage.is_finished());
        assert_eq!(stage.played(), 3);
    }

    #[test]
    fn late_start_catches_up() {
        let mut stage = player(&[(1, stop_cmd(0, &[1])), (2, stop_cmd(0, &[2]))]);
        assert_eq!(
            advance(&mut stage, 9),
            vec![stop_cmd(0, &[1]), stop_cmd(0, &[2])]
        );
    }

    #[test]
    fn live_commands_come_first() {
        let mut stage = player(&[(0, stop_cmd(0, &[1]))]);
        stage.handle(message_cmd(1, "watching"));
        assert_eq!(
            advance(&mut stage, 0),
            vec![message_cmd(1, "watching"), stop_cmd(0, &[1])]
        );
    }

    #[test]
    fn empty_replay_is_finished_immediately() {
        let stage = player(&[]);
        assert!(stage.is_finished());
    }

    #[test]
    fn corrupt_tail_surfaces_as_filter_error() {
        let mut buf = Vec::new();
        let mut writer = ReplayWriter::new(&mut buf, &ReplayHeader::new(0, ["a"])).unwrap();
        writer.record(UpdateNumber(0), &stop_cmd(0, &[1])).unwrap();
        drop(writer);
        buf.extend_from_slice(&[1, 0]);

        let mut stage =
            ReplayPlayer::new(ReplayReader::open(std::io::Cursor::new(buf)).unwrap()).unwrap();
        let mut sim = MockSimulation::new();
        let mut out = Vec::new();
        let mut ctx = FilterContext::new(UpdateNumber(0), 0.1, &mut sim, &mut out);
        assert!(stage.advance(&mut ctx).is_err());
        assert_eq!(out, vec![stop_cmd(0, &[1])]);
    }
}
