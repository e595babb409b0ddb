//! Per-remote-faction protocol state.
//!
//! A [`FactionEndpoint`] is this peer's adapter for one remote faction.
//! It remembers the remote's address, stores the command batches and
//! `Done` notices received from it keyed by frame number (in whatever
//! order they arrive), and encodes outbound messages to it.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use log::trace;
use phalanx_core::{Command, CommandFrame, FactionId};

use crate::error::SyncError;
use crate::transport::Transport;
use crate::wire::{Message, WireError};

/// What an accepted datagram meant for this endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A command batch was stored (or was a duplicate of a stored one).
    Commands(CommandFrame),
    /// A `Done` notice was stored.
    Done(CommandFrame),
    /// The remote announced it is leaving.
    Quit,
}

/// Protocol state for one remote faction.
#[derive(Debug)]
pub struct FactionEndpoint {
    faction: FactionId,
    addr: SocketAddr,
    commands: BTreeMap<CommandFrame, Vec<Command>>,
    done: BTreeMap<CommandFrame, u32>,
    has_left: bool,
}

impl FactionEndpoint {
    /// Create an endpoint for `faction` reachable at `addr`.
    pub fn new(faction: FactionId, addr: SocketAddr) -> Self {
        Self {
            faction,
            addr,
            commands: BTreeMap::new(),
            done: BTreeMap::new(),
            has_left: false,
        }
    }

    /// The remote faction.
    pub fn faction(&self) -> FactionId {
        self.faction
    }

    /// The remote address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether the remote sent `Quit`.
    pub fn has_left(&self) -> bool {
        self.has_left
    }

    /// Whether the remote's batch for `frame` has arrived.
    pub fn has_commands_for_frame(&self, frame: CommandFrame) -> bool {
        self.commands.contains_key(&frame)
    }

    /// The remote's batch for `frame`.
    ///
    /// # Panics
    ///
    /// Panics if the batch has not arrived; check
    /// [`has_commands_for_frame`](Self::has_commands_for_frame) first.
    pub fn commands_for_frame(&self, frame: CommandFrame) -> &[Command] {
        match self.commands.get(&frame) {
            Some(batch) => batch,
            None => panic!(
                "commands for frame {frame} requested from faction {} before they arrived",
                self.faction
            ),
        }
    }

    /// Whether the remote reported `Done` for `frame`.
    pub fn is_done_for_frame(&self, frame: CommandFrame) -> bool {
        self.done.contains_key(&frame)
    }

    /// How many updates the remote took to complete `frame`, if reported.
    pub fn updates_taken_for_frame(&self, frame: CommandFrame) -> Option<u32> {
        self.done.get(&frame).copied()
    }

    /// Send this peer's batch for `frame` to the remote.
    pub fn send_commands(
        &self,
        transport: &mut dyn Transport,
        frame: CommandFrame,
        commands: &[Command],
    ) -> Result<(), SyncError> {
        let datagram = Message::Commands {
            frame,
            commands: commands.to_vec(),
        }
        .encode()?;
        trace!(
            "send {} commands for frame {frame} to faction {} ({} bytes)",
            commands.len(),
            self.faction,
            datagram.len()
        );
        transport.send(self.addr, &datagram)?;
        Ok(())
    }

    /// Tell the remote this peer has every batch for `frame`.
    pub fn send_done(
        &self,
        transport: &mut dyn Transport,
        frame: CommandFrame,
        update_count: u32,
    ) -> Result<(), SyncError> {
        let datagram = Message::Done {
            frame,
            update_count,
        }
        .encode()?;
        transport.send(self.addr, &datagram)?;
        Ok(())
    }

    /// Tell the remote this peer is leaving.
    pub fn send_leave(&self, transport: &mut dyn Transport) -> Result<(), SyncError> {
        transport.send(self.addr, &Message::Quit.encode()?)?;
        Ok(())
    }

    /// Decode and store one datagram from the remote.
    ///
    /// The datagram is accepted or rejected as a whole. A batch that
    /// carries any command issued by another faction is rejected. Batches
    /// and `Done` notices are idempotent: a duplicate for a frame already
    /// stored keeps the first copy.
    pub fn receive_datagram(&mut self, datagram: &[u8]) -> Result<Inbound, WireError> {
        match Message::decode(datagram)? {
            Message::Commands { frame, commands } => {
                if let Some(foreign) = commands.iter().find(|c| c.faction() != self.faction) {
                    return Err(WireError::ForeignFaction {
                        expected: self.faction,
                        found: foreign.faction(),
                    });
                }
                self.commands.entry(frame).or_insert(commands);
                Ok(Inbound::Commands(frame))
            }
            Message::Done {
                frame,
                update_count,
            } => {
                self.done.entry(frame).or_insert(update_count);
                Ok(Inbound::Done(frame))
            }
            Message::Quit => {
                self.has_left = true;
                Ok(Inbound::Quit)
            }
        }
    }

    /// Drop everything stored for frames up to and including `frame`.
    pub fn discard_through(&mut self, frame: CommandFrame) {
        self.commands.retain(|&f, _| f > frame);
        self.done.retain(|&f, _| f > frame);
    }

    /// Drop everything stored for a single frame.
    pub fn discard_frame(&mut self, frame: CommandFrame) {
        self.commands.remove(&frame);
        self.done.remove(&frame);
    }

    /// Number of frames with stored batches or `Done` notices.
    pub fn stored_frames(&self) -> usize {
        let mut frames: Vec<CommandFrame> = self.commands.keys().copied().collect();
        frames.extend(self.done.keys().copied());
        frames.sort_unstable();
        frames.dedup();
        frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phalanx_test_utils::{move_cmd, stop_cmd};

    fn endpoint() -> FactionEndpoint {
        FactionEndpoint::new(FactionId(2), SocketAddr::from(([10, 0, 0, 2], 4000)))
    }

    fn batch(frame: u32, commands: Vec<Command>) -> Vec<u8> {
        Message::Commands {
            frame: CommandFrame(frame),
            commands,
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn stores_batches_out_of_order() {
        let mut ep = endpoint();
        ep.receive_datagram(&batch(5, vec![stop_cmd(2, &[1])])).unwrap();
        ep.receive_datagram(&batch(4, vec![])).unwrap();

        assert!(ep.has_commands_for_frame(CommandFrame(4)));
        assert!(ep.has_commands_for_frame(CommandFrame(5)));
        assert!(!ep.has_commands_for_frame(CommandFrame(3)));
        assert_eq!(ep.commands_for_frame(CommandFrame(5)), &[stop_cmd(2, &[1])]);
        assert!(ep.commands_for_frame(CommandFrame(4)).is_empty());
    }

    #[test]
    fn duplicate_batch_keeps_first_copy() {
        let mut ep = endpoint();
        ep.receive_datagram(&batch(1, vec![stop_cmd(2, &[1])])).unwrap();
        ep.receive_datagram(&batch(1, vec![])).unwrap();
        assert_eq!(ep.commands_for_frame(CommandFrame(1)).len(), 1);
    }

    #[test]
    fn done_records_update_count() {
        let mut ep = endpoint();
        let done = Message::Done {
            frame: CommandFrame(3),
            update_count: 9,
        }
        .encode()
        .unwrap();
        assert_eq!(
            ep.receive_datagram(&done).unwrap(),
            Inbound::Done(CommandFrame(3))
        );
        assert!(ep.is_done_for_frame(CommandFrame(3)));
        assert_eq!(ep.updates_taken_for_frame(CommandFrame(3)), Some(9));
        assert_eq!(ep.updates_taken_for_frame(CommandFrame(4)), None);
    }

    #[test]
    fn foreign_faction_rejects_whole_batch() {
        let mut ep = endpoint();
        let bytes = batch(0, vec![move_cmd(2, &[1], 0, 0), move_cmd(3, &[9], 0, 0)]);
        assert!(matches!(
            ep.receive_datagram(&bytes),
            Err(WireError::ForeignFaction {
                expected: FactionId(2),
                found: FactionId(3)
            })
        ));
        assert!(!ep.has_commands_for_frame(CommandFrame(0)));
    }

    #[test]
    fn quit_marks_left() {
        let mut ep = endpoint();
        assert_eq!(
            ep.receive_datagram(&Message::Quit.encode().unwrap()).unwrap(),
            Inbound::Quit
        );
        assert!(ep.has_left());
    }

    #[test]
    fn discard_through_bounds_storage() {
        let mut ep = endpoint();
        for frame in 0..10 {
            ep.receive_datagram(&batch(frame, vec![])).unwrap();
        }
        ep.discard_through(CommandFrame(6));
        assert_eq!(ep.stored_frames(), 3);
        assert!(!ep.has_commands_for_frame(CommandFrame(6)));
        assert!(ep.has_commands_for_frame(CommandFrame(7)));
    }

    #[test]
    #[should_panic(expected = "before they arrived")]
    fn missing_frame_fails_fast() {
        endpoint().commands_for_frame(CommandFrame(0));
    }
}
