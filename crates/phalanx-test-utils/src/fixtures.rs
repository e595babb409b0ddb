//! Reusable command fixtures.
//!
//! Short constructors for the commands tests use most, plus a seeded
//! generator of random command batches.

use phalanx_core::{Command, CommandPayload, EntityId, FactionId, Point};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn entities(ids: &[u32]) -> impl Iterator<Item = EntityId> + '_ {
    ids.iter().copied().map(EntityId)
}

/// `Move` to `(x, y)` for the given units.
pub fn move_cmd(faction: u8, units: &[u32], x: i32, y: i32) -> Command {
    Command::new(
        FactionId(faction),
        entities(units),
        CommandPayload::Move {
            destination: Point::new(x, y),
        },
    )
}

/// `Attack` on `target` by the given units.
pub fn attack_cmd(faction: u8, units: &[u32], target: u32) -> Command {
    Command::new(
        FactionId(faction),
        entities(units),
        CommandPayload::Attack {
            target: EntityId(target),
        },
    )
}

/// `Stop` for the given units.
pub fn stop_cmd(faction: u8, units: &[u32]) -> Command {
    Command::new(FactionId(faction), entities(units), CommandPayload::Stop)
}

/// A chat message with no executing entities.
pub fn message_cmd(faction: u8, text: &str) -> Command {
    Command::new(
        FactionId(faction),
        [],
        CommandPayload::Message { text: text.into() },
    )
}

/// A cheat code with no executing entities.
pub fn cheat_cmd(faction: u8, code: &str) -> Command {
    Command::new(
        FactionId(faction),
        [],
        CommandPayload::Cheat { code: code.into() },
    )
}

/// Seeded generator of random, encodable commands for one faction.
pub struct RandomCommands {
    faction: FactionId,
    rng: ChaCha8Rng,
}

impl RandomCommands {
    pub fn new(faction: FactionId, seed: u64) -> Self {
        Self {
            faction,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// One random command addressing up to four of the first 16 units.
    pub fn next_command(&mut self) -> Command {
        let count = self.rng.gen_range(0..=4);
        let units: Vec<EntityId> = (0..count)
            .map(|_| EntityId(self.rng.gen_range(0..16)))
            .collect();
        let payload = match self.rng.gen_range(0..5) {
            0 => CommandPayload::Move {
                destination: Point::new(self.rng.gen_range(-64..64), self.rng.gen_range(-64..64)),
            },
            1 => CommandPayload::Attack {
                target: EntityId(self.rng.gen_range(100..200)),
            },
            2 => CommandPayload::Train {
                unit: self.rng.gen_range(0..8),
            },
            3 => CommandPayload::Harvest {
                node: EntityId(self.rng.gen_range(500..510)),
            },
            _ => CommandPayload::Stop,
        };
        Command::new(self.faction, units, payload)
    }

    /// A batch of zero to `max` random commands.
    pub fn batch(&mut self, max: usize) -> Vec<Command> {
        let len = self.rng.gen_range(0..=max);
        (0..len).map(|_| self.next_command()).collect()
    }
}
