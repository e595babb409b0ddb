//! The [`Command`] value type and its payload vocabulary.

use std::fmt;

use smallvec::SmallVec;

use crate::id::{EntityId, FactionId};

/// The set of entities a command addresses.
///
/// Uses `SmallVec<[EntityId; 4]>` so the common case (a handful of
/// selected units) never touches the heap.
pub type EntitySet = SmallVec<[EntityId; 4]>;

/// An integer map position.
///
/// Integer coordinates keep serialized commands bit-exact across
/// machines with different floating-point behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// Create a point from its coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A unit of player or AI intent.
///
/// Commands are immutable once created: a commander builds one, filters
/// move it along the pipeline, and the executor consumes it exactly once.
/// Transforming filters that need a narrower entity set build a new
/// command with [`with_entities`](Command::with_entities).
///
/// # Examples
///
/// ```
/// use phalanx_core::{Command, CommandPayload, EntityId, FactionId, Point};
///
/// let cmd = Command::new(
///     FactionId(1),
///     [EntityId(4), EntityId(9)],
///     CommandPayload::Move { destination: Point::new(10, 12) },
/// );
///
/// assert_eq!(cmd.faction(), FactionId(1));
/// assert_eq!(cmd.entities().len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    faction: FactionId,
    entities: EntitySet,
    payload: CommandPayload,
}

impl Command {
    /// Create a command issued by `faction` for the given entities.
    pub fn new(
        faction: FactionId,
        entities: impl IntoIterator<Item = EntityId>,
        payload: CommandPayload,
    ) -> Self {
        Self {
            faction,
            entities: entities.into_iter().collect(),
            payload,
        }
    }

    /// The faction that issued this command.
    pub fn faction(&self) -> FactionId {
        self.faction
    }

    /// The entities that execute this command.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// The operation to perform.
    pub fn payload(&self) -> &CommandPayload {
        &self.payload
    }

    /// Whether the command names `entity` among its executors.
    pub fn addresses(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    /// A copy of this command restricted to a different entity set.
    ///
    /// Faction and payload are preserved.
    pub fn with_entities(&self, entities: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            faction: self.faction,
            entities: entities.into_iter().collect(),
            payload: self.payload.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction {} [", self.faction)?;
        for (i, entity) in self.entities.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{entity}")?;
        }
        write!(f, "] {}", self.payload)
    }
}

/// All command payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandPayload {
    /// Walk to a destination.
    Move {
        /// Where to go.
        destination: Point,
    },
    /// Walk to a destination, engaging anything met on the way.
    ZoneAttack {
        /// Where to go.
        destination: Point,
    },
    /// Attack a specific entity.
    Attack {
        /// The entity to attack.
        target: EntityId,
    },
    /// Construct a building with the executing units.
    Build {
        /// Building type identifier.
        building: u32,
        /// Placement position.
        location: Point,
    },
    /// Queue a unit in the executing buildings.
    Train {
        /// Unit type identifier.
        unit: u32,
    },
    /// Gather from a resource node.
    Harvest {
        /// The resource node.
        node: EntityId,
    },
    /// Repair a damaged entity.
    Repair {
        /// The entity to repair.
        target: EntityId,
    },
    /// Start researching a technology.
    Research {
        /// Technology identifier.
        technology: u32,
    },
    /// Abandon the current task.
    Stop,
    /// Cancel the last queued production or construction.
    Cancel,
    /// A chat line broadcast to every player.
    Message {
        /// The chat text.
        text: String,
    },
    /// A cheat code, honoured only when cheats are enabled.
    Cheat {
        /// The cheat code.
        code: String,
    },
    /// Extension point for game-specific commands.
    Custom {
        /// User-registered type identifier.
        type_id: u32,
        /// Opaque payload data.
        data: Vec<u8>,
    },
}

impl fmt::Display for CommandPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move { destination } => write!(f, "Move to {destination}"),
            Self::ZoneAttack { destination } => write!(f, "ZoneAttack to {destination}"),
            Self::Attack { target } => write!(f, "Attack {target}"),
            Self::Build { building, location } => {
                write!(f, "Build {building} at {location}")
            }
            Self::Train { unit } => write!(f, "Train {unit}"),
            Self::Harvest { node } => write!(f, "Harvest {node}"),
            Self::Repair { target } => write!(f, "Repair {target}"),
            Self::Research { technology } => write!(f, "Research {technology}"),
            Self::Stop => write!(f, "Stop"),
            Self::Cancel => write!(f, "Cancel"),
            Self::Message { text } => write!(f, "Message {text:?}"),
            Self::Cheat { code } => write!(f, "Cheat {code:?}"),
            Self::Custom { type_id, data } => {
                write!(f, "Custom {type_id} ({} bytes)", data.len())
            }
        }
    }
}

// ── Payload type tag constants ──────────────────────────────────

/// Payload type tag for [`CommandPayload::Move`].
pub const PAYLOAD_MOVE: u8 = 0;
/// Payload type tag for [`CommandPayload::ZoneAttack`].
pub const PAYLOAD_ZONE_ATTACK: u8 = 1;
/// Payload type tag for [`CommandPayload::Attack`].
pub const PAYLOAD_ATTACK: u8 = 2;
/// Payload type tag for [`CommandPayload::Build`].
pub const PAYLOAD_BUILD: u8 = 3;
/// Payload type tag for [`CommandPayload::Train`].
pub const PAYLOAD_TRAIN: u8 = 4;
/// Payload type tag for [`CommandPayload::Harvest`].
pub const PAYLOAD_HARVEST: u8 = 5;
/// Payload type tag for [`CommandPayload::Repair`].
pub const PAYLOAD_REPAIR: u8 = 6;
/// Payload type tag for [`CommandPayload::Research`].
pub const PAYLOAD_RESEARCH: u8 = 7;
/// Payload type tag for [`CommandPayload::Stop`].
pub const PAYLOAD_STOP: u8 = 8;
/// Payload type tag for [`CommandPayload::Cancel`].
pub const PAYLOAD_CANCEL: u8 = 9;
/// Payload type tag for [`CommandPayload::Message`].
pub const PAYLOAD_MESSAGE: u8 = 10;
/// Payload type tag for [`CommandPayload::Cheat`].
pub const PAYLOAD_CHEAT: u8 = 11;
/// Payload type tag for [`CommandPayload::Custom`].
pub const PAYLOAD_CUSTOM: u8 = 12;

impl CommandPayload {
    /// The stable one-byte tag identifying this variant on the wire.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Move { .. } => PAYLOAD_MOVE,
            Self::ZoneAttack { .. } => PAYLOAD_ZONE_ATTACK,
            Self::Attack { .. } => PAYLOAD_ATTACK,
            Self::Build { .. } => PAYLOAD_BUILD,
            Self::Train { .. } => PAYLOAD_TRAIN,
            Self::Harvest { .. } => PAYLOAD_HARVEST,
            Self::Repair { .. } => PAYLOAD_REPAIR,
            Self::Research { .. } => PAYLOAD_RESEARCH,
            Self::Stop => PAYLOAD_STOP,
            Self::Cancel => PAYLOAD_CANCEL,
            Self::Message { .. } => PAYLOAD_MESSAGE,
            Self::Cheat { .. } => PAYLOAD_CHEAT,
            Self::Custom { .. } => PAYLOAD_CUSTOM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn move_cmd() -> Command {
        Command::new(
            FactionId(2),
            [EntityId(1), EntityId(2), EntityId(3)],
            CommandPayload::Move {
                destination: Point::new(5, -3),
            },
        )
    }

    #[test]
    fn with_entities_keeps_faction_and_payload() {
        let cmd = move_cmd();
        let reduced = cmd.with_entities([EntityId(2)]);
        assert_eq!(reduced.faction(), cmd.faction());
        assert_eq!(reduced.payload(), cmd.payload());
        assert_eq!(reduced.entities(), &[EntityId(2)]);
        // The original is untouched.
        assert_eq!(cmd.entities().len(), 3);
    }

    #[test]
    fn addresses_checks_membership() {
        let cmd = move_cmd();
        assert!(cmd.addresses(EntityId(3)));
        assert!(!cmd.addresses(EntityId(4)));
    }

    #[test]
    fn display_lists_entities_and_payload() {
        let text = move_cmd().to_string();
        assert_eq!(text, "faction 2 [1, 2, 3] Move to (5, -3)");
    }

    #[test]
    fn tags_are_distinct() {
        let payloads = [
            CommandPayload::Move {
                destination: Point::default(),
            },
            CommandPayload::ZoneAttack {
                destination: Point::default(),
            },
            CommandPayload::Attack { target: EntityId(0) },
            CommandPayload::Build {
                building: 0,
                location: Point::default(),
            },
            CommandPayload::Train { unit: 0 },
            CommandPayload::Harvest { node: EntityId(0) },
            CommandPayload::Repair { target: EntityId(0) },
            CommandPayload::Research { technology: 0 },
            CommandPayload::Stop,
            CommandPayload::Cancel,
            CommandPayload::Message {
                text: String::new(),
            },
            CommandPayload::Cheat {
                code: String::new(),
            },
            CommandPayload::Custom {
                type_id: 0,
                data: vec![],
            },
        ];
        let mut tags: Vec<u8> = payloads.iter().map(CommandPayload::tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), payloads.len());
    }
}
