//! Datagram format exchanged between lockstep peers.
//!
//! Every datagram starts with a one-byte message type:
//!
//! ```text
//! MSG_COMMANDS  [frame u32] [command]*      commands run to the end of the datagram
//! MSG_DONE      [frame u32] [update_count u32]
//! MSG_QUIT
//! ```
//!
//! All integers are little-endian; commands use the
//! [`phalanx_core::codec`] encoding. A datagram either decodes completely
//! or is rejected as a whole.

use phalanx_core::codec::{decode_command, encode_command};
use phalanx_core::{CodecError, Command, CommandFrame, FactionId};
use thiserror::Error;

/// Message type for a batch of commands.
pub const MSG_COMMANDS: u8 = 1;
/// Message type for a frame completion notice.
pub const MSG_DONE: u8 = 2;
/// Message type for a peer leaving the match.
pub const MSG_QUIT: u8 = 3;

/// A decoded peer-to-peer message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// The sender's command batch for `frame`.
    Commands {
        /// The frame the batch belongs to.
        frame: CommandFrame,
        /// Commands in the sender's generation order.
        commands: Vec<Command>,
    },
    /// The sender has every batch for `frame` and took `update_count`
    /// updates to get there.
    Done {
        /// The completed frame.
        frame: CommandFrame,
        /// Updates the sender spent before the frame was complete.
        update_count: u32,
    },
    /// The sender is leaving the match.
    Quit,
}

/// Errors decoding or validating a datagram.
#[derive(Debug, Error)]
pub enum WireError {
    /// The datagram has no bytes at all.
    #[error("empty datagram")]
    Empty,
    /// The first byte is not a known message type.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    /// The datagram ended before a fixed-size field or a command.
    #[error("truncated datagram")]
    Truncated,
    /// A fixed-size message carries extra bytes.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
    /// A command inside the datagram failed to decode or encode.
    #[error("command codec error: {0}")]
    Codec(#[source] CodecError),
    /// A batch contains a command issued by a faction other than the
    /// sending peer's.
    #[error("command from faction {found} in a batch from faction {expected}")]
    ForeignFaction {
        /// The sending peer's faction.
        expected: FactionId,
        /// The faction named by the offending command.
        found: FactionId,
    },
}

impl From<CodecError> for WireError {
    fn from(e: CodecError) -> Self {
        if e.is_truncation() {
            Self::Truncated
        } else {
            Self::Codec(e)
        }
    }
}

impl Message {
    /// The message-type byte this message is sent with.
    pub fn message_type(&self) -> u8 {
        match self {
            Self::Commands { .. } => MSG_COMMANDS,
            Self::Done { .. } => MSG_DONE,
            Self::Quit => MSG_QUIT,
        }
    }

    /// Encode into a fresh datagram.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = vec![self.message_type()];
        match self {
            Self::Commands { frame, commands } => {
                buf.extend_from_slice(&frame.0.to_le_bytes());
                for command in commands {
                    encode_command(&mut buf, command)?;
                }
            }
            Self::Done {
                frame,
                update_count,
            } => {
                buf.extend_from_slice(&frame.0.to_le_bytes());
                buf.extend_from_slice(&update_count.to_le_bytes());
            }
            Self::Quit => {}
        }
        Ok(buf)
    }

    /// Decode a whole datagram.
    pub fn decode(datagram: &[u8]) -> Result<Self, WireError> {
        let (&kind, mut rest) = datagram.split_first().ok_or(WireError::Empty)?;
        match kind {
            MSG_COMMANDS => {
                let frame = CommandFrame(take_u32(&mut rest)?);
                let mut commands = Vec::new();
                while !rest.is_empty() {
                    commands.push(decode_command(&mut rest)?);
                }
                Ok(Self::Commands { frame, commands })
            }
            MSG_DONE => {
                let frame = CommandFrame(take_u32(&mut rest)?);
                let update_count = take_u32(&mut rest)?;
                expect_end(rest)?;
                Ok(Self::Done {
                    frame,
                    update_count,
                })
            }
            MSG_QUIT => {
                expect_end(rest)?;
                Ok(Self::Quit)
            }
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

fn take_u32(input: &mut &[u8]) -> Result<u32, WireError> {
    if input.len() < 4 {
        return Err(WireError::Truncated);
    }
    let (head, tail) = input.split_at(4);
    *input = tail;
    Ok(u32::from_le_bytes([head[0], head[1], head[2], head[3]]))
}

fn expect_end(rest: &[u8]) -> Result<(), WireError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(WireError::TrailingBytes(rest.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phalanx_test_utils::{attack_cmd, message_cmd, move_cmd};
    use proptest::prelude::*;

    #[test]
    fn commands_message_layout() {
        let msg = Message::Commands {
            frame: CommandFrame(7),
            commands: vec![],
        };
        assert_eq!(msg.encode().unwrap(), vec![MSG_COMMANDS, 7, 0, 0, 0]);
    }

    #[test]
    fn done_message_layout() {
        let msg = Message::Done {
            frame: CommandFrame(3),
            update_count: 260,
        };
        assert_eq!(
            msg.encode().unwrap(),
            vec![MSG_DONE, 3, 0, 0, 0, 4, 1, 0, 0]
        );
    }

    #[test]
    fn batch_survives_the_wire() {
        let msg = Message::Commands {
            frame: CommandFrame(12),
            commands: vec![
                move_cmd(1, &[1, 2], 5, 5),
                attack_cmd(1, &[3], 40),
                message_cmd(1, "rush b"),
            ],
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn quit_is_a_single_byte() {
        assert_eq!(Message::Quit.encode().unwrap(), vec![MSG_QUIT]);
        assert_eq!(Message::decode(&[MSG_QUIT]).unwrap(), Message::Quit);
    }

    #[test]
    fn partial_command_rejects_whole_datagram() {
        let msg = Message::Commands {
            frame: CommandFrame(1),
            commands: vec![move_cmd(0, &[1], 1, 1), move_cmd(0, &[2], 2, 2)],
        };
        let mut bytes = msg.encode().unwrap();
        bytes.pop();
        assert!(matches!(Message::decode(&bytes), Err(WireError::Truncated)));
    }

    #[test]
    fn malformed_headers_rejected() {
        assert!(matches!(Message::decode(&[]), Err(WireError::Empty)));
        assert!(matches!(
            Message::decode(&[9]),
            Err(WireError::UnknownMessageType(9))
        ));
        assert!(matches!(
            Message::decode(&[MSG_DONE, 1, 0]),
            Err(WireError::Truncated)
        ));
        assert!(matches!(
            Message::decode(&[MSG_QUIT, 0]),
            Err(WireError::TrailingBytes(1))
        ));
    }

    proptest! {
        #[test]
        fn arbitrary_datagrams_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            let _ = Message::decode(&bytes);
        }
    }
}
