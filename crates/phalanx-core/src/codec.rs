//! Binary encode/decode for commands.
//!
//! All integers are little-endian. Strings and byte arrays are
//! length-prefixed with a `u32` length. A command encodes as:
//!
//! ```text
//! [tag u8] [faction u8] [entity_count u16] [entity_id u32 × count] [payload fields]
//! ```
//!
//! Encodings are self-delimiting, so the wire format can pack several
//! commands back to back and the replay format can append them to a log.

use std::io::{Read, Write};

use crate::command::*;
use crate::error::CodecError;
use crate::id::{EntityId, FactionId};

/// Longest accepted `Message`/`Cheat` text, in bytes.
pub const MAX_TEXT_LEN: usize = 1024;

/// Longest accepted `Custom` payload, in bytes.
pub const MAX_CUSTOM_LEN: usize = 16 * 1024;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), CodecError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u16.
pub fn write_u16_le(w: &mut dyn Write, v: u16) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i32.
pub fn write_i32_le(w: &mut dyn Write, v: i32) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(b.len()).map_err(|_| CodecError::Malformed {
        detail: format!("byte array of {} bytes exceeds u32 length prefix", b.len()),
    })?;
    write_u32_le(w, len)?;
    w.write_all(b)?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), CodecError> {
    write_length_prefixed_bytes(w, s.as_bytes())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u16.
pub fn read_u16_le(r: &mut dyn Read) -> Result<u16, CodecError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, CodecError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian i32.
pub fn read_i32_le(r: &mut dyn Read) -> Result<i32, CodecError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read a length-prefixed byte array of at most `max_len` bytes.
///
/// The bound is checked before allocating, so a corrupt length prefix
/// cannot trigger a huge allocation.
pub fn read_length_prefixed_bytes(r: &mut dyn Read, max_len: usize) -> Result<Vec<u8>, CodecError> {
    let len = read_u32_le(r)? as usize;
    if len > max_len {
        return Err(CodecError::Malformed {
            detail: format!("length prefix {len} exceeds limit {max_len}"),
        });
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read a length-prefixed UTF-8 string of at most `max_len` bytes.
pub fn read_length_prefixed_str(r: &mut dyn Read, max_len: usize) -> Result<String, CodecError> {
    let buf = read_length_prefixed_bytes(r, max_len)?;
    String::from_utf8(buf).map_err(|e| CodecError::Malformed {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

fn write_point(w: &mut dyn Write, p: Point) -> Result<(), CodecError> {
    write_i32_le(w, p.x)?;
    write_i32_le(w, p.y)
}

fn read_point(r: &mut dyn Read) -> Result<Point, CodecError> {
    Ok(Point {
        x: read_i32_le(r)?,
        y: read_i32_le(r)?,
    })
}

fn check_text(text: &str) -> Result<(), CodecError> {
    if text.len() > MAX_TEXT_LEN {
        return Err(CodecError::Malformed {
            detail: format!("text of {} bytes exceeds limit {MAX_TEXT_LEN}", text.len()),
        });
    }
    Ok(())
}

// ── Command encode/decode ───────────────────────────────────────

/// Encode a [`Command`] into `w`.
///
/// Fails without writing a partial command only for limit violations
/// detected up front (entity count, text and custom payload sizes);
/// I/O failures may leave a partial encoding in `w`.
pub fn encode_command(w: &mut dyn Write, cmd: &Command) -> Result<(), CodecError> {
    let entity_count = u16::try_from(cmd.entities().len()).map_err(|_| CodecError::Malformed {
        detail: format!("{} entities exceed the u16 entity count", cmd.entities().len()),
    })?;
    match cmd.payload() {
        CommandPayload::Message { text } | CommandPayload::Cheat { code: text } => {
            check_text(text)?
        }
        CommandPayload::Custom { data, .. } if data.len() > MAX_CUSTOM_LEN => {
            return Err(CodecError::Malformed {
                detail: format!(
                    "custom payload of {} bytes exceeds limit {MAX_CUSTOM_LEN}",
                    data.len()
                ),
            });
        }
        _ => {}
    }

    write_u8(w, cmd.payload().tag())?;
    write_u8(w, cmd.faction().0)?;
    write_u16_le(w, entity_count)?;
    for entity in cmd.entities() {
        write_u32_le(w, entity.0)?;
    }

    match cmd.payload() {
        CommandPayload::Move { destination } | CommandPayload::ZoneAttack { destination } => {
            write_point(w, *destination)?;
        }
        CommandPayload::Attack { target } | CommandPayload::Repair { target } => {
            write_u32_le(w, target.0)?;
        }
        CommandPayload::Harvest { node } => write_u32_le(w, node.0)?,
        CommandPayload::Build { building, location } => {
            write_u32_le(w, *building)?;
            write_point(w, *location)?;
        }
        CommandPayload::Train { unit } => write_u32_le(w, *unit)?,
        CommandPayload::Research { technology } => write_u32_le(w, *technology)?,
        CommandPayload::Stop | CommandPayload::Cancel => {}
        CommandPayload::Message { text } => write_length_prefixed_str(w, text)?,
        CommandPayload::Cheat { code } => write_length_prefixed_str(w, code)?,
        CommandPayload::Custom { type_id, data } => {
            write_u32_le(w, *type_id)?;
            write_length_prefixed_bytes(w, data)?;
        }
    }
    Ok(())
}

/// Encode a command into a fresh byte vector.
pub fn encode_command_to_vec(cmd: &Command) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(16 + cmd.entities().len() * 4);
    encode_command(&mut buf, cmd)?;
    Ok(buf)
}

/// Decode one [`Command`] from `r`.
///
/// Running out of input mid-command is reported as
/// [`CodecError::Io`] with kind `UnexpectedEof`
/// (see [`CodecError::is_truncation`]).
pub fn decode_command(r: &mut dyn Read) -> Result<Command, CodecError> {
    let tag = read_u8(r)?;
    let faction = FactionId(read_u8(r)?);
    let entity_count = read_u16_le(r)? as usize;
    let mut entities = EntitySet::with_capacity(entity_count.min(64));
    for _ in 0..entity_count {
        entities.push(EntityId(read_u32_le(r)?));
    }

    let payload = match tag {
        PAYLOAD_MOVE => CommandPayload::Move {
            destination: read_point(r)?,
        },
        PAYLOAD_ZONE_ATTACK => CommandPayload::ZoneAttack {
            destination: read_point(r)?,
        },
        PAYLOAD_ATTACK => CommandPayload::Attack {
            target: EntityId(read_u32_le(r)?),
        },
        PAYLOAD_BUILD => CommandPayload::Build {
            building: read_u32_le(r)?,
            location: read_point(r)?,
        },
        PAYLOAD_TRAIN => CommandPayload::Train {
            unit: read_u32_le(r)?,
        },
        PAYLOAD_HARVEST => CommandPayload::Harvest {
            node: EntityId(read_u32_le(r)?),
        },
        PAYLOAD_REPAIR => CommandPayload::Repair {
            target: EntityId(read_u32_le(r)?),
        },
        PAYLOAD_RESEARCH => CommandPayload::Research {
            technology: read_u32_le(r)?,
        },
        PAYLOAD_STOP => CommandPayload::Stop,
        PAYLOAD_CANCEL => CommandPayload::Cancel,
        PAYLOAD_MESSAGE => CommandPayload::Message {
            text: read_length_prefixed_str(r, MAX_TEXT_LEN)?,
        },
        PAYLOAD_CHEAT => CommandPayload::Cheat {
            code: read_length_prefixed_str(r, MAX_TEXT_LEN)?,
        },
        PAYLOAD_CUSTOM => CommandPayload::Custom {
            type_id: read_u32_le(r)?,
            data: read_length_prefixed_bytes(r, MAX_CUSTOM_LEN)?,
        },
        tag => return Err(CodecError::UnknownPayloadTag { tag }),
    };

    Ok(Command::new(faction, entities, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_commands() -> Vec<Command> {
        vec![
            Command::new(
                FactionId(0),
                [EntityId(1), EntityId(2)],
                CommandPayload::Move {
                    destination: Point::new(-4, 90),
                },
            ),
            Command::new(
                FactionId(1),
                [EntityId(7)],
                CommandPayload::Build {
                    building: 3,
                    location: Point::new(12, 12),
                },
            ),
            Command::new(
                FactionId(2),
                [],
                CommandPayload::Message {
                    text: "gl hf".into(),
                },
            ),
            Command::new(
                FactionId(3),
                [EntityId(40)],
                CommandPayload::Custom {
                    type_id: 99,
                    data: vec![1, 2, 3],
                },
            ),
            Command::new(FactionId(3), [EntityId(41)], CommandPayload::Stop),
        ]
    }

    #[test]
    fn commands_decode_back_to_back() {
        let mut buf = Vec::new();
        for cmd in sample_commands() {
            encode_command(&mut buf, &cmd).unwrap();
        }

        let mut input = buf.as_slice();
        let mut decoded = Vec::new();
        while !input.is_empty() {
            decoded.push(decode_command(&mut input).unwrap());
        }
        assert_eq!(decoded, sample_commands());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bytes = [200u8, 0, 0, 0];
        let err = decode_command(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, CodecError::UnknownPayloadTag { tag: 200 }));
    }

    #[test]
    fn truncated_command_reports_truncation() {
        let cmd = &sample_commands()[0];
        let mut buf = encode_command_to_vec(cmd).unwrap();
        buf.truncate(buf.len() - 3);
        let err = decode_command(&mut buf.as_slice()).unwrap_err();
        assert!(err.is_truncation(), "expected truncation, got {err}");
    }

    #[test]
    fn oversized_text_is_rejected_on_encode() {
        let cmd = Command::new(
            FactionId(0),
            [],
            CommandPayload::Cheat {
                code: "x".repeat(MAX_TEXT_LEN + 1),
            },
        );
        assert!(matches!(
            encode_command_to_vec(&cmd),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn oversized_length_prefix_is_rejected_before_allocating() {
        // Message tag, faction 0, no entities, then a 4 GiB length prefix.
        let mut bytes = vec![PAYLOAD_MESSAGE, 0, 0, 0];
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = decode_command(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut bytes = vec![PAYLOAD_CHEAT, 0, 0, 0];
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);
        let err = decode_command(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    fn arb_command() -> impl Strategy<Value = Command> {
        let payload = prop_oneof![
            (any::<i32>(), any::<i32>()).prop_map(|(x, y)| CommandPayload::Move {
                destination: Point::new(x, y)
            }),
            any::<u32>().prop_map(|t| CommandPayload::Attack {
                target: EntityId(t)
            }),
            any::<u32>().prop_map(|unit| CommandPayload::Train { unit }),
            Just(CommandPayload::Stop),
            "[a-z ]{0,32}".prop_map(|text| CommandPayload::Message { text }),
            (any::<u32>(), prop::collection::vec(any::<u8>(), 0..64))
                .prop_map(|(type_id, data)| CommandPayload::Custom { type_id, data }),
        ];
        (
            any::<u8>(),
            prop::collection::vec(any::<u32>(), 0..8),
            payload,
        )
            .prop_map(|(faction, entities, payload)| {
                Command::new(
                    FactionId(faction),
                    entities.into_iter().map(EntityId),
                    payload,
                )
            })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(cmd in arb_command()) {
            let buf = encode_command_to_vec(&cmd).unwrap();
            let mut input = buf.as_slice();
            let decoded = decode_command(&mut input).unwrap();
            prop_assert_eq!(decoded, cmd);
            prop_assert!(input.is_empty());
        }

        #[test]
        fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_command(&mut bytes.as_slice());
        }
    }
}
