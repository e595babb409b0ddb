//! Binary encode/decode for the replay format.
//!
//! Reuses the little-endian primitives of [`phalanx_core::codec`]. The
//! header is written once; records follow back to back with no count,
//! so a recorder can append until the match ends.

use std::io::{ErrorKind, Read, Write};

use phalanx_core::codec::{
    decode_command, encode_command, read_length_prefixed_str, read_u32_le, read_u64_le, read_u8,
    write_length_prefixed_str, write_u32_le, write_u64_le, write_u8,
};
use phalanx_core::UpdateNumber;

use crate::error::ReplayError;
use crate::types::{ReplayEvent, ReplayHeader};
use crate::{FORMAT_VERSION, MAGIC};

/// Most factions a header may list (one per possible faction id).
pub const MAX_FACTIONS: usize = 256;

/// Longest accepted faction name, in bytes.
pub const MAX_FACTION_NAME_LEN: usize = 256;

// ── Header ──────────────────────────────────────────────────────

/// Write magic, version, seed and the faction roster.
pub fn encode_header(w: &mut dyn Write, header: &ReplayHeader) -> Result<(), ReplayError> {
    if header.factions.len() > MAX_FACTIONS {
        return Err(ReplayError::MalformedRecord {
            detail: format!(
                "{} factions exceed the limit of {MAX_FACTIONS}",
                header.factions.len()
            ),
        });
    }
    if let Some(name) = header
        .factions
        .iter()
        .find(|name| name.len() > MAX_FACTION_NAME_LEN)
    {
        return Err(ReplayError::MalformedRecord {
            detail: format!("faction name of {} bytes is too long", name.len()),
        });
    }

    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_u64_le(w, header.seed)?;
    write_u32_le(w, header.factions.len() as u32)?;
    for name in &header.factions {
        write_length_prefixed_str(w, name)?;
    }
    Ok(())
}

/// Read and validate the header.
pub fn decode_header(r: &mut dyn Read) -> Result<ReplayHeader, ReplayError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => ReplayError::MalformedRecord {
            detail: "truncated header".into(),
        },
        _ => ReplayError::Io(e),
    })?;
    if magic != MAGIC {
        return Err(ReplayError::InvalidMagic);
    }

    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(ReplayError::UnsupportedVersion { found: version });
    }

    let seed = read_u64_le(r)?;
    let count = read_u32_le(r)? as usize;
    if count > MAX_FACTIONS {
        return Err(ReplayError::MalformedRecord {
            detail: format!("header lists {count} factions, limit is {MAX_FACTIONS}"),
        });
    }
    let mut factions = Vec::with_capacity(count);
    for _ in 0..count {
        factions.push(read_length_prefixed_str(r, MAX_FACTION_NAME_LEN)?);
    }
    Ok(ReplayHeader { seed, factions })
}

// ── Records ─────────────────────────────────────────────────────

/// Append one `(update, command)` record.
pub fn encode_event(w: &mut dyn Write, event: &ReplayEvent) -> Result<(), ReplayError> {
    write_u32_le(w, event.update.0)?;
    encode_command(w, &event.command)?;
    Ok(())
}

/// Read the next record, or `None` at a clean end of stream.
///
/// A stream that ends anywhere inside a record is
/// [`ReplayError::MalformedRecord`].
pub fn decode_event(r: &mut dyn Read) -> Result<Option<ReplayEvent>, ReplayError> {
    // Read the update stamp byte-by-byte to tell a clean EOF (zero bytes
    // available) from a truncated record.
    let mut update_buf = [0u8; 4];
    let mut filled = 0;
    while filled < update_buf.len() {
        match r.read(&mut update_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(ReplayError::MalformedRecord {
                    detail: format!("truncated record header: got {filled} of 4 bytes"),
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReplayError::Io(e)),
        }
    }
    let update = UpdateNumber(u32::from_le_bytes(update_buf));
    let command = decode_command(r)?;
    Ok(Some(ReplayEvent { update, command }))
}
