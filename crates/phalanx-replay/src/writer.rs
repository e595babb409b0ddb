//! Replay recording writer.
//!
//! [`ReplayWriter`] streams events to any `Write` sink. The header is
//! written immediately on construction.

use std::io::Write;

use phalanx_core::codec::{encode_command, write_u32_le};
use phalanx_core::{Command, UpdateNumber};

use crate::codec::encode_header;
use crate::error::ReplayError;
use crate::types::{ReplayEvent, ReplayHeader};

/// Writes replay data to a byte stream.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`. Update stamps must never decrease.
///
/// # Examples
///
/// ```
/// use phalanx_core::{Command, CommandPayload, FactionId, UpdateNumber};
/// use phalanx_replay::{ReplayHeader, ReplayReader, ReplayWriter};
///
/// let header = ReplayHeader::new(7, ["red", "blue"]);
/// let stop = Command::new(FactionId(1), [], CommandPayload::Stop);
///
/// let mut buf = Vec::new();
/// let mut writer = ReplayWriter::new(&mut buf, &header).unwrap();
/// writer.record(UpdateNumber(3), &stop).unwrap();
/// writer.record(UpdateNumber(3), &stop).unwrap();
/// assert!(writer.record(UpdateNumber(2), &stop).is_err());
/// assert_eq!(writer.events_written(), 2);
/// drop(writer);
///
/// let mut reader = ReplayReader::open(buf.as_slice()).unwrap();
/// assert_eq!(reader.header(), &header);
/// assert_eq!(reader.next_event().unwrap().unwrap().update, UpdateNumber(3));
/// ```
pub struct ReplayWriter<W: Write> {
    writer: W,
    last_update: Option<UpdateNumber>,
    events_written: u64,
}

impl<W: Write> ReplayWriter<W> {
    /// Create a new replay writer, immediately writing the header.
    pub fn new(mut writer: W, header: &ReplayHeader) -> Result<Self, ReplayError> {
        encode_header(&mut writer, header)?;
        Ok(Self {
            writer,
            last_update: None,
            events_written: 0,
        })
    }

    /// Append `command` stamped with `update`.
    pub fn record(&mut self, update: UpdateNumber, command: &Command) -> Result<(), ReplayError> {
        if let Some(previous) = self.last_update {
            if update < previous {
                return Err(ReplayError::OutOfOrder { previous, update });
            }
        }
        write_record(&mut self.writer, update, command)?;
        self.last_update = Some(update);
        self.events_written += 1;
        Ok(())
    }

    /// Append a pre-built event.
    pub fn write_event(&mut self, event: &ReplayEvent) -> Result<(), ReplayError> {
        self.record(event.update, &event.command)
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), ReplayError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of events written so far.
    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Update stamp of the most recent event.
    pub fn last_update(&self) -> Option<UpdateNumber> {
        self.last_update
    }

    /// Consume the writer and return the underlying `Write` sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

// Encode into a scratch buffer first so a command rejected by the codec
// never leaves half a record in the log.
fn write_record(w: &mut dyn Write, update: UpdateNumber, command: &Command) -> Result<(), ReplayError> {
    let mut record = Vec::with_capacity(32);
    write_u32_le(&mut record, update.0)?;
    encode_command(&mut record, command)?;
    w.write_all(&record)?;
    Ok(())
}
