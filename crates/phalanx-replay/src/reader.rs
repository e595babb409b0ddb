//! Replay playback reader.
//!
//! [`ReplayReader`] reads events from any `Read` source. The header is
//! validated on construction.

use std::io::Read;

use crate::codec::{decode_event, decode_header};
use crate::error::ReplayError;
use crate::types::{ReplayEvent, ReplayHeader};

/// Reads replay data from a byte stream.
///
/// Generic over `R: Read` so tests can use `&[u8]` and production
/// code can use `BufReader<File>`.
pub struct ReplayReader<R: Read> {
    reader: R,
    header: ReplayHeader,
    events_read: u64,
}

impl<R: Read> ReplayReader<R> {
    /// Open a replay stream, reading and validating the header.
    pub fn open(mut reader: R) -> Result<Self, ReplayError> {
        let header = decode_header(&mut reader)?;
        Ok(Self {
            reader,
            header,
            events_read: 0,
        })
    }

    /// The replay header.
    pub fn header(&self) -> &ReplayHeader {
        &self.header
    }

    /// Read the next event, or `None` if the replay is over.
    pub fn next_event(&mut self) -> Result<Option<ReplayEvent>, ReplayError> {
        let event = decode_event(&mut self.reader)?;
        if event.is_some() {
            self.events_read += 1;
        }
        Ok(event)
    }

    /// Number of events read so far.
    pub fn events_read(&self) -> u64 {
        self.events_read
    }

    /// Convert into an event iterator.
    pub fn events(self) -> EventIter<R> {
        EventIter {
            reader: self,
            done: false,
        }
    }
}

/// Iterator adapter over replay events.
///
/// Yields at most one error, then stops.
pub struct EventIter<R: Read> {
    reader: ReplayReader<R>,
    done: bool,
}

impl<R: Read> EventIter<R> {
    /// The replay header.
    pub fn header(&self) -> &ReplayHeader {
        self.reader.header()
    }
}

impl<R: Read> Iterator for EventIter<R> {
    type Item = Result<ReplayEvent, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
