//! Pass-through stage that logs the command stream.

use std::io::Write;

use log::{debug, warn};
use phalanx_core::Command;
use phalanx_pipeline::{CommandFilter, FilterContext, FilterError};

use crate::error::ReplayError;
use crate::writer::ReplayWriter;

/// Records every command that passes through it, stamped with the
/// update number it executes on.
///
/// Place it after the synchronizer so the log holds the agreed stream
/// every peer executed. By default commands are forwarded unchanged;
/// [`without_forwarding`](Self::without_forwarding) turns the stage
/// into a sink.
///
/// A failed write never costs the pipeline a command: the stage logs the
/// failure, stops recording, keeps forwarding, and reports the error from
/// [`finish`](CommandFilter::finish).
pub struct ReplayRecorder<W: Write + Send> {
    writer: ReplayWriter<W>,
    pending: Vec<Command>,
    forward: bool,
    failure: Option<ReplayError>,
}

impl<W: Write + Send> ReplayRecorder<W> {
    /// Record into `writer`, whose header has already been written.
    pub fn new(writer: ReplayWriter<W>) -> Self {
        Self {
            writer,
            pending: Vec::new(),
            forward: true,
            failure: None,
        }
    }

    /// Record without forwarding anything downstream.
    pub fn without_forwarding(mut self) -> Self {
        self.forward = false;
        self
    }

    /// Whether recorded commands are passed on.
    pub fn forwards(&self) -> bool {
        self.forward
    }

    /// Whether the log is still being written.
    pub fn is_recording(&self) -> bool {
        self.failure.is_none()
    }

    /// The write failure that stopped recording, if any.
    pub fn failure(&self) -> Option<&ReplayError> {
        self.failure.as_ref()
    }

    /// Number of commands recorded so far.
    pub fn recorded(&self) -> u64 {
        self.writer.events_written()
    }

    /// Consume the stage and return the underlying writer.
    pub fn into_writer(self) -> ReplayWriter<W> {
        self.writer
    }
}

impl<W: Write + Send> CommandFilter for ReplayRecorder<W> {
    fn name(&self) -> &str {
        "replay_recorder"
    }

    fn handle(&mut self, command: Command) {
        self.pending.push(command);
    }

    fn advance(&mut self, ctx: &mut FilterContext<'_>) -> Result<(), FilterError> {
        let update = ctx.update();
        for command in self.pending.drain(..) {
            if self.failure.is_none() {
                if let Err(e) = self.writer.record(update, &command) {
                    warn!(
                        "replay recorder stopped at update {update} after {} commands: {e}",
                        self.writer.events_written()
                    );
                    self.failure = Some(e);
                }
            }
            if self.forward {
                ctx.flush(command);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FilterError> {
        if let Some(e) = self.failure.take() {
            return Err(e.into());
        }
        self.writer.flush()?;
        debug!(
            "replay recorder finished after {} commands",
            self.writer.events_written()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use crate::codec::encode_header;
    use crate::reader::ReplayReader;
    use crate::types::ReplayHeader;
    use phalanx_core::UpdateNumber;
    use phalanx_test_utils::{move_cmd, stop_cmd, MockSimulation};

    fn recorder() -> ReplayRecorder<Vec<u8>> {
        ReplayRecorder::new(ReplayWriter::new(Vec::new(), &ReplayHeader::new(1, ["a"])).unwrap())
    }

    fn advance(stage: &mut dyn CommandFilter, update: u32) -> Vec<Command> {
        let mut sim = MockSimulation::new();
        let mut out = Vec::new();
        let mut ctx = FilterContext::new(UpdateNumber(update), 0.1, &mut sim, &mut out);
        stage.advance(&mut ctx).unwrap();
        out
    }

    #[test]
    fn forwards_and_stamps() {
        let mut stage = recorder();
        stage.handle(move_cmd(0, &[1], 1, 1));
        stage.handle(stop_cmd(0, &[2]));
        assert_eq!(
            advance(&mut stage, 4),
            vec![move_cmd(0, &[1], 1, 1), stop_cmd(0, &[2])]
        );
        assert_eq!(advance(&mut stage, 5), vec![]);
        assert_eq!(stage.recorded(), 2);
        stage.finish().unwrap();

        let bytes = stage.into_writer().into_inner();
        let events: Vec<_> = ReplayReader::open(bytes.as_slice())
            .unwrap()
            .events()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(events.iter().all(|e| e.update == UpdateNumber(4)));
    }

    #[test]
    fn sink_mode_swallows_commands() {
        let mut stage = recorder().without_forwarding();
        assert!(!stage.forwards());
        stage.handle(stop_cmd(0, &[2]));
        assert_eq!(advance(&mut stage, 0), vec![]);
        assert_eq!(stage.recorded(), 1);
    }

    /// Accepts `room` bytes, then fails every write.
    struct DiskFull {
        room: usize,
        data: Vec<u8>,
    }

    impl Write for DiskFull {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.data.len() + buf.len() > self.room {
                return Err(io::Error::other("disk full"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_keeps_forwarding() {
        let header = ReplayHeader::new(1, ["a"]);
        let mut header_bytes = Vec::new();
        encode_header(&mut header_bytes, &header).unwrap();
        let sink = DiskFull {
            room: header_bytes.len(),
            data: Vec::new(),
        };
        let mut stage = ReplayRecorder::new(ReplayWriter::new(sink, &header).unwrap());

        stage.handle(move_cmd(0, &[1], 1, 1));
        stage.handle(stop_cmd(0, &[2]));
        assert_eq!(
            advance(&mut stage, 3),
            vec![move_cmd(0, &[1], 1, 1), stop_cmd(0, &[2])]
        );
        assert!(!stage.is_recording());
        assert!(matches!(stage.failure(), Some(ReplayError::Io(_))));
        assert_eq!(stage.recorded(), 0);

        stage.handle(stop_cmd(0, &[3]));
        assert_eq!(advance(&mut stage, 4), vec![stop_cmd(0, &[3])]);

        assert!(stage.finish().is_err());
        assert_eq!(stage.into_writer().into_inner().data, header_bytes);
    }
}
