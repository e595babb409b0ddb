//! Error types for command encoding and decoding.

use std::io;

use thiserror::Error;

/// Errors produced while encoding or decoding a [`Command`](crate::Command).
///
/// Decoding never returns a partially built command: any of these errors
/// means the whole input must be discarded.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying reader or writer failed, including running out of
    /// bytes in the middle of a command.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A command payload type tag is not recognized.
    #[error("unknown command payload tag {tag}")]
    UnknownPayloadTag {
        /// The unrecognized tag.
        tag: u8,
    },
    /// A length or value is outside the range the format allows.
    #[error("malformed command: {detail}")]
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

impl CodecError {
    /// Whether the error was caused by the input ending mid-command.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
