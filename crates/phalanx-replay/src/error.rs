//! Error types for the replay system.

use std::io;

use phalanx_core::{CodecError, UpdateNumber};
use phalanx_pipeline::FilterError;
use thiserror::Error;

/// Errors that can occur while recording or playing back a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The stream does not start with the expected `b"PHLX"` magic bytes.
    #[error("invalid magic bytes (expected b\"PHLX\")")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the stream.
        found: u8,
    },
    /// A recorded command failed to decode or encode.
    #[error("command codec error: {0}")]
    Codec(#[source] CodecError),
    /// The header or a record is truncated or corrupt.
    #[error("malformed replay: {detail}")]
    MalformedRecord {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// An event was stamped with an update earlier than its predecessor.
    #[error("event for update {update} recorded after update {previous}")]
    OutOfOrder {
        /// The last update written.
        previous: UpdateNumber,
        /// The offending update.
        update: UpdateNumber,
    },
}

impl From<CodecError> for ReplayError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                Self::MalformedRecord {
                    detail: "unexpected end of stream".into(),
                }
            }
            CodecError::Io(io) => Self::Io(io),
            other => Self::Codec(other),
        }
    }
}

impl From<ReplayError> for FilterError {
    fn from(e: ReplayError) -> Self {
        match e {
            ReplayError::Io(io) => FilterError::Io(io),
            ReplayError::Codec(codec) => FilterError::Codec(codec),
            other => FilterError::other(other),
        }
    }
}
