//! Synchronizer-level errors.

use phalanx_core::{CommandFrame, FactionId};
use phalanx_pipeline::FilterError;
use thiserror::Error;

use crate::config::SyncConfigError;
use crate::transport::TransportError;
use crate::wire::WireError;

/// Errors from setting up or running a
/// [`CommandSynchronizer`](crate::CommandSynchronizer).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The configuration failed validation.
    #[error("invalid sync config: {0}")]
    Config(#[from] SyncConfigError),
    /// An outbound message could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// A peer was registered with the local faction's id.
    #[error("faction {0} is the local faction")]
    LocalFaction(FactionId),
    /// A faction was registered twice.
    #[error("faction {0} is already a peer")]
    DuplicatePeer(FactionId),
    /// A frame boundary was reached while the in-flight frame could not
    /// close; the stage was advanced without a ready poll.
    #[error("frame {0} cannot close yet")]
    FrameNotReady(CommandFrame),
    /// Peers can only join before the first frame is sent.
    #[error("cannot add faction {0}: the match has started")]
    AlreadyStarted(FactionId),
}

impl From<SyncError> for FilterError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Transport(TransportError::Io(io)) => FilterError::Io(io),
            other => FilterError::other(other),
        }
    }
}
