//! The best-effort datagram transport the synchronizer talks through.
//!
//! Transports neither retransmit nor order datagrams; the synchronizer
//! tolerates loss, duplication and reordering on its own. They do report
//! when a peer has gone silent for too long, which the synchronizer
//! treats as that peer leaving.

use std::io;
use std::net::SocketAddr;

use phalanx_pipeline::FilterError;
use thiserror::Error;

/// Something that happened on the transport since the last poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A datagram arrived from `from`.
    Received {
        /// Sender address.
        from: SocketAddr,
        /// Raw datagram bytes.
        datagram: Vec<u8>,
    },
    /// `peer` has been silent past the transport's timeout.
    TimedOut {
        /// The silent peer.
        peer: SocketAddr,
    },
}

/// Errors from a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying socket failed.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    /// The address is already bound on this network.
    #[error("address {0} is already bound")]
    AddressInUse(SocketAddr),
    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

impl From<TransportError> for FilterError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Io(io) => FilterError::Io(io),
            other => FilterError::other(other),
        }
    }
}

/// A best-effort, host-addressed datagram transport.
///
/// # Contract
///
/// - `send()` never blocks. Delivery is not guaranteed.
/// - `poll()` never blocks; it appends every event that is ready.
pub trait Transport: Send {
    /// Send one datagram to `to`.
    fn send(&mut self, to: SocketAddr, datagram: &[u8]) -> Result<(), TransportError>;

    /// Append ready events to `events`.
    fn poll(&mut self, events: &mut Vec<TransportEvent>) -> Result<(), TransportError>;

    /// The address peers use to reach this transport.
    fn local_addr(&self) -> SocketAddr;
}
