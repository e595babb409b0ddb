//! Peer-to-peer lockstep command synchronizer for Phalanx simulations.
//!
//! Each peer runs the same deterministic simulation. The
//! [`CommandSynchronizer`] stage exchanges every faction's commands per
//! command frame over a best-effort [`Transport`], closes a frame only
//! once every active peer has the same batch set, and flushes the
//! commands in faction order so every peer executes the identical
//! stream. When a peer lags past the deadline the synchronizer stalls
//! the pipeline until it catches up or leaves.
//!
//! Transports: [`MemoryNetwork`] (in-process, with deterministic loss and
//! timeout injection) and [`UdpTransport`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod memory;
pub mod pacing;
pub mod synchronizer;
pub mod transport;
pub mod udp;
pub mod wire;

pub use config::{PacingPolicy, SyncConfig, SyncConfigError};
pub use endpoint::{FactionEndpoint, Inbound};
pub use error::SyncError;
pub use memory::{MemoryNetwork, MemoryNetworkStats, MemoryTransport};
pub use pacing::{Pacer, PacingSample};
pub use synchronizer::{CommandSynchronizer, FrameState, SyncStats};
pub use transport::{Transport, TransportError, TransportEvent};
pub use udp::UdpTransport;
pub use wire::{Message, WireError};
