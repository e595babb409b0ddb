//! Replay recording and playback for Phalanx command pipelines.
//!
//! A replay is the exact command stream a match executed, stamped with
//! the update number each command ran on. Feeding it back through a
//! fresh pipeline with the same seed reproduces the match.
//!
//! # Architecture
//!
//! - [`ReplayWriter`] appends events to any `Write` sink
//! - [`ReplayReader`] reads them back from any `Read` source
//! - [`ReplayRecorder`] is a pass-through pipeline stage that logs every
//!   command it sees
//! - [`ReplayPlayer`] is a source stage that re-emits recorded commands
//!   on the update they were recorded at
//!
//! # Format
//!
//! ```text
//! [MAGIC "PHLX"] [VERSION u8] [seed u64] [faction_count u32] [name]*
//! [update u32] [command] [update u32] [command] ... EOF
//! ```
//!
//! Names are `u32`-length-prefixed UTF-8; commands use the
//! [`phalanx_core::codec`] encoding. A clean end of stream ends the
//! replay.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod player;
pub mod reader;
pub mod recorder;
pub mod types;
pub mod writer;

pub use error::ReplayError;
pub use player::ReplayPlayer;
pub use reader::{EventIter, ReplayReader};
pub use recorder::ReplayRecorder;
pub use types::{ReplayEvent, ReplayHeader};
pub use writer::ReplayWriter;

/// Magic bytes at the start of every replay file.
pub const MAGIC: [u8; 4] = *b"PHLX";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
