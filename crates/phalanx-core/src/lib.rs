//! Core types and traits for the Phalanx lockstep framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions shared by the pipeline, synchronizer,
//! and replay crates: identifiers, the [`Command`] value type, its
//! binary codec, and the collaborator traits ([`Simulation`],
//! [`Commander`]) that the pipeline drives.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod command;
pub mod error;
pub mod id;
pub mod traits;

pub use codec::{decode_command, encode_command};
pub use command::{Command, CommandPayload, EntitySet, Point};
pub use error::CodecError;
pub use id::{CommandFrame, EntityId, FactionId, UpdateNumber};
pub use traits::{Commander, Simulation};
