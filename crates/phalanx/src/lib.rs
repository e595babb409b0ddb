//! Phalanx: deterministic command pipelines for real-time strategy simulations.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Phalanx sub-crates. Most games only need `phalanx` as a dependency.
//!
//! # Quick start
//!
//! ```rust
//! use phalanx::prelude::*;
//!
//! #[derive(Default)]
//! struct Tally(Vec<Command>);
//! impl Simulation for Tally {
//!     fn execute(&mut self, command: &Command) { self.0.push(command.clone()); }
//!     fn is_defeated(&self, _faction: FactionId) -> bool { false }
//!     fn give_up(&mut self, _faction: FactionId) {}
//! }
//!
//! struct Rally;
//! impl Commander for Rally {
//!     fn faction(&self) -> FactionId { FactionId(0) }
//!     fn update(&mut self, _sim: &dyn Simulation, _dt: f32, out: &mut Vec<Command>) {
//!         out.push(Command::new(
//!             FactionId(0),
//!             [EntityId(1), EntityId(2)],
//!             CommandPayload::Move { destination: Point::new(4, 4) },
//!         ));
//!     }
//! }
//!
//! let mut pipeline = CommandPipeline::new();
//! pipeline.push_filter(Box::new(CommandOptimizer::new())).unwrap();
//! pipeline.add_commander(Box::new(Rally), Entry::Head).unwrap();
//!
//! let mut world = Tally::default();
//! let outcome = pipeline.update(&mut world, 0.05).unwrap();
//! assert!(matches!(outcome, UpdateOutcome::Advanced { executed: 1, .. }));
//! assert_eq!(world.0.len(), 1);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `phalanx-core` | IDs, commands, the command codec, collaborator traits |
//! | [`pipeline`] | `phalanx-pipeline` | Filter chain, executor, optimizer, cheat filter |
//! | [`sync`] | `phalanx-sync` | Lockstep synchronizer, wire format, transports |
//! | [`replay`] | `phalanx-replay` | Replay recording and playback |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`phalanx-core`).
///
/// Contains [`types::Command`], the identifier newtypes, the binary
/// command codec, and the [`types::Simulation`] and [`types::Commander`]
/// traits.
pub use phalanx_core as types;

/// Command filter chain and local stages (`phalanx-pipeline`).
///
/// [`pipeline::CommandFilter`] is the main extension point for
/// user-defined stages.
pub use phalanx_pipeline as pipeline;

/// Peer-to-peer lockstep synchronization (`phalanx-sync`).
///
/// [`sync::CommandSynchronizer`] over a [`sync::UdpTransport`], or over a
/// [`sync::MemoryNetwork`] for tests and local play.
pub use phalanx_sync as sync;

/// Replay recording and playback (`phalanx-replay`).
///
/// Record with [`replay::ReplayRecorder`], play back with
/// [`replay::ReplayPlayer`].
pub use phalanx_replay as replay;

/// Common imports for typical Phalanx usage.
///
/// ```rust
/// use phalanx::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use phalanx_core::{
        Command, CommandFrame, CommandPayload, Commander, EntityId, FactionId, Point, Simulation,
        UpdateNumber,
    };

    // Pipeline
    pub use phalanx_pipeline::{
        CheatFilter, CommandFilter, CommandOptimizer, CommandPipeline, Entry, FilterContext,
        FilterError, PipelineError, Readiness, UpdateOutcome,
    };

    // Synchronizer
    pub use phalanx_sync::{CommandSynchronizer, PacingPolicy, SyncConfig, SyncError, Transport};

    // Replay
    pub use phalanx_replay::{ReplayPlayer, ReplayReader, ReplayRecorder, ReplayWriter};
}
