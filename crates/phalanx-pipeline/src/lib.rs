//! Command filter chain, executor, and optimizer for Phalanx simulations.
//!
//! Commands flow from commanders through an ordered chain of
//! [`CommandFilter`] stages into the terminal [`CommandExecutor`]. The
//! [`CommandPipeline`] owns that chain and drives it once per tick. This
//! crate provides the chain machinery and the local (non-networked)
//! stages; the lockstep synchronizer and replay stages live in their own
//! crates and plug in through the same trait.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cheat;
pub mod executor;
pub mod filter;
pub mod optimizer;
pub mod pipeline;

pub use cheat::CheatFilter;
pub use executor::CommandExecutor;
pub use filter::{CommandFilter, FilterContext, FilterError, Readiness};
pub use optimizer::CommandOptimizer;
pub use pipeline::{CommandPipeline, Entry, PipelineError, StageId, UpdateOutcome};
