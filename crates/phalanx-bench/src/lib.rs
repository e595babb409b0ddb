//! Benchmark fixtures for the Phalanx lockstep pipeline.
//!
//! Provides a reproducible in-process match: `n` peers on a
//! [`MemoryNetwork`], each with a synchronizer stage and a commander that
//! issues seeded random commands. Used by the criterion benches and by
//! anyone profiling the synchronizer outside the test suite.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::net::SocketAddr;

use phalanx_core::{Command, Commander, FactionId, Simulation};
use phalanx_pipeline::{CommandPipeline, Entry, PipelineError};
use phalanx_sync::{CommandSynchronizer, MemoryNetwork, SyncConfig, SyncError};
use phalanx_test_utils::{MockSimulation, RandomCommands};
use thiserror::Error;

/// Commander issuing up to `max_per_update` random commands each update.
pub struct RandomCommander {
    faction: FactionId,
    source: RandomCommands,
    max_per_update: usize,
}

impl RandomCommander {
    /// Seeded commander for `faction`.
    pub fn new(faction: FactionId, seed: u64, max_per_update: usize) -> Self {
        Self {
            faction,
            source: RandomCommands::new(faction, seed),
            max_per_update,
        }
    }
}

impl Commander for RandomCommander {
    fn faction(&self) -> FactionId {
        self.faction
    }

    fn update(&mut self, _simulation: &dyn Simulation, _dt: f32, commands: &mut Vec<Command>) {
        commands.extend(self.source.batch(self.max_per_update));
    }
}

/// Errors assembling a benchmark match.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The synchronizer refused its configuration or a peer.
    #[error("synchronizer setup failed: {0}")]
    Sync(#[from] SyncError),
    /// The pipeline refused a stage or commander.
    #[error("pipeline setup failed: {0}")]
    Pipeline(#[from] PipelineError),
}

/// One participant: its pipeline and the simulation it drives.
pub struct BenchPeer {
    /// Pipeline with the synchronizer as its only stage.
    pub pipeline: CommandPipeline,
    /// The peer's copy of the world.
    pub simulation: MockSimulation,
}

/// Address of the peer playing `faction` on the benchmark network.
pub fn peer_addr(faction: u8) -> SocketAddr {
    SocketAddr::from(([10, 1, 0, faction.wrapping_add(1)], 7000))
}

/// Wire `peers` factions into a full mesh over `network`.
///
/// Faction `i` uses seed `seed + i` for its commands.
pub fn lockstep_match(
    network: &MemoryNetwork,
    config: &SyncConfig,
    peers: u8,
    seed: u64,
    max_per_update: usize,
) -> Result<Vec<BenchPeer>, MatchError> {
    let mut out = Vec::with_capacity(peers as usize);
    for faction in 0..peers {
        let transport = network
            .bind(peer_addr(faction))
            .map_err(SyncError::from)?;
        let mut sync = CommandSynchronizer::new(config.clone(), transport, FactionId(faction))?;
        for other in (0..peers).filter(|&o| o != faction) {
            sync.add_peer(FactionId(other), peer_addr(other))?;
        }

        let mut pipeline = CommandPipeline::new();
        pipeline.push_filter(Box::new(sync))?;
        pipeline.add_commander(
            Box::new(RandomCommander::new(
                FactionId(faction),
                seed.wrapping_add(u64::from(faction)),
                max_per_update,
            )),
            Entry::Head,
        )?;
        out.push(BenchPeer {
            pipeline,
            simulation: MockSimulation::new(),
        });
    }
    Ok(out)
}

/// Update every peer once, in faction order.
pub fn run_round(peers: &mut [BenchPeer], dt: f32) -> Result<(), PipelineError> {
    for peer in peers.iter_mut() {
        peer.pipeline.update(&mut peer.simulation, dt)?;
    }
    Ok(())
}

/// `frames` command batches of up to `per_frame` commands each.
pub fn command_batches(faction: FactionId, seed: u64, frames: usize, per_frame: usize) -> Vec<Vec<Command>> {
    let mut source = RandomCommands::new(faction, seed);
    (0..frames).map(|_| source.batch(per_frame)).collect()
}
