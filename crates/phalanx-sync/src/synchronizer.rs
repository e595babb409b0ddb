//! The lockstep protocol engine.
//!
//! [`CommandSynchronizer`] is a [`CommandFilter`] that holds local
//! commands back until every peer has the same batch, then releases all
//! factions' commands for a frame in one deterministic order.
//!
//! # Cadence
//!
//! With a target of `T` updates per frame, local commands handled during
//! cycle `N` (updates `N*T .. (N+1)*T`) form frame `N`. At the end of the
//! cycle the batch is sent to every peer; frame `N` then has one more
//! cycle to collect every peer's batch and every peer's `Done` before it
//! closes at the end of cycle `N+1`, two cycles after it opened. Sending
//! frame `N+1` overlaps with collecting frame `N`.
//!
//! # Stalls
//!
//! The pause decision is taken in [`poll`](CommandFilter::poll): if the
//! coming update would cross the deadline of a frame that cannot close
//! yet, the synchronizer reports [`Readiness::Stalled`] and the whole
//! pipeline holds. Inbound traffic is still processed on every paused
//! tick, so the match resumes on the first tick the quorum is met.
//!
//! Peers that quit, time out, or are defeated leave the quorum
//! immediately; a peer that is alive but never sends `Done` pauses the
//! match indefinitely.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use phalanx_core::codec::encode_command_to_vec;
use phalanx_core::{Command, CommandFrame, FactionId, Simulation};
use phalanx_pipeline::{CommandFilter, FilterContext, FilterError, Readiness};

use crate::config::{PacingPolicy, SyncConfig};
use crate::endpoint::{FactionEndpoint, Inbound};
use crate::error::SyncError;
use crate::pacing::Pacer;
use crate::transport::{Transport, TransportEvent};

/// Local view of one command frame's progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// Accumulating local commands; not sent yet.
    Open,
    /// Local batch sent; some peers' batches are still missing.
    Sent,
    /// Every active peer's batch has arrived; local `Done` not sent yet.
    AllReceived,
    /// Local `Done` sent; waiting for peers' `Done` or the deadline.
    Closing,
    /// Executed in the agreed order.
    Closed,
}

/// Protocol counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Frames closed and flushed.
    pub frames_closed: u64,
    /// Transitions into the paused state.
    pub pauses: u64,
    /// Polls spent paused.
    pub paused_polls: u64,
    /// Inbound datagrams rejected (malformed, foreign, unknown sender,
    /// too far ahead).
    pub datagrams_rejected: u64,
    /// Local commands refused (wrong faction or not encodable).
    pub local_commands_rejected: u64,
    /// Retransmission rounds, both periodic and in answer to stale traffic.
    pub resends: u64,
    /// Peers that quit, timed out, or were defeated.
    pub departures: u64,
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    frame: CommandFrame,
    sent_at: u64,
    done_sent: bool,
}

/// Lockstep command synchronizer for one local faction.
///
/// Place it in the pipeline after any local-only stages (optimizer,
/// cheat filter) and before stages that must see the agreed stream
/// (replay recorder). It is the only stage that talks to the network.
///
/// # Examples
///
/// ```
/// use std::net::SocketAddr;
/// use phalanx_core::FactionId;
/// use phalanx_sync::{CommandSynchronizer, MemoryNetwork, SyncConfig};
///
/// let net = MemoryNetwork::new();
/// let a: SocketAddr = "10.0.0.1:7000".parse().unwrap();
/// let b: SocketAddr = "10.0.0.2:7000".parse().unwrap();
///
/// let mut sync = CommandSynchronizer::new(SyncConfig::default(), net.bind(a).unwrap(), FactionId(0)).unwrap();
/// sync.add_peer(FactionId(1), b).unwrap();
/// assert_eq!(sync.peer_count(), 1);
/// ```
pub struct CommandSynchronizer<T: Transport> {
    config: SyncConfig,
    transport: T,
    local_faction: FactionId,
    endpoints: IndexMap<FactionId, FactionEndpoint>,
    addresses: HashMap<SocketAddr, FactionId>,
    last_answer: HashMap<FactionId, u64>,
    pending_local: Vec<Command>,
    local_batches: BTreeMap<CommandFrame, Vec<Command>>,
    local_done: BTreeMap<CommandFrame, u32>,
    next_frame: CommandFrame,
    in_flight: Option<InFlight>,
    last_closed: Option<CommandFrame>,
    target: u32,
    updates_in_cycle: u32,
    ticks: u64,
    paused: bool,
    stalled_polls: u64,
    left: bool,
    pacer: Pacer,
    stats: SyncStats,
    events: Vec<TransportEvent>,
}

impl<T: Transport> CommandSynchronizer<T> {
    /// Create a synchronizer for `local_faction` over `transport`.
    pub fn new(config: SyncConfig, transport: T, local_faction: FactionId) -> Result<Self, SyncError> {
        config.validate()?;
        info!(
            "synchronizer for faction {local_faction} at {} (target {} updates/frame, {:?} pacing)",
            transport.local_addr(),
            config.target_updates_per_frame,
            config.pacing
        );
        Ok(Self {
            target: config.target_updates_per_frame,
            pacer: Pacer::new(&config),
            config,
            transport,
            local_faction,
            endpoints: IndexMap::new(),
            addresses: HashMap::new(),
            last_answer: HashMap::new(),
            pending_local: Vec::new(),
            local_batches: BTreeMap::new(),
            local_done: BTreeMap::new(),
            next_frame: CommandFrame(0),
            in_flight: None,
            last_closed: None,
            updates_in_cycle: 0,
            ticks: 0,
            paused: false,
            stalled_polls: 0,
            left: false,
            stats: SyncStats::default(),
            events: Vec::new(),
        })
    }

    // ── Membership ─────────────────────────────────────────────────

    /// Register a remote faction. Only allowed before the first frame is
    /// sent.
    pub fn add_peer(&mut self, faction: FactionId, addr: SocketAddr) -> Result<(), SyncError> {
        if faction == self.local_faction {
            return Err(SyncError::LocalFaction(faction));
        }
        if self.endpoints.contains_key(&faction) {
            return Err(SyncError::DuplicatePeer(faction));
        }
        if self.next_frame != CommandFrame(0) {
            return Err(SyncError::AlreadyStarted(faction));
        }
        debug!("faction {}: peer faction {faction} at {addr}", self.local_faction);
        self.addresses.insert(addr, faction);
        self.endpoints.insert(faction, FactionEndpoint::new(faction, addr));
        Ok(())
    }

    /// Drop a remote faction from the quorum without notifying the
    /// simulation. Returns its endpoint if it was a peer.
    pub fn remove_peer(&mut self, faction: FactionId) -> Option<FactionEndpoint> {
        let endpoint = self.endpoints.shift_remove(&faction)?;
        self.addresses.remove(&endpoint.addr());
        self.last_answer.remove(&faction);
        info!(
            "faction {}: faction {faction} removed from quorum",
            self.local_faction
        );
        Some(endpoint)
    }

    /// Announce departure to every peer. After leaving the synchronizer
    /// never stalls and flushes nothing. Idempotent.
    pub fn leave(&mut self) {
        if self.left {
            return;
        }
        info!("faction {} leaving the match", self.local_faction);
        send_each(&self.endpoints, &mut self.transport, "quit", |ep, t| {
            ep.send_leave(t)
        });
        self.left = true;
        self.paused = false;
    }

    // ── Queries ────────────────────────────────────────────────────

    /// The faction this synchronizer speaks for.
    pub fn local_faction(&self) -> FactionId {
        self.local_faction
    }

    /// Number of active peers.
    pub fn peer_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Active peer factions, in registration order.
    pub fn peers(&self) -> impl Iterator<Item = FactionId> + '_ {
        self.endpoints.keys().copied()
    }

    /// The endpoint for an active peer.
    pub fn endpoint(&self, faction: FactionId) -> Option<&FactionEndpoint> {
        self.endpoints.get(&faction)
    }

    /// Whether the last poll stalled the pipeline.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether [`leave`](Self::leave) has been called.
    pub fn has_left(&self) -> bool {
        self.left
    }

    /// Target updates per frame for the current cycle.
    pub fn current_target(&self) -> u32 {
        self.target
    }

    /// The most recently closed frame.
    pub fn last_closed_frame(&self) -> Option<CommandFrame> {
        self.last_closed
    }

    /// The frame local commands are currently accumulating into.
    pub fn open_frame(&self) -> CommandFrame {
        self.next_frame
    }

    /// Progress of `frame` from this peer's point of view.
    pub fn frame_state(&self, frame: CommandFrame) -> FrameState {
        if self.last_closed.is_some_and(|closed| frame <= closed) {
            return FrameState::Closed;
        }
        match self.in_flight {
            Some(in_flight) if in_flight.frame == frame => {
                if in_flight.done_sent {
                    FrameState::Closing
                } else if self.all_received(frame) {
                    FrameState::AllReceived
                } else {
                    FrameState::Sent
                }
            }
            _ => FrameState::Open,
        }
    }

    /// Local frames (batches or `Done` counts) still held in memory.
    pub fn retained_local_frames(&self) -> usize {
        let mut frames: Vec<CommandFrame> = self.local_batches.keys().copied().collect();
        frames.extend(self.local_done.keys().copied());
        frames.sort_unstable();
        frames.dedup();
        frames.len()
    }

    /// Pacing history.
    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Protocol counters.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// The configuration in force.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ── Protocol internals ─────────────────────────────────────────

    fn all_received(&self, frame: CommandFrame) -> bool {
        self.endpoints
            .values()
            .all(|ep| ep.has_commands_for_frame(frame))
    }

    fn can_close(&self) -> bool {
        match self.in_flight {
            None => true,
            Some(in_flight) => {
                in_flight.done_sent
                    && self
                        .endpoints
                        .values()
                        .all(|ep| ep.is_done_for_frame(in_flight.frame))
            }
        }
    }

    fn lookahead_limit(&self) -> CommandFrame {
        let base = self.last_closed.map_or(0, |f| f.0);
        CommandFrame(base.saturating_add(self.config.max_frames_ahead))
    }

    fn pump(&mut self, simulation: &mut dyn Simulation) -> Result<(), SyncError> {
        let mut events = std::mem::take(&mut self.events);
        let polled = self.transport.poll(&mut events);
        for event in events.drain(..) {
            match event {
                TransportEvent::Received { from, datagram } => {
                    self.receive(simulation, from, &datagram)
                }
                TransportEvent::TimedOut { peer } => {
                    if let Some(&faction) = self.addresses.get(&peer) {
                        self.depart(simulation, faction, "timed out");
                    }
                }
            }
        }
        self.events = events;
        polled?;
        Ok(())
    }

    fn receive(&mut self, simulation: &mut dyn Simulation, from: SocketAddr, datagram: &[u8]) {
        let limit = self.lookahead_limit();
        let Some(&faction) = self.addresses.get(&from) else {
            warn!("ignoring {} bytes from unknown sender {from}", datagram.len());
            self.stats.datagrams_rejected += 1;
            return;
        };
        let Some(endpoint) = self.endpoints.get_mut(&faction) else {
            return;
        };
        let inbound = match endpoint.receive_datagram(datagram) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("rejected datagram from faction {faction}: {e}");
                self.stats.datagrams_rejected += 1;
                return;
            }
        };
        trace!("faction {faction}: {inbound:?}");

        let frame = match inbound {
            Inbound::Quit => {
                self.depart(simulation, faction, "quit");
                return;
            }
            Inbound::Commands(frame) | Inbound::Done(frame) => frame,
        };

        if frame > limit {
            warn!("discarding frame {frame} from faction {faction}: beyond lookahead limit {limit}");
            endpoint.discard_frame(frame);
            self.stats.datagrams_rejected += 1;
        } else if matches!(inbound, Inbound::Commands(_))
            && self.last_closed.is_some_and(|closed| frame <= closed)
        {
            self.answer_stale(faction, frame);
        }
    }

    /// A peer re-sending its batch for a frame this peer already closed
    /// is stuck on it: send back this peer's batch and `Done` for that
    /// frame. At most once per resend interval per peer.
    fn answer_stale(&mut self, faction: FactionId, frame: CommandFrame) {
        let interval = u64::from(self.config.resend_interval_updates);
        if interval == 0 {
            return;
        }
        if let Some(&last) = self.last_answer.get(&faction) {
            if self.ticks < last + interval {
                return;
            }
        }
        let Some(endpoint) = self.endpoints.get(&faction) else {
            return;
        };
        self.last_answer.insert(faction, self.ticks);
        trace!("answering stale frame {frame} from faction {faction}");

        let transport: &mut dyn Transport = &mut self.transport;
        if let Some(batch) = self.local_batches.get(&frame) {
            if let Err(e) = endpoint.send_commands(transport, frame, batch) {
                warn!("failed to re-send batch {frame} to faction {faction}: {e}");
            }
        }
        if let Some(&count) = self.local_done.get(&frame) {
            if let Err(e) = endpoint.send_done(transport, frame, count) {
                warn!("failed to re-send done {frame} to faction {faction}: {e}");
            }
        }
        self.stats.resends += 1;
    }

    fn depart(&mut self, simulation: &mut dyn Simulation, faction: FactionId, reason: &str) {
        if self.remove_peer(faction).is_some() {
            info!("faction {faction} {reason}; giving up on its behalf");
            simulation.give_up(faction);
            self.stats.departures += 1;
        }
    }

    fn drop_defeated(&mut self, simulation: &dyn Simulation) {
        let defeated: Vec<FactionId> = self
            .endpoints
            .keys()
            .copied()
            .filter(|&faction| simulation.is_defeated(faction))
            .collect();
        for faction in defeated {
            info!("faction {faction} defeated; no longer waiting on it");
            self.remove_peer(faction);
            self.stats.departures += 1;
        }
    }

    fn try_send_done(&mut self) {
        let Some(in_flight) = self.in_flight else {
            return;
        };
        if in_flight.done_sent || !self.all_received(in_flight.frame) {
            return;
        }
        let frame = in_flight.frame;
        let count = u32::try_from(self.ticks - in_flight.sent_at).unwrap_or(u32::MAX);
        self.in_flight = Some(InFlight {
            done_sent: true,
            ..in_flight
        });
        self.local_done.insert(frame, count);
        debug!(
            "faction {}: frame {frame} complete after {count} updates; sending done",
            self.local_faction
        );
        send_each(&self.endpoints, &mut self.transport, "done", |ep, t| {
            ep.send_done(t, frame, count)
        });
    }

    fn resend(&mut self) {
        let Some(in_flight) = self.in_flight else {
            return;
        };
        let frame = in_flight.frame;
        let batch = self.local_batches.get(&frame).map(Vec::as_slice).unwrap_or_default();
        let done = self.local_done.get(&frame).copied();
        debug!(
            "faction {}: re-sending frame {frame} while paused",
            self.local_faction
        );
        send_each(&self.endpoints, &mut self.transport, "resend", |ep, t| {
            // A peer that closed the frame answers a stale batch with
            // whatever of its own this peer still lacks.
            if !ep.is_done_for_frame(frame) || !ep.has_commands_for_frame(frame) {
                ep.send_commands(t, frame, batch)?;
            }
            if let Some(count) = done {
                ep.send_done(t, frame, count)?;
            }
            Ok(())
        });
        self.stats.resends += 1;
    }

    fn waiting_on(&self, frame: CommandFrame) -> Vec<FactionId> {
        self.endpoints
            .values()
            .filter(|ep| !ep.has_commands_for_frame(frame) || !ep.is_done_for_frame(frame))
            .map(FactionEndpoint::faction)
            .collect()
    }

    fn close_frame(&mut self, frame: CommandFrame, ctx: &mut FilterContext<'_>) {
        let mut batches: Vec<(FactionId, &[Command])> = Vec::with_capacity(self.endpoints.len() + 1);
        batches.push((
            self.local_faction,
            self.local_batches.get(&frame).map(Vec::as_slice).unwrap_or_default(),
        ));
        for endpoint in self.endpoints.values() {
            batches.push((endpoint.faction(), endpoint.commands_for_frame(frame)));
        }
        // Stable: each faction contributes exactly one batch, kept in its
        // generation order.
        batches.sort_by_key(|&(faction, _)| faction);

        let mut flushed = 0usize;
        for (_, batch) in &batches {
            for command in batch.iter() {
                ctx.flush(command.clone());
                flushed += 1;
            }
        }

        let taken: Vec<u32> = self
            .local_done
            .get(&frame)
            .copied()
            .into_iter()
            .chain(
                self.endpoints
                    .values()
                    .filter_map(|ep| ep.updates_taken_for_frame(frame)),
            )
            .collect();
        let delta = self.pacer.record(frame, ctx.update(), self.target, taken);

        debug!(
            "faction {}: frame {frame} closed at update {} with {flushed} commands from {} factions (pacing delta {delta:?})",
            self.local_faction,
            ctx.update(),
            batches.len()
        );
        self.last_closed = Some(frame);
        self.stats.frames_closed += 1;

        if let Some(cutoff) = frame.0.checked_sub(self.config.retained_frames) {
            let cutoff = CommandFrame(cutoff);
            for endpoint in self.endpoints.values_mut() {
                endpoint.discard_through(cutoff);
            }
            self.local_batches.retain(|&f, _| f > cutoff);
            self.local_done.retain(|&f, _| f > cutoff);
        }

        if self.config.pacing == PacingPolicy::Adaptive {
            if let Some(next) = self.pacer.suggested_target() {
                if next != self.target {
                    info!(
                        "faction {}: pacing target {} -> {next} updates/frame",
                        self.local_faction, self.target
                    );
                    self.target = next;
                }
            }
        }
    }

    fn send_open_frame(&mut self) {
        let frame = self.next_frame;
        let batch = std::mem::take(&mut self.pending_local);
        debug!(
            "faction {}: sending frame {frame} ({} commands) to {} peers",
            self.local_faction,
            batch.len(),
            self.endpoints.len()
        );
        send_each(&self.endpoints, &mut self.transport, "batch", |ep, t| {
            ep.send_commands(t, frame, &batch)
        });
        self.local_batches.insert(frame, batch);
        self.in_flight = Some(InFlight {
            frame,
            sent_at: self.ticks,
            done_sent: false,
        });
        self.next_frame = frame.next();
    }
}

/// Best-effort fan-out: a failed send is logged and the next peer is
/// still tried.
fn send_each<T: Transport>(
    endpoints: &IndexMap<FactionId, FactionEndpoint>,
    transport: &mut T,
    what: &str,
    mut send: impl FnMut(&FactionEndpoint, &mut dyn Transport) -> Result<(), SyncError>,
) {
    for endpoint in endpoints.values() {
        if let Err(e) = send(endpoint, &mut *transport) {
            warn!("failed to send {what} to faction {}: {e}", endpoint.faction());
        }
    }
}

impl<T: Transport> CommandFilter for CommandSynchronizer<T> {
    fn name(&self) -> &str {
        "synchronizer"
    }

    fn handle(&mut self, command: Command) {
        if self.left {
            return;
        }
        if command.faction() != self.local_faction {
            warn!(
                "synchronizer for faction {} refusing command from faction {}",
                self.local_faction,
                command.faction()
            );
            self.stats.local_commands_rejected += 1;
            return;
        }
        if let Err(e) = encode_command_to_vec(&command) {
            warn!("refusing unsendable command {command}: {e}");
            self.stats.local_commands_rejected += 1;
            return;
        }
        self.pending_local.push(command);
    }

    fn poll(&mut self, simulation: &mut dyn Simulation) -> Result<Readiness, FilterError> {
        if self.left {
            return Ok(Readiness::Ready);
        }
        self.ticks += 1;
        self.pump(simulation)?;
        self.drop_defeated(simulation);
        self.try_send_done();

        let at_deadline = self.updates_in_cycle + 1 >= self.target;
        if at_deadline && !self.can_close() {
            let frame = self.in_flight.map(|f| f.frame).unwrap_or(self.next_frame);
            if !self.paused {
                info!(
                    "faction {}: paused at deadline of frame {frame}, waiting on factions {:?}",
                    self.local_faction,
                    self.waiting_on(frame)
                );
                self.paused = true;
                self.stalled_polls = 0;
                self.stats.pauses += 1;
            }
            self.stalled_polls += 1;
            self.stats.paused_polls += 1;
            let interval = u64::from(self.config.resend_interval_updates);
            if interval > 0 && self.stalled_polls % interval == 0 {
                self.resend();
            }
            return Ok(Readiness::Stalled);
        }

        if self.paused {
            info!(
                "faction {}: resumed after {} paused polls",
                self.local_faction, self.stalled_polls
            );
            self.paused = false;
        }
        Ok(Readiness::Ready)
    }

    fn advance(&mut self, ctx: &mut FilterContext<'_>) -> Result<(), FilterError> {
        if self.left {
            self.pending_local.clear();
            return Ok(());
        }
        self.updates_in_cycle += 1;
        if self.updates_in_cycle < self.target {
            return Ok(());
        }

        if let Some(in_flight) = self.in_flight {
            if !self.can_close() {
                self.updates_in_cycle -= 1;
                return Err(SyncError::FrameNotReady(in_flight.frame).into());
            }
            self.close_frame(in_flight.frame, ctx);
        }
        self.send_open_frame();
        self.updates_in_cycle = 0;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FilterError> {
        self.leave();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryNetwork, MemoryTransport};
    use phalanx_core::UpdateNumber;
    use phalanx_test_utils::{move_cmd, stop_cmd, MockSimulation};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 1], port))
    }

    fn solo(target: u32) -> (MemoryNetwork, CommandSynchronizer<MemoryTransport>) {
        let net = MemoryNetwork::new();
        let transport = net.bind(addr(1)).unwrap();
        let sync =
            CommandSynchronizer::new(SyncConfig::with_target(target), transport, FactionId(0))
                .unwrap();
        (net, sync)
    }

    /// One pipeline tick against the synchronizer alone. `None` when the
    /// poll stalled.
    fn tick(
        sync: &mut CommandSynchronizer<MemoryTransport>,
        sim: &mut MockSimulation,
        update: u32,
    ) -> Option<Vec<Command>> {
        if sync.poll(sim).unwrap() == Readiness::Stalled {
            return None;
        }
        let mut flushed = Vec::new();
        let mut ctx = FilterContext::new(UpdateNumber(update), 0.1, sim, &mut flushed);
        sync.advance(&mut ctx).unwrap();
        Some(flushed)
    }

    #[test]
    fn invalid_config_refused() {
        let net = MemoryNetwork::new();
        let config = SyncConfig {
            target_updates_per_frame: 0,
            ..SyncConfig::default()
        };
        let result = CommandSynchronizer::new(config, net.bind(addr(1)).unwrap(), FactionId(0));
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn add_peer_rejects_local_and_duplicate_factions() {
        let (_net, mut sync) = solo(2);
        assert!(matches!(
            sync.add_peer(FactionId(0), addr(2)),
            Err(SyncError::LocalFaction(FactionId(0)))
        ));
        sync.add_peer(FactionId(1), addr(2)).unwrap();
        assert!(matches!(
            sync.add_peer(FactionId(1), addr(3)),
            Err(SyncError::DuplicatePeer(FactionId(1)))
        ));
        assert_eq!(sync.peers().collect::<Vec<_>>(), vec![FactionId(1)]);
    }

    #[test]
    fn add_peer_refused_once_started() {
        let (_net, mut sync) = solo(1);
        let mut sim = MockSimulation::new();
        tick(&mut sync, &mut sim, 0).unwrap();
        assert_eq!(sync.open_frame(), CommandFrame(1));
        assert!(matches!(
            sync.add_peer(FactionId(1), addr(2)),
            Err(SyncError::AlreadyStarted(FactionId(1)))
        ));
    }

    #[test]
    fn solo_peer_releases_frame_after_two_cycles() {
        let (_net, mut sync) = solo(2);
        let mut sim = MockSimulation::new();

        sync.handle(move_cmd(0, &[1], 3, 4));
        assert_eq!(tick(&mut sync, &mut sim, 0).unwrap(), vec![]);
        assert_eq!(sync.frame_state(CommandFrame(0)), FrameState::Open);

        // End of the first cycle: frame 0 is sent and, with no peers,
        // immediately complete.
        assert_eq!(tick(&mut sync, &mut sim, 1).unwrap(), vec![]);
        assert_eq!(sync.frame_state(CommandFrame(0)), FrameState::AllReceived);

        assert_eq!(tick(&mut sync, &mut sim, 2).unwrap(), vec![]);
        assert_eq!(sync.frame_state(CommandFrame(0)), FrameState::Closing);

        assert_eq!(
            tick(&mut sync, &mut sim, 3).unwrap(),
            vec![move_cmd(0, &[1], 3, 4)]
        );
        assert_eq!(sync.frame_state(CommandFrame(0)), FrameState::Closed);
        assert_eq!(sync.last_closed_frame(), Some(CommandFrame(0)));
        assert_eq!(sync.stats().frames_closed, 1);
    }

    #[test]
    fn local_commands_keep_generation_order() {
        let (_net, mut sync) = solo(1);
        let mut sim = MockSimulation::new();

        sync.handle(stop_cmd(0, &[2]));
        sync.handle(move_cmd(0, &[1], 0, 0));
        tick(&mut sync, &mut sim, 0).unwrap();
        let flushed = tick(&mut sync, &mut sim, 1).unwrap();
        assert_eq!(flushed, vec![stop_cmd(0, &[2]), move_cmd(0, &[1], 0, 0)]);
    }

    #[test]
    fn foreign_local_commands_rejected() {
        let (_net, mut sync) = solo(1);
        let mut sim = MockSimulation::new();

        sync.handle(move_cmd(3, &[1], 0, 0));
        assert_eq!(sync.stats().local_commands_rejected, 1);
        tick(&mut sync, &mut sim, 0).unwrap();
        assert_eq!(tick(&mut sync, &mut sim, 1).unwrap(), vec![]);
    }

    #[test]
    fn silent_peer_stalls_at_deadline() {
        let (_net, mut sync) = solo(2);
        sync.add_peer(FactionId(1), addr(2)).unwrap();
        let mut sim = MockSimulation::new();

        // Frame 0 has no close obligation until it is in flight.
        tick(&mut sync, &mut sim, 0).unwrap();
        tick(&mut sync, &mut sim, 1).unwrap();
        assert_eq!(sync.frame_state(CommandFrame(0)), FrameState::Sent);
        tick(&mut sync, &mut sim, 2).unwrap();

        assert!(tick(&mut sync, &mut sim, 3).is_none());
        assert!(sync.is_paused());
        assert!(tick(&mut sync, &mut sim, 3).is_none());
        assert_eq!(sync.stats().pauses, 1);
        assert_eq!(sync.stats().paused_polls, 2);
    }

    #[test]
    fn advance_at_unready_deadline_is_an_error() {
        let (_net, mut sync) = solo(1);
        sync.add_peer(FactionId(1), addr(2)).unwrap();
        let mut sim = MockSimulation::new();
        tick(&mut sync, &mut sim, 0).unwrap();

        let mut flushed = Vec::new();
        let mut ctx = FilterContext::new(UpdateNumber(1), 0.1, &mut sim, &mut flushed);
        let err = sync.advance(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("frame 0"));
    }

    #[test]
    fn defeated_peer_leaves_quorum() {
        let (_net, mut sync) = solo(1);
        sync.add_peer(FactionId(1), addr(2)).unwrap();
        let mut sim = MockSimulation::new();

        tick(&mut sync, &mut sim, 0).unwrap();
        assert!(tick(&mut sync, &mut sim, 1).is_none());

        sim.defeat(FactionId(1));
        assert!(tick(&mut sync, &mut sim, 1).is_some());
        assert_eq!(sync.peer_count(), 0);
        assert_eq!(sync.stats().departures, 1);
        // Defeat is the simulation's own verdict; nothing to give up.
        assert!(sim.given_up().is_empty());
    }

    #[test]
    fn leaving_stops_stalling_and_flushing() {
        let (_net, mut sync) = solo(1);
        sync.add_peer(FactionId(1), addr(2)).unwrap();
        let mut sim = MockSimulation::new();

        tick(&mut sync, &mut sim, 0).unwrap();
        assert!(tick(&mut sync, &mut sim, 1).is_none());

        sync.finish().unwrap();
        assert!(sync.has_left());
        assert!(!sync.is_paused());
        sync.handle(move_cmd(0, &[1], 0, 0));
        assert_eq!(tick(&mut sync, &mut sim, 1).unwrap(), vec![]);
        assert_eq!(tick(&mut sync, &mut sim, 2).unwrap(), vec![]);
    }

    #[test]
    fn retention_discards_old_local_frames() {
        let net = MemoryNetwork::new();
        let config = SyncConfig {
            retained_frames: 2,
            ..SyncConfig::with_target(1)
        };
        let mut sync =
            CommandSynchronizer::new(config, net.bind(addr(1)).unwrap(), FactionId(0)).unwrap();
        let mut sim = MockSimulation::new();

        for update in 0..20 {
            sync.handle(move_cmd(0, &[1], 0, 0));
            tick(&mut sync, &mut sim, update).unwrap();
        }
        assert_eq!(sync.last_closed_frame(), Some(CommandFrame(18)));
        // Frames 17 and 18 retained, 19 in flight.
        assert_eq!(sync.retained_local_frames(), 3);
    }
}
