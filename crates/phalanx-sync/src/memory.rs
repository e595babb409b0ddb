//! In-process datagram network for tests, benchmarks and local matches.
//!
//! [`MemoryNetwork`] routes datagrams between [`MemoryTransport`]s through
//! crossbeam mailboxes, one per bound address. It can drop traffic
//! deterministically (seeded random loss or a user rule) and simulate a
//! peer timing out, which is everything the lockstep tests need to
//! reproduce stalls and departures without real sockets.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use log::trace;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::transport::{Transport, TransportError, TransportEvent};

type DropRule = Box<dyn FnMut(SocketAddr, SocketAddr, &[u8]) -> bool + Send>;

/// Delivery counters for a [`MemoryNetwork`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryNetworkStats {
    /// Datagrams handed to `send`.
    pub sent: u64,
    /// Datagrams placed in a mailbox.
    pub delivered: u64,
    /// Datagrams dropped by random loss.
    pub dropped_loss: u64,
    /// Datagrams dropped by the drop rule.
    pub dropped_rule: u64,
    /// Datagrams dropped because an endpoint was isolated or unbound.
    pub dropped_unreachable: u64,
}

struct Shared {
    mailboxes: HashMap<SocketAddr, Sender<TransportEvent>>,
    isolated: HashSet<SocketAddr>,
    loss_rate: f64,
    rng: ChaCha8Rng,
    drop_rule: Option<DropRule>,
    // Bumped by every set/clear so a rule running outside the lock is not
    // reinstalled over a newer one.
    rule_generation: u64,
    stats: MemoryNetworkStats,
}

/// A shared in-memory datagram network.
///
/// Cloning yields another handle to the same network.
#[derive(Clone)]
pub struct MemoryNetwork {
    shared: Arc<Mutex<Shared>>,
}

impl fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.lock();
        f.debug_struct("MemoryNetwork")
            .field("members", &shared.mailboxes.len())
            .field("isolated", &shared.isolated)
            .field("loss_rate", &shared.loss_rate)
            .field("stats", &shared.stats)
            .finish()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    /// A lossless network.
    pub fn new() -> Self {
        Self::with_loss(0.0, 0)
    }

    /// A network that drops each datagram with probability `loss_rate`,
    /// using a ChaCha8 stream seeded with `seed`.
    pub fn with_loss(loss_rate: f64, seed: u64) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                mailboxes: HashMap::new(),
                isolated: HashSet::new(),
                loss_rate: loss_rate.clamp(0.0, 1.0),
                rng: ChaCha8Rng::seed_from_u64(seed),
                drop_rule: None,
                rule_generation: 0,
                stats: MemoryNetworkStats::default(),
            })),
        }
    }

    /// Bind a transport at `addr`.
    pub fn bind(&self, addr: SocketAddr) -> Result<MemoryTransport, TransportError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut shared = self.lock();
        if shared.mailboxes.contains_key(&addr) {
            return Err(TransportError::AddressInUse(addr));
        }
        shared.mailboxes.insert(addr, tx);
        Ok(MemoryTransport {
            addr,
            inbox: rx,
            network: self.clone(),
        })
    }

    /// Install a rule consulted for every datagram as
    /// `rule(from, to, bytes)`; returning `true` drops the datagram.
    ///
    /// The rule runs without the network lock held, so it may call back
    /// into the network (read stats, time out a peer, replace itself).
    /// Datagrams sent from inside the rule bypass it.
    pub fn set_drop_rule(
        &self,
        rule: impl FnMut(SocketAddr, SocketAddr, &[u8]) -> bool + Send + 'static,
    ) {
        let mut shared = self.lock();
        shared.drop_rule = Some(Box::new(rule));
        shared.rule_generation += 1;
    }

    /// Remove the drop rule.
    pub fn clear_drop_rule(&self) {
        let mut shared = self.lock();
        shared.drop_rule = None;
        shared.rule_generation += 1;
    }

    /// Simulate `peer` timing out.
    ///
    /// The peer is cut off in both directions, every other member gets a
    /// [`TransportEvent::TimedOut`] naming it, and the peer itself gets
    /// one for every other member.
    pub fn time_out(&self, peer: SocketAddr) {
        let mut shared = self.lock();
        shared.isolated.insert(peer);
        let others: Vec<SocketAddr> = shared
            .mailboxes
            .keys()
            .copied()
            .filter(|&addr| addr != peer)
            .collect();
        for other in others {
            if let Some(mailbox) = shared.mailboxes.get(&other) {
                let _ = mailbox.send(TransportEvent::TimedOut { peer });
            }
            if let Some(mailbox) = shared.mailboxes.get(&peer) {
                let _ = mailbox.send(TransportEvent::TimedOut { peer: other });
            }
        }
    }

    /// Delivery counters so far.
    pub fn stats(&self) -> MemoryNetworkStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, from: SocketAddr, to: SocketAddr, datagram: &[u8]) {
        let (rule, generation) = {
            let mut shared = self.lock();
            shared.stats.sent += 1;
            if shared.isolated.contains(&from) || shared.isolated.contains(&to) {
                shared.stats.dropped_unreachable += 1;
                return;
            }
            (shared.drop_rule.take(), shared.rule_generation)
        };

        let (dropped, mut guard) = match rule {
            Some(mut rule) => {
                let dropped = rule(from, to, datagram);
                let mut guard = self.lock();
                if guard.rule_generation == generation {
                    guard.drop_rule = Some(rule);
                }
                (dropped, guard)
            }
            None => (false, self.lock()),
        };
        let shared = &mut *guard;

        if dropped {
            trace!("memory network: rule dropped {} bytes {from} -> {to}", datagram.len());
            shared.stats.dropped_rule += 1;
            return;
        }
        if shared.isolated.contains(&from) || shared.isolated.contains(&to) {
            shared.stats.dropped_unreachable += 1;
            return;
        }
        if shared.loss_rate > 0.0 && shared.rng.gen_bool(shared.loss_rate) {
            trace!("memory network: lost {} bytes {from} -> {to}", datagram.len());
            shared.stats.dropped_loss += 1;
            return;
        }

        let event = TransportEvent::Received {
            from,
            datagram: datagram.to_vec(),
        };
        match shared.mailboxes.get(&to).map(|mailbox| mailbox.send(event)) {
            Some(Ok(())) => shared.stats.delivered += 1,
            _ => shared.stats.dropped_unreachable += 1,
        }
    }
}

/// One member of a [`MemoryNetwork`].
///
/// Dropping the transport unbinds its address.
pub struct MemoryTransport {
    addr: SocketAddr,
    inbox: Receiver<TransportEvent>,
    network: MemoryNetwork,
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("addr", &self.addr)
            .field("queued", &self.inbox.len())
            .finish()
    }
}

impl MemoryTransport {
    /// The network this transport is bound to.
    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, to: SocketAddr, datagram: &[u8]) -> Result<(), TransportError> {
        self.network.route(self.addr, to, datagram);
        Ok(())
    }

    fn poll(&mut self, events: &mut Vec<TransportEvent>) -> Result<(), TransportError> {
        events.extend(self.inbox.try_iter());
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.network.lock().mailboxes.remove(&self.addr);
    }
}
