//! Datagram transport over a non-blocking UDP socket.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use log::{info, trace, warn};

use crate::transport::{Transport, TransportError, TransportEvent};

/// Largest datagram accepted from the socket.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Default silence after which a peer is reported as timed out.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

struct PeerLiveness {
    last_heard: Instant,
    timed_out: bool,
}

/// A [`Transport`] over a non-blocking [`UdpSocket`].
///
/// Peers must be registered with [`add_peer`](Self::add_peer) to be
/// tracked for liveness; datagrams from unregistered addresses are still
/// delivered. A registered peer silent for longer than the timeout is
/// reported once with [`TransportEvent::TimedOut`].
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peers: HashMap<SocketAddr, PeerLiveness>,
    peer_timeout: Duration,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind a non-blocking socket at `addr` with the default peer timeout.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        info!("udp transport bound at {local_addr}");
        Ok(Self {
            socket,
            local_addr,
            peers: HashMap::new(),
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    /// Override the peer silence timeout.
    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Start tracking `peer` for liveness. The clock starts now.
    pub fn add_peer(&mut self, peer: SocketAddr) {
        self.peers.insert(
            peer,
            PeerLiveness {
                last_heard: Instant::now(),
                timed_out: false,
            },
        );
    }

    /// Stop tracking `peer`.
    pub fn remove_peer(&mut self, peer: SocketAddr) {
        self.peers.remove(&peer);
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, to: SocketAddr, datagram: &[u8]) -> Result<(), TransportError> {
        match self.socket.send_to(datagram, to) {
            Ok(_) => Ok(()),
            // A full send buffer is just another lost datagram.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                warn!("udp send to {to} would block; dropping {} bytes", datagram.len());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn poll(&mut self, events: &mut Vec<TransportEvent>) -> Result<(), TransportError> {
        loop {
            match self.socket.recv_from(&mut self.buf) {
                Ok((len, from)) => {
                    trace!("udp recv {len} bytes from {from}");
                    if let Some(peer) = self.peers.get_mut(&from) {
                        peer.last_heard = Instant::now();
                    }
                    events.push(TransportEvent::Received {
                        from,
                        datagram: self.buf[..len].to_vec(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // ICMP port unreachable surfaces as a reset on some platforms.
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let now = Instant::now();
        for (&addr, peer) in &mut self.peers {
            if !peer.timed_out && now.duration_since(peer.last_heard) > self.peer_timeout {
                peer.timed_out = true;
                info!("udp peer {addr} silent for {:?}; timing out", self.peer_timeout);
                events.push(TransportEvent::TimedOut { peer: addr });
            }
        }
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn poll_until_received(transport: &mut UdpTransport) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        for _ in 0..200 {
            transport.poll(&mut events).unwrap();
            if events
                .iter()
                .any(|e| matches!(e, TransportEvent::Received { .. }))
            {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        events
    }

    #[test]
    fn loopback_roundtrip() {
        let mut a = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut b = UdpTransport::bind("127.0.0.1:0").unwrap();
        a.send(b.local_addr(), b"ping").unwrap();

        let events = poll_until_received(&mut b);
        assert!(events.contains(&TransportEvent::Received {
            from: a.local_addr(),
            datagram: b"ping".to_vec(),
        }));
    }

    #[test]
    fn silent_peer_times_out_once() {
        let mut a = UdpTransport::bind("127.0.0.1:0")
            .unwrap()
            .with_peer_timeout(Duration::from_millis(1));
        let ghost: SocketAddr = "127.0.0.1:9".parse().unwrap();
        a.add_peer(ghost);
        thread::sleep(Duration::from_millis(10));

        let mut events = Vec::new();
        a.poll(&mut events).unwrap();
        a.poll(&mut events).unwrap();
        let timeouts = events
            .iter()
            .filter(|e| matches!(e, TransportEvent::TimedOut { .. }))
            .count();
        assert_eq!(timeouts, 1);
    }
}
