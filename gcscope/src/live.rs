//! Best-effort UDP emission of per-cycle events.
//!
//! One datagram per completed collection, JSON-encoded, fired at a
//! dashboard address. The socket is non-blocking and every failure is
//! swallowed after a debug log so a missing or slow listener can never
//! stall the process being monitored.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use gcscope_wire::LiveEvent;
use log::debug;

/// Fire-and-forget event sender.
#[derive(Debug)]
pub struct UdpEmitter {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpEmitter {
    /// Bind an ephemeral local port aimed at `target`.
    pub fn new(target: SocketAddr) -> io::Result<Self> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(UdpEmitter { socket, target })
    }

    /// Where datagrams are sent.
    #[must_use]
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one event. Serialization or socket errors drop the datagram.
    pub fn emit(&self, event: &LiveEvent) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("live event serialization failed: {e}");
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&payload, self.target) {
            debug!("live event send to {} failed: {e}", self.target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> LiveEvent {
        LiveEvent {
            timestamp: 1_700_000_000.5,
            generation: 2,
            duration_ms: 60.0,
            collected: 5,
            uncollectable: 0,
        }
    }

    #[test]
    fn test_emit_reaches_a_local_listener() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let emitter = UdpEmitter::new(listener.local_addr().unwrap()).unwrap();

        emitter.emit(&event());

        let mut buf = [0u8; 2048];
        let (len, _) = listener.recv_from(&mut buf).unwrap();
        let decoded: LiveEvent = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(decoded, event());
    }

    #[test]
    fn test_emit_without_listener_does_not_panic() {
        // Port 9 (discard) is almost certainly unbound; send must not error out.
        let emitter = UdpEmitter::new("127.0.0.1:9".parse().unwrap()).unwrap();
        emitter.emit(&event());
        emitter.emit(&event());
    }
}
