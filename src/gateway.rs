//! # Transmission Gateway Module
//!
//! Turns one detected beat into one outbound datagram event, addressed by a
//! per-channel hierarchical path and carrying the IBI in milliseconds as a
//! single signed 32-bit integer.
//!
//! ## Delivery contract
//! Fire-and-forget: unordered, unacknowledged, best-effort, no retransmit,
//! each event self-contained. The detector side must never stall on the
//! network, so `send` has no failure path: a send that cannot be delivered
//! is dropped and noted at debug level. A link that reports not-ready still
//! receives the call.
//!
//! ## Wire format (`UdpLink`)
//! One UTF-8 datagram per event:
//! ```text
//! <path> <value>\n      e.g.  /pulse/2 812\n
//! ```

use crate::error::LinkError;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// The network collaborator behind the gateway.
///
/// `is_up` must be cheap and non-blocking; the engine polls it on a slow
/// cadence, decoupled from the sampling loop. `send_event` is best-effort
/// and must return without waiting for link-layer confirmation.
pub trait EventLink {
    fn is_up(&mut self) -> bool;
    fn send_event(&mut self, path: &str, value: i32);
}

/// Thin wrapper that owns the per-channel event paths.
///
/// Paths are precomputed at construction; the per-beat path is a slice
/// lookup, not a format call.
pub struct BeatGateway<L: EventLink> {
    link: L,
    paths: Vec<String>,
}

impl<L: EventLink> BeatGateway<L> {
    pub fn new(link: L, path_prefix: &str, channel_count: usize) -> Self {
        let prefix = path_prefix.trim_end_matches('/');
        let paths = (0..channel_count)
            .map(|channel| format!("{}/{}", prefix, channel))
            .collect();
        Self { link, paths }
    }

    /// Forward one beat. `channel` must be below the construction-time
    /// channel count.
    pub fn send(&mut self, channel: usize, ibi_ms: u32) {
        let value = i32::try_from(ibi_ms).unwrap_or(i32::MAX);
        self.link.send_event(&self.paths[channel], value);
    }

    /// Non-blocking readiness probe, forwarded from the link.
    pub fn poll_link(&mut self) -> bool {
        self.link.is_up()
    }

    /// Test-only view of the wrapped link.
    #[cfg(test)]
    pub fn link(&self) -> &L {
        &self.link
    }
}

/// Best-effort UDP delivery to a fixed target.
pub struct UdpLink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpLink {
    /// Bind an ephemeral local port and resolve the target once.
    pub fn new(host: &str, port: u16) -> Result<Self, LinkError> {
        let target = (host, port)
            .to_socket_addrs()
            .map_err(|e| LinkError::InvalidTarget {
                target: format!("{}:{}", host, port),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| LinkError::InvalidTarget {
                target: format!("{}:{}", host, port),
                reason: "no address resolved".to_string(),
            })?;

        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(LinkError::BindFailed)?;
        socket
            .set_nonblocking(true)
            .map_err(LinkError::BindFailed)?;

        Ok(Self { socket, target })
    }
}

impl EventLink for UdpLink {
    /// Readiness here means the kernel currently accepts the destination
    /// (a route exists). Association and handshake live below this layer.
    /// The probe runs on a scratch socket; connecting the event socket
    /// itself would make `send_to` fail on some platforms.
    fn is_up(&mut self) -> bool {
        match UdpSocket::bind(("0.0.0.0", 0)) {
            Ok(probe) => probe.connect(self.target).is_ok(),
            Err(_) => false,
        }
    }

    fn send_event(&mut self, path: &str, value: i32) {
        let datagram = format!("{} {}\n", path, value);
        if let Err(e) = self.socket.send_to(datagram.as_bytes(), self.target) {
            log::debug!("event to {} dropped: {}", path, e);
        }
    }
}
