//! Flow identity

use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;

/// Transport protocol of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    Tcp,
    Udp,
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportProtocol::Tcp => write!(f, "tcp"),
            TransportProtocol::Udp => write!(f, "udp"),
        }
    }
}

/// Directional 5-tuple as seen on one frame
///
/// The same conversation shows up as two keys, one per direction.
/// [`FlowKey::canonical`] folds them onto a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FlowKey {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub protocol: TransportProtocol,
}

impl FlowKey {
    pub fn new(src: SocketAddr, dst: SocketAddr, protocol: TransportProtocol) -> Self {
        Self { src, dst, protocol }
    }

    /// Shorthand for a TCP key
    pub fn tcp(src: SocketAddr, dst: SocketAddr) -> Self {
        Self::new(src, dst, TransportProtocol::Tcp)
    }

    /// The same flow seen from the other direction
    pub fn reversed(&self) -> Self {
        Self {
            src: self.dst,
            dst: self.src,
            protocol: self.protocol,
        }
    }

    /// Direction-independent key: smaller endpoint first
    pub fn canonical(&self) -> Self {
        if self.is_canonical() {
            *self
        } else {
            self.reversed()
        }
    }

    /// Whether `src` already sorts before (or equal to) `dst`
    pub fn is_canonical(&self) -> bool {
        self.src <= self.dst
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.src, self.dst, self.protocol)
    }
}
