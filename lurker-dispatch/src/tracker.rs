//! TCP connection tracking
//!
//! One [`FlowState`] per bidirectional flow, keyed by the canonical
//! [`FlowKey`]. The state machine only looks at flags and direction:
//!
//! ```text
//! INIT --SYN--> SYN_SENT --SYN+ACK (responder)--> ESTABLISHING
//! ESTABLISHING --ACK (initiator)--> ESTABLISHED --FIN (either)--> CLOSING
//! ESTABLISHING --FIN+ACK (initiator)--> CLOSING
//! CLOSING --FIN (other side)--> CLOSED
//! any non-terminal --RST--> CLOSED
//! ```

use lurker_core::FlowKey;
use lurker_packet::{DecodedFrame, TcpFlags};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};
use tracing::debug;
use uuid::Uuid;

/// Connection state of a tracked flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpState {
    Init,
    SynSent,
    Establishing,
    Established,
    Closing,
    Closed,
}

impl TcpState {
    pub fn is_terminal(self) -> bool {
        self == TcpState::Closed
    }
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TcpState::Init => "INIT",
            TcpState::SynSent => "SYN_SENT",
            TcpState::Establishing => "ESTABLISHING",
            TcpState::Established => "ESTABLISHED",
            TcpState::Closing => "CLOSING",
            TcpState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Kind of forged answer sent for a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpoofKind {
    SynAck,
    Rst,
}

impl fmt::Display for SpoofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpoofKind::SynAck => write!(f, "syn-ack"),
            SpoofKind::Rst => write!(f, "rst"),
        }
    }
}

/// The parts of a TCP segment the tracker needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpObservation {
    pub flags: TcpFlags,
    pub sequence: u32,
    pub acknowledgment: u32,
    pub payload_len: usize,
    pub at: SystemTime,
}

impl TcpObservation {
    /// Directional key and observation of a decoded TCP frame
    pub fn from_frame(frame: &DecodedFrame<'_>) -> Option<(FlowKey, Self)> {
        let tcp = frame.tcp.as_ref()?;
        let key = frame.flow_key()?;
        Some((
            key,
            TcpObservation {
                flags: tcp.flags,
                sequence: tcp.sequence_number,
                acknowledgment: tcp.acknowledgment_number,
                payload_len: frame.payload.len(),
                at: frame.timestamp(),
            },
        ))
    }
}

/// Packet and byte counts for one direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionCounters {
    pub packets: u64,
    /// Payload bytes, headers excluded
    pub bytes: u64,
}

/// Spoof decision recorded on a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpoofRecord {
    pub kind: SpoofKind,
    pub at: SystemTime,
}

/// Tracked state of one bidirectional flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowState {
    /// Time-ordered id, used to correlate log records with the flow
    pub id: Uuid,
    /// Canonical key
    pub key: FlowKey,
    /// Endpoint that sent the opening SYN
    pub initiator: SocketAddr,
    pub state: TcpState,
    pub syn_seq: Option<u32>,
    pub syn_ack_seq: Option<u32>,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    pub from_initiator: DirectionCounters,
    pub from_responder: DirectionCounters,
    pub spoofed: Option<SpoofRecord>,
    /// Endpoint whose FIN moved the flow to CLOSING
    pub first_fin: Option<SocketAddr>,
}

impl FlowState {
    fn new(initiator_key: FlowKey, at: SystemTime) -> Self {
        Self {
            id: Uuid::now_v7(),
            key: initiator_key.canonical(),
            initiator: initiator_key.src,
            state: TcpState::Init,
            syn_seq: None,
            syn_ack_seq: None,
            first_seen: at,
            last_seen: at,
            from_initiator: DirectionCounters::default(),
            from_responder: DirectionCounters::default(),
            spoofed: None,
            first_fin: None,
        }
    }

    /// The non-initiating endpoint
    pub fn responder(&self) -> SocketAddr {
        if self.key.src == self.initiator {
            self.key.dst
        } else {
            self.key.src
        }
    }

    /// Whether nothing was seen on the flow for longer than `timeout`
    pub fn is_idle(&self, now: SystemTime, timeout: Duration) -> bool {
        now.duration_since(self.last_seen)
            .map(|idle| idle > timeout)
            .unwrap_or(false)
    }

    fn apply(&mut self, key: &FlowKey, segment: &TcpObservation) {
        let from_initiator = key.src == self.initiator;
        let counters = if from_initiator {
            &mut self.from_initiator
        } else {
            &mut self.from_responder
        };
        counters.packets += 1;
        counters.bytes += segment.payload_len as u64;
        if segment.at > self.last_seen {
            self.last_seen = segment.at;
        }

        let flags = segment.flags;
        let next = match self.state {
            state if flags.rst && !state.is_terminal() => TcpState::Closed,
            TcpState::Init if from_initiator && flags.is_initial_syn() => {
                self.syn_seq = Some(segment.sequence);
                TcpState::SynSent
            }
            TcpState::SynSent if !from_initiator && flags.is_syn_ack() => {
                self.syn_ack_seq = Some(segment.sequence);
                TcpState::Establishing
            }
            // The handshake ACK may already carry the initiator's FIN
            TcpState::Establishing if from_initiator && flags.ack && !flags.syn => {
                if flags.fin {
                    self.first_fin = Some(key.src);
                    TcpState::Closing
                } else {
                    TcpState::Established
                }
            }
            TcpState::Established if flags.fin => {
                self.first_fin = Some(key.src);
                TcpState::Closing
            }
            TcpState::Closing if flags.fin && self.first_fin != Some(key.src) => TcpState::Closed,
            state => state,
        };

        if next != self.state {
            debug!(flow = %self.key, id = %self.id, from = %self.state, to = %next, "flow transition");
            self.state = next;
        }
    }
}

/// Table of tracked TCP flows
#[derive(Debug)]
pub struct ConnectionTracker {
    flows: HashMap<FlowKey, FlowState>,
    idle_timeout: Duration,
}

impl ConnectionTracker {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            flows: HashMap::new(),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Apply one segment and return a snapshot of the resulting state
    ///
    /// Returns `None` for a segment of an untracked flow that is not an
    /// opening SYN. An entry found idle is evicted before the segment is
    /// applied; an entry reaching CLOSED is removed after the snapshot.
    pub fn observe(&mut self, key: FlowKey, segment: &TcpObservation) -> Option<FlowState> {
        let canonical = key.canonical();
        self.evict_if_idle(&canonical, segment.at);

        if !self.flows.contains_key(&canonical) {
            if !segment.flags.is_initial_syn() {
                return None;
            }
            let flow = FlowState::new(key, segment.at);
            debug!(flow = %canonical, id = %flow.id, initiator = %flow.initiator, "tracking new flow");
            self.flows.insert(canonical, flow);
        }

        let flow = self.flows.get_mut(&canonical)?;
        flow.apply(&key, segment);
        let snapshot = flow.clone();
        if snapshot.state.is_terminal() {
            self.flows.remove(&canonical);
        }
        Some(snapshot)
    }

    /// Current state of the flow `key` belongs to, in either direction
    ///
    /// Entries past the idle timeout stay visible until swept; readers acting
    /// on a frame use [`get_live`](Self::get_live).
    pub fn get(&self, key: &FlowKey) -> Option<&FlowState> {
        self.flows.get(&key.canonical())
    }

    /// Like [`get`](Self::get), but an entry idle at `now` counts as absent
    pub fn get_live(&self, key: &FlowKey, now: SystemTime) -> Option<&FlowState> {
        self.get(key).filter(|flow| !flow.is_idle(now, self.idle_timeout))
    }

    /// Record that a forged answer was sent for the flow opened by `key`
    ///
    /// Creates an INIT entry with `key.src` as initiator when the flow is not
    /// tracked yet.
    pub fn record_spoof(&mut self, key: FlowKey, kind: SpoofKind, at: SystemTime) -> &FlowState {
        let canonical = key.canonical();
        self.evict_if_idle(&canonical, at);

        let flow = self
            .flows
            .entry(canonical)
            .or_insert_with(|| FlowState::new(key, at));
        flow.spoofed = Some(SpoofRecord { kind, at });
        flow
    }

    /// Drop every flow idle for longer than the timeout at `now`
    pub fn evict_idle(&mut self, now: SystemTime) -> usize {
        let timeout = self.idle_timeout;
        let before = self.flows.len();
        self.flows.retain(|key, flow| {
            let keep = !flow.is_idle(now, timeout);
            if !keep {
                debug!(flow = %key, id = %flow.id, state = %flow.state, "evicting idle flow");
            }
            keep
        });
        before - self.flows.len()
    }

    fn evict_if_idle(&mut self, canonical: &FlowKey, now: SystemTime) {
        let idle = self
            .flows
            .get(canonical)
            .map(|flow| flow.is_idle(now, self.idle_timeout))
            .unwrap_or(false);
        if idle {
            debug!(flow = %canonical, "evicting idle flow before update");
            self.flows.remove(canonical);
        }
    }

    /// Number of tracked flows
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowState> {
        self.flows.values()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
