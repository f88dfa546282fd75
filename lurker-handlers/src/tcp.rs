//! TCP handshake spoofing
//!
//! Answers opening SYNs towards targeted endpoints with a forged SYN-ACK
//! (making the port look open) or RST+ACK (tearing the attempt down), sent
//! from the SYN's destination back to the initiator.

use ipnetwork::IpNetwork;
use lurker_core::{FlowKey, MacAddr, Result};
use lurker_dispatch::{DispatchContext, Handler, HandlerResult, SpoofAction, SpoofKind};
use lurker_packet::{DecodedFrame, TcpFlags};
use rand::Rng;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Handler name
pub const NAME: &str = "tcp-spoof";

pub const DEFAULT_WINDOW: u16 = 64240;
pub const DEFAULT_TTL: u8 = 64;

/// Destinations whose SYNs are answered
///
/// An empty list matches anything on its axis, but a filter with both lists
/// empty matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpTargetFilter {
    pub networks: Vec<IpNetwork>,
    pub ports: Vec<u16>,
}

impl TcpTargetFilter {
    pub fn new(networks: Vec<IpNetwork>, ports: Vec<u16>) -> Self {
        Self { networks, ports }
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty() && self.ports.is_empty()
    }

    pub fn matches(&self, dst: &SocketAddr) -> bool {
        if self.is_empty() {
            return false;
        }
        let network_ok =
            self.networks.is_empty() || self.networks.iter().any(|net| net.contains(dst.ip()));
        let port_ok = self.ports.is_empty() || self.ports.contains(&dst.port());
        network_ok && port_ok
    }
}

/// Forged answer to a matching SYN
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TcpResponse {
    #[default]
    SynAck,
    Rst,
}

impl TcpResponse {
    fn kind(self) -> SpoofKind {
        match self {
            TcpResponse::SynAck => SpoofKind::SynAck,
            TcpResponse::Rst => SpoofKind::Rst,
        }
    }
}

impl fmt::Display for TcpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcpResponse::SynAck => write!(f, "syn-ack"),
            TcpResponse::Rst => write!(f, "rst"),
        }
    }
}

impl FromStr for TcpResponse {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "syn-ack" | "synack" => Ok(TcpResponse::SynAck),
            "rst" | "reset" => Ok(TcpResponse::Rst),
            other => Err(format!("unknown TCP response '{}' (expected syn-ack or rst)", other)),
        }
    }
}

/// Field values of forged segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpSpoofPolicy {
    pub response: TcpResponse,
    /// Fixed initial sequence number; random per flow when unset
    pub isn: Option<u32>,
    pub window: u16,
    pub ttl: u8,
    /// Source MAC of forged frames; the SYN's destination MAC when unset
    pub hw_addr: Option<MacAddr>,
}

impl Default for TcpSpoofPolicy {
    fn default() -> Self {
        Self {
            response: TcpResponse::SynAck,
            isn: None,
            window: DEFAULT_WINDOW,
            ttl: DEFAULT_TTL,
            hw_addr: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpSpoofConfig {
    pub targets: TcpTargetFilter,
    pub policy: TcpSpoofPolicy,
}

pub struct TcpSpoofHandler {
    config: TcpSpoofConfig,
    spoofed: AtomicU64,
    skipped_retransmits: AtomicU64,
}

impl TcpSpoofHandler {
    pub fn new(config: TcpSpoofConfig) -> Self {
        info!(
            networks = ?config.targets.networks,
            ports = ?config.targets.ports,
            response = %config.policy.response,
            "TCP spoofing enabled"
        );
        Self {
            config,
            spoofed: AtomicU64::new(0),
            skipped_retransmits: AtomicU64::new(0),
        }
    }

    /// SYNs answered so far
    pub fn spoofed(&self) -> u64 {
        self.spoofed.load(Ordering::Relaxed)
    }

    /// Retransmitted SYNs left alone because their flow was already answered
    pub fn skipped_retransmits(&self) -> u64 {
        self.skipped_retransmits.load(Ordering::Relaxed)
    }

    fn forge(&self, frame: &DecodedFrame<'_>, key: &FlowKey) -> Option<SpoofAction> {
        let (SocketAddr::V4(initiator), SocketAddr::V4(target)) = (key.src, key.dst) else {
            debug!(flow = %key, "IPv6 SYN not answered");
            return None;
        };
        let ethernet = frame.ethernet.as_ref()?;
        let syn = frame.tcp.as_ref()?;
        let policy = &self.config.policy;

        let (seq, ack, flags) = match policy.response {
            TcpResponse::SynAck => {
                let isn = policy.isn.unwrap_or_else(|| rand::thread_rng().gen());
                (isn, syn.sequence_number.wrapping_add(1), TcpFlags::SYN_ACK)
            }
            TcpResponse::Rst => (0, syn.sequence_number.wrapping_add(1), TcpFlags::RST_ACK),
        };

        Some(SpoofAction::TcpSegment {
            eth_src: policy.hw_addr.unwrap_or(ethernet.destination),
            eth_dst: ethernet.source,
            src: target,
            dst: initiator,
            seq,
            ack,
            flags,
            window: policy.window,
            ttl: policy.ttl,
        })
    }
}

impl Handler for TcpSpoofHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, frame: &DecodedFrame<'_>, ctx: &mut DispatchContext) -> Result<HandlerResult> {
        let Some(tcp) = frame.tcp.as_ref() else {
            return Ok(HandlerResult::Continue);
        };
        if !tcp.flags.is_initial_syn() {
            return Ok(HandlerResult::Continue);
        }
        let Some(key) = frame.flow_key() else {
            return Ok(HandlerResult::Continue);
        };
        if !self.config.targets.matches(&key.dst) {
            return Ok(HandlerResult::Continue);
        }

        let answered = ctx
            .tracker()
            .get_live(&key, frame.timestamp())
            .is_some_and(|flow| flow.spoofed.is_some());
        if answered {
            self.skipped_retransmits.fetch_add(1, Ordering::Relaxed);
            debug!(flow = %key, "SYN retransmission, already answered");
            return Ok(HandlerResult::Continue);
        }

        let Some(action) = self.forge(frame, &key) else {
            return Ok(HandlerResult::Continue);
        };

        let flow = ctx
            .tracker_mut()
            .record_spoof(key, self.config.policy.response.kind(), frame.timestamp());
        self.spoofed.fetch_add(1, Ordering::Relaxed);
        debug!(flow = %key, id = %flow.id, action = %action, "Answering SYN");
        Ok(HandlerResult::EmitSpoof(action))
    }

    fn shutdown(&self) -> Result<()> {
        info!(
            spoofed = self.spoofed(),
            retransmits = self.skipped_retransmits(),
            "TCP spoofing stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lurker_core::{LinkType, RawFrame};
    use lurker_packet::{decode, EtherType, PacketBuilder};
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::time::{Duration, UNIX_EPOCH};

    const CLIENT_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x01]);
    const ROUTER_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0xfe]);
    const CLIENT: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const SERVER: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);

    fn segment(flags: TcpFlags, seq: u32, dst_port: u16) -> RawFrame {
        let bytes = PacketBuilder::new()
            .ethernet(CLIENT_MAC, ROUTER_MAC, EtherType::IPv4)
            .ipv4(CLIENT, SERVER)
            .tcp(40000, dst_port, seq, 0, flags)
            .build()
            .unwrap();
        RawFrame::ethernet(bytes)
    }

    fn syn_at(seq: u32, secs: u64) -> RawFrame {
        let bytes = segment(TcpFlags::SYN, seq, 80).data().to_vec();
        RawFrame::with_timestamp(UNIX_EPOCH + Duration::from_secs(secs), LinkType::Ethernet, bytes)
    }

    fn config(response: TcpResponse) -> TcpSpoofConfig {
        TcpSpoofConfig {
            targets: TcpTargetFilter::new(vec!["192.168.1.0/24".parse().unwrap()], vec![80]),
            policy: TcpSpoofPolicy {
                response,
                isn: Some(0x1000_0000),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_filter_matching() {
        let dst: SocketAddr = "192.168.1.10:80".parse().unwrap();
        let other: SocketAddr = "10.9.9.9:443".parse().unwrap();

        assert!(!TcpTargetFilter::default().matches(&dst));

        let ports_only = TcpTargetFilter::new(vec![], vec![80]);
        assert!(ports_only.matches(&dst));
        assert!(!ports_only.matches(&other));

        let nets_only = TcpTargetFilter::new(vec!["192.168.0.0/16".parse().unwrap()], vec![]);
        assert!(nets_only.matches(&dst));
        assert!(!nets_only.matches(&other));

        let both = TcpTargetFilter::new(vec!["192.168.0.0/16".parse().unwrap()], vec![443]);
        assert!(!both.matches(&dst));
    }

    #[test]
    fn test_syn_gets_forged_syn_ack() {
        let handler = TcpSpoofHandler::new(config(TcpResponse::SynAck));
        let mut ctx = DispatchContext::default();
        let raw = segment(TcpFlags::SYN, 1000, 80);

        let result = handler.handle(&decode(&raw), &mut ctx).unwrap();
        match result {
            HandlerResult::EmitSpoof(SpoofAction::TcpSegment {
                eth_src,
                eth_dst,
                src,
                dst,
                seq,
                ack,
                flags,
                ..
            }) => {
                assert_eq!(eth_src, ROUTER_MAC);
                assert_eq!(eth_dst, CLIENT_MAC);
                assert_eq!(src, SocketAddrV4::new(SERVER, 80));
                assert_eq!(dst, SocketAddrV4::new(CLIENT, 40000));
                assert_eq!(seq, 0x1000_0000);
                assert_eq!(ack, 1001);
                assert_eq!(flags, TcpFlags::SYN_ACK);
            }
            other => panic!("expected forged segment, got {:?}", other),
        }

        let key = decode(&raw).flow_key().unwrap();
        let flow = ctx.tracker().get(&key).unwrap();
        assert_eq!(flow.spoofed.map(|s| s.kind), Some(SpoofKind::SynAck));
        assert_eq!(flow.initiator, key.src);
    }

    #[test]
    fn test_rst_response() {
        let handler = TcpSpoofHandler::new(config(TcpResponse::Rst));
        let mut ctx = DispatchContext::default();
        let raw = segment(TcpFlags::SYN, u32::MAX, 80);

        match handler.handle(&decode(&raw), &mut ctx).unwrap() {
            HandlerResult::EmitSpoof(SpoofAction::TcpSegment { seq, ack, flags, .. }) => {
                assert_eq!(seq, 0);
                assert_eq!(ack, 0);
                assert_eq!(flags, TcpFlags::RST_ACK);
            }
            other => panic!("expected forged segment, got {:?}", other),
        }
    }

    #[test]
    fn test_retransmitted_syn_is_not_spoofed_twice() {
        let handler = TcpSpoofHandler::new(config(TcpResponse::SynAck));
        let mut ctx = DispatchContext::default();
        let raw = segment(TcpFlags::SYN, 1000, 80);

        assert!(matches!(
            handler.handle(&decode(&raw), &mut ctx).unwrap(),
            HandlerResult::EmitSpoof(_)
        ));
        assert_eq!(handler.handle(&decode(&raw), &mut ctx).unwrap(), HandlerResult::Continue);
        assert_eq!(handler.spoofed(), 1);
        assert_eq!(handler.skipped_retransmits(), 1);
    }

    #[test]
    fn test_new_syn_after_idle_timeout_is_answered() {
        let handler = TcpSpoofHandler::new(config(TcpResponse::SynAck));
        let mut ctx = DispatchContext::new(Duration::from_secs(10));

        let first = syn_at(1000, 100);
        assert!(matches!(
            handler.handle(&decode(&first), &mut ctx).unwrap(),
            HandlerResult::EmitSpoof(_)
        ));

        // Same 4-tuple reused long after the answered flow went quiet
        let reused = syn_at(9000, 600);
        match handler.handle(&decode(&reused), &mut ctx).unwrap() {
            HandlerResult::EmitSpoof(SpoofAction::TcpSegment { ack, .. }) => assert_eq!(ack, 9001),
            other => panic!("expected forged segment, got {:?}", other),
        }
        assert_eq!(handler.spoofed(), 2);
        assert_eq!(handler.skipped_retransmits(), 0);

        let key = decode(&reused).flow_key().unwrap();
        let flow = ctx.tracker().get(&key).unwrap();
        assert_eq!(flow.spoofed.map(|s| s.at), Some(reused.timestamp));

        // Its own retransmission inside the timeout is still skipped
        let again = syn_at(9000, 601);
        assert_eq!(handler.handle(&decode(&again), &mut ctx).unwrap(), HandlerResult::Continue);
        assert_eq!(handler.skipped_retransmits(), 1);
    }

    #[test]
    fn test_non_syn_and_untargeted_segments_pass() {
        let handler = TcpSpoofHandler::new(config(TcpResponse::SynAck));
        let mut ctx = DispatchContext::default();

        for flags in [TcpFlags::SYN_ACK, TcpFlags::ACK, TcpFlags::RST, TcpFlags::FIN_ACK] {
            let raw = segment(flags, 1, 80);
            assert_eq!(handler.handle(&decode(&raw), &mut ctx).unwrap(), HandlerResult::Continue);
        }

        let raw = segment(TcpFlags::SYN, 1, 22);
        assert_eq!(handler.handle(&decode(&raw), &mut ctx).unwrap(), HandlerResult::Continue);
        assert!(ctx.tracker().is_empty());
    }

    #[test]
    fn test_policy_hw_addr_overrides_source_mac() {
        let attacker = MacAddr([0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);
        let mut cfg = config(TcpResponse::SynAck);
        cfg.policy.hw_addr = Some(attacker);
        let handler = TcpSpoofHandler::new(cfg);
        let mut ctx = DispatchContext::default();

        let raw = segment(TcpFlags::SYN, 7, 80);
        match handler.handle(&decode(&raw), &mut ctx).unwrap() {
            HandlerResult::EmitSpoof(SpoofAction::TcpSegment { eth_src, .. }) => {
                assert_eq!(eth_src, attacker)
            }
            other => panic!("expected forged segment, got {:?}", other),
        }
    }

    #[test]
    fn test_response_parsing() {
        assert_eq!("syn-ack".parse::<TcpResponse>().unwrap(), TcpResponse::SynAck);
        assert_eq!("RST".parse::<TcpResponse>().unwrap(), TcpResponse::Rst);
        assert!("fin".parse::<TcpResponse>().is_err());
    }
}
