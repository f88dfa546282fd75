//! Forged frames requested by handlers

use lurker_core::{MacAddr, Result};
use lurker_packet::{ArpPacket, EtherType, PacketBuilder, TcpFlags};
use std::fmt;
use std::net::SocketAddrV4;

/// A frame a handler wants injected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoofAction {
    /// ARP reply carried in an Ethernet frame
    ArpReply {
        eth_src: MacAddr,
        eth_dst: MacAddr,
        packet: ArpPacket,
    },
    /// Bare IPv4 TCP segment (no payload)
    TcpSegment {
        eth_src: MacAddr,
        eth_dst: MacAddr,
        src: SocketAddrV4,
        dst: SocketAddrV4,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
        window: u16,
        ttl: u8,
    },
}

impl SpoofAction {
    /// Wire bytes of the forged frame
    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self {
            SpoofAction::ArpReply {
                eth_src,
                eth_dst,
                packet,
            } => PacketBuilder::new()
                .ethernet(*eth_src, *eth_dst, EtherType::ARP)
                .arp(packet)
                .build(),
            SpoofAction::TcpSegment {
                eth_src,
                eth_dst,
                src,
                dst,
                seq,
                ack,
                flags,
                window,
                ttl,
            } => PacketBuilder::new()
                .ethernet(*eth_src, *eth_dst, EtherType::IPv4)
                .ipv4(*src.ip(), *dst.ip())
                .ttl(*ttl)
                .tcp(src.port(), dst.port(), *seq, *ack, *flags)
                .window(*window)
                .build(),
        }
    }
}

impl fmt::Display for SpoofAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpoofAction::ArpReply { eth_dst, packet, .. } => write!(
                f,
                "arp reply {} is-at {} to {}",
                packet.sender_proto_addr, packet.sender_hw_addr, eth_dst
            ),
            SpoofAction::TcpSegment {
                src, dst, seq, ack, flags, ..
            } => write!(f, "tcp {} -> {} [{}] seq={} ack={}", src, dst, flags, seq, ack),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lurker_core::RawFrame;
    use lurker_packet::decode;
    use std::net::Ipv4Addr;

    const ATTACKER: MacAddr = MacAddr([0x02, 0xde, 0xad, 0xbe, 0xef, 0x01]);
    const VICTIM: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x01]);

    #[test]
    fn test_tcp_segment_serializes() {
        let action = SpoofAction::TcpSegment {
            eth_src: ATTACKER,
            eth_dst: VICTIM,
            src: "10.0.0.2:80".parse().unwrap(),
            dst: "10.0.0.1:40000".parse().unwrap(),
            seq: 0xdead_beef,
            ack: 1001,
            flags: TcpFlags::SYN_ACK,
            window: 8192,
            ttl: 64,
        };

        let raw = RawFrame::ethernet(action.serialize().unwrap());
        let frame = decode(&raw);
        let tcp = frame.tcp.unwrap();
        assert_eq!(tcp.sequence_number, 0xdead_beef);
        assert_eq!(tcp.acknowledgment_number, 1001);
        assert_eq!(tcp.flags, TcpFlags::SYN_ACK);
        assert_eq!(frame.ethernet.unwrap().source, ATTACKER);
        assert_eq!(frame.flow_key().unwrap().dst, "10.0.0.1:40000".parse().unwrap());
        assert_eq!(
            action.to_string(),
            "tcp 10.0.0.2:80 -> 10.0.0.1:40000 [SYN|ACK] seq=3735928559 ack=1001"
        );
    }

    #[test]
    fn test_arp_reply_serializes() {
        let packet = ArpPacket::new_reply(
            ATTACKER,
            Ipv4Addr::new(10, 0, 0, 254),
            VICTIM,
            Ipv4Addr::new(10, 0, 0, 1),
        );
        let action = SpoofAction::ArpReply {
            eth_src: ATTACKER,
            eth_dst: VICTIM,
            packet,
        };

        let raw = RawFrame::ethernet(action.serialize().unwrap());
        assert_eq!(decode(&raw).arp, Some(packet));
        assert!(action.to_string().contains("10.0.0.254 is-at 02:de:ad:be:ef:01"));
    }
}
