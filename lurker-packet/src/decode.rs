//! Layered decoding of captured frames
//!
//! [`decode`] never fails. Each layer is parsed only when the one below it
//! parsed and announced it; anything truncated or malformed leaves that layer
//! and everything above it absent.

use crate::arp::ArpPacket;
use crate::ethernet::{EtherType, EthernetHeader};
use crate::ip::{IpHeader, IpProtocol, Ipv4Header, Ipv6Header};
use crate::tcp::TcpHeader;
use crate::udp::UdpHeader;
use lurker_core::{FlowKey, LinkType, RawFrame, TransportProtocol};
use std::net::SocketAddr;
use std::time::SystemTime;

/// Borrowed, layered view of one [`RawFrame`]
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    pub raw: &'a RawFrame,
    pub ethernet: Option<EthernetHeader>,
    pub arp: Option<ArpPacket>,
    pub ip: Option<IpHeader>,
    pub tcp: Option<TcpHeader>,
    pub udp: Option<UdpHeader>,
    /// Application bytes after the transport header (empty when absent)
    pub payload: &'a [u8],
}

impl<'a> DecodedFrame<'a> {
    fn empty(raw: &'a RawFrame) -> Self {
        DecodedFrame {
            raw,
            ethernet: None,
            arp: None,
            ip: None,
            tcp: None,
            udp: None,
            payload: &[],
        }
    }

    /// Capture time of the underlying frame
    pub fn timestamp(&self) -> SystemTime {
        self.raw.timestamp
    }

    /// Directional flow key for TCP and UDP frames
    pub fn flow_key(&self) -> Option<FlowKey> {
        let ip = self.ip.as_ref()?;
        let (protocol, src_port, dst_port) = match (&self.tcp, &self.udp) {
            (Some(tcp), _) => (TransportProtocol::Tcp, tcp.source_port, tcp.destination_port),
            (None, Some(udp)) => (TransportProtocol::Udp, udp.source_port, udp.destination_port),
            (None, None) => return None,
        };
        Some(FlowKey::new(
            SocketAddr::new(ip.source(), src_port),
            SocketAddr::new(ip.destination(), dst_port),
            protocol,
        ))
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}

/// Decode the layers of a captured frame
pub fn decode(raw: &RawFrame) -> DecodedFrame<'_> {
    let mut frame = DecodedFrame::empty(raw);
    if raw.link_type != LinkType::Ethernet {
        return frame;
    }

    let data = raw.data();
    let Some(ethernet) = EthernetHeader::parse(data) else {
        return frame;
    };
    frame.ethernet = Some(ethernet);
    let l3 = &data[ethernet.header_len..];

    frame.ip = match ethernet.ethertype {
        EtherType::ARP => {
            frame.arp = ArpPacket::parse(l3).ok();
            return frame;
        }
        EtherType::IPv4 => Ipv4Header::parse(l3).map(IpHeader::V4),
        EtherType::IPv6 => Ipv6Header::parse(l3).map(IpHeader::V6),
        _ => None,
    };

    let Some((protocol, l4)) = frame.ip.and_then(|ip| ip.upper_layer(l3)) else {
        return frame;
    };

    match protocol {
        IpProtocol::TCP => {
            if let Some(tcp) = TcpHeader::parse(l4) {
                frame.tcp = Some(tcp);
                frame.payload = &l4[tcp.header_len()..];
            }
        }
        IpProtocol::UDP => {
            if let Some(udp) = UdpHeader::parse(l4) {
                frame.udp = Some(udp);
                frame.payload = udp.payload(l4);
            }
        }
        _ => {}
    }

    frame
}
