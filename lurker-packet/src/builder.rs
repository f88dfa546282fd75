//! Packet builder with a fluent API for forged frames
//!
//! Layers are assembled inside-out: TCP, then IPv4, then Ethernet. ARP
//! packets go straight into the Ethernet payload.

use crate::arp::ArpPacket;
use crate::ethernet::{EtherType, EthernetFrame};
use crate::ip::{IpProtocol, Ipv4Packet};
use crate::tcp::{TcpFlags, TcpSegment};
use lurker_core::{Error, MacAddr, Result};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy)]
struct Layer2 {
    src: MacAddr,
    dst: MacAddr,
    ethertype: EtherType,
}

#[derive(Debug, Clone, Copy)]
struct Layer3 {
    src: Ipv4Addr,
    dst: Ipv4Addr,
    ttl: u8,
}

#[derive(Debug, Clone, Copy)]
struct Layer4 {
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    flags: TcpFlags,
    window: u16,
}

/// Fluent builder for Ethernet frames carrying ARP or IPv4/TCP
///
/// ```
/// use std::net::Ipv4Addr;
/// use lurker_core::MacAddr;
/// use lurker_packet::{EtherType, PacketBuilder, TcpFlags};
///
/// let frame = PacketBuilder::new()
///     .ethernet(MacAddr([0, 0x11, 0x22, 0x33, 0x44, 0x55]), MacAddr::BROADCAST, EtherType::IPv4)
///     .ipv4(Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1))
///     .tcp(80, 40000, 7, 1001, TcpFlags::SYN_ACK)
///     .build()
///     .unwrap();
/// assert_eq!(frame.len(), 60);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    layer2: Option<Layer2>,
    layer3: Option<Layer3>,
    layer4: Option<Layer4>,
    payload: Vec<u8>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an Ethernet layer
    pub fn ethernet(mut self, src: MacAddr, dst: MacAddr, ethertype: EtherType) -> Self {
        self.layer2 = Some(Layer2 { src, dst, ethertype });
        self
    }

    /// Use an ARP packet as the Ethernet payload
    pub fn arp(mut self, packet: &ArpPacket) -> Self {
        self.payload = packet.serialize();
        self
    }

    /// Add an IPv4 layer with TTL 64
    pub fn ipv4(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        self.layer3 = Some(Layer3 {
            src,
            dst,
            ttl: 64,
        });
        self
    }

    /// Set the TTL; must be called after `ipv4()`
    pub fn ttl(mut self, new_ttl: u8) -> Self {
        if let Some(Layer3 { ref mut ttl, .. }) = self.layer3 {
            *ttl = new_ttl;
        }
        self
    }

    /// Add a TCP layer with a 65535 window
    pub fn tcp(mut self, src_port: u16, dst_port: u16, seq: u32, ack: u32, flags: TcpFlags) -> Self {
        self.layer4 = Some(Layer4 {
            src_port,
            dst_port,
            seq,
            ack,
            flags,
            window: 65535,
        });
        self
    }

    /// Set the TCP window; must be called after `tcp()`
    pub fn window(mut self, new_window: u16) -> Self {
        if let Some(Layer4 { ref mut window, .. }) = self.layer4 {
            *window = new_window;
        }
        self
    }

    pub fn payload(mut self, data: Vec<u8>) -> Self {
        self.payload = data;
        self
    }

    /// Assemble the frame
    ///
    /// # Errors
    ///
    /// [`Error::PacketConstruction`] when a layer is missing its carrier
    /// (TCP without IPv4, anything without Ethernet) or the packet would
    /// exceed the IPv4 size limit.
    pub fn build(self) -> Result<Vec<u8>> {
        let mut packet_data = self.payload;

        if let Some(l4) = self.layer4 {
            let l3 = self
                .layer3
                .as_ref()
                .ok_or_else(|| Error::PacketConstruction("TCP layer requires an IPv4 layer".into()))?;

            let mut tcp = TcpSegment::new(
                l4.src_port,
                l4.dst_port,
                l4.seq,
                l4.ack,
                l4.flags,
                l4.window,
                packet_data,
            );
            tcp.calculate_checksum(l3.src, l3.dst);
            packet_data = tcp.to_bytes();
        }

        if let Some(l3) = self.layer3 {
            let protocol = match self.layer4 {
                Some(_) => IpProtocol::TCP,
                None => IpProtocol::Custom(0),
            };

            let ip = Ipv4Packet::new(l3.src, l3.dst, protocol, packet_data).with_ttl(l3.ttl);
            if ip.total_length() > Ipv4Packet::MAX_PACKET_SIZE {
                return Err(Error::PacketConstruction(format!(
                    "IPv4 packet of {} bytes exceeds the maximum size",
                    ip.total_length()
                )));
            }
            packet_data = ip.to_bytes();
        }

        let l2 = self
            .layer2
            .ok_or_else(|| Error::PacketConstruction("Ethernet layer is required".into()))?;

        Ok(EthernetFrame::new(l2.dst, l2.src, l2.ethertype, packet_data).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethernet::EthernetHeader;
    use crate::ip::Ipv4Header;
    use crate::tcp::TcpHeader;

    const SRC_MAC: MacAddr = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const DST_MAC: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn test_builder_tcp_frame() {
        let packet = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::IPv4)
            .ipv4(Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1))
            .ttl(128)
            .tcp(80, 40000, 5000, 1001, TcpFlags::SYN_ACK)
            .window(1024)
            .build()
            .unwrap();

        assert_eq!(packet.len(), 60);

        let eth = EthernetHeader::parse(&packet).unwrap();
        assert_eq!(eth.source, SRC_MAC);
        assert_eq!(eth.destination, DST_MAC);

        let ip = Ipv4Header::parse(&packet[14..]).unwrap();
        assert_eq!(ip.ttl, 128);
        assert_eq!(ip.total_length, 40);

        let tcp = TcpHeader::parse(&packet[34..]).unwrap();
        assert_eq!(tcp.source_port, 80);
        assert_eq!(tcp.sequence_number, 5000);
        assert_eq!(tcp.acknowledgment_number, 1001);
        assert_eq!(tcp.flags, TcpFlags::SYN_ACK);
        assert_eq!(tcp.window_size, 1024);
    }

    #[test]
    fn test_builder_arp_frame() {
        let reply = ArpPacket::new_reply(
            SRC_MAC,
            Ipv4Addr::new(10, 0, 0, 254),
            DST_MAC,
            Ipv4Addr::new(10, 0, 0, 1),
        );
        let packet = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::ARP)
            .arp(&reply)
            .build()
            .unwrap();

        assert_eq!(packet.len(), 60);
        assert_eq!(ArpPacket::parse(&packet[14..]).unwrap(), reply);
    }

    #[test]
    fn test_builder_tcp_without_ip() {
        let result = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::IPv4)
            .tcp(1, 2, 0, 0, TcpFlags::RST)
            .build();
        assert!(matches!(result, Err(Error::PacketConstruction(_))));
    }

    #[test]
    fn test_builder_requires_ethernet() {
        let result = PacketBuilder::new()
            .ipv4(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST)
            .build();
        assert!(matches!(result, Err(Error::PacketConstruction(_))));
    }
}
