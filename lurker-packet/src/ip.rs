//! IPv4/IPv6 header parsing and IPv4 packet construction

use crate::checksum::internet_checksum;
use bytes::{BufMut, BytesMut};
use lurker_core::ip_protocols;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// IP protocol / IPv6 next-header numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// ICMPv6 (58)
    ICMPv6,
    /// Any other protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::ICMP => 1,
            IpProtocol::TCP => ip_protocols::TCP,
            IpProtocol::UDP => ip_protocols::UDP,
            IpProtocol::ICMPv6 => 58,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            ip_protocols::TCP => IpProtocol::TCP,
            ip_protocols::UDP => IpProtocol::UDP,
            58 => IpProtocol::ICMPv6,
            val => IpProtocol::Custom(val),
        }
    }
}

/// IPv4 flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpFlags {
    /// Reserved bit (must be 0)
    pub reserved: bool,
    /// Don't Fragment
    pub dont_fragment: bool,
    /// More Fragments
    pub more_fragments: bool,
}

impl IpFlags {
    /// No flags set
    pub const NONE: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: false,
        more_fragments: false,
    };

    /// Don't Fragment set
    pub const DONT_FRAGMENT: IpFlags = IpFlags {
        reserved: false,
        dont_fragment: true,
        more_fragments: false,
    };

    /// Convert to 3-bit value
    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.reserved {
            flags |= 0b100;
        }
        if self.dont_fragment {
            flags |= 0b010;
        }
        if self.more_fragments {
            flags |= 0b001;
        }
        flags
    }

    /// Parse from 3-bit value
    pub fn from_u8(value: u8) -> Self {
        IpFlags {
            reserved: (value & 0b100) != 0,
            dont_fragment: (value & 0b010) != 0,
            more_fragments: (value & 0b001) != 0,
        }
    }
}

/// Parsed IPv4 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Header length in 32-bit words
    pub ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: IpFlags,
    /// Fragment offset in 8-byte blocks
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    /// Header size without options
    pub const MIN_SIZE: usize = 20;

    /// Parse the header at the start of `data`
    ///
    /// Rejects wrong versions, IHL below 5, buffers shorter than the header
    /// and total lengths that do not cover the header.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_SIZE {
            return None;
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;
        if version != 4 || ihl < 5 {
            return None;
        }

        let header = Ipv4Header {
            ihl,
            tos: data[1],
            total_length: u16::from_be_bytes([data[2], data[3]]),
            identification: u16::from_be_bytes([data[4], data[5]]),
            flags: IpFlags::from_u8(data[6] >> 5),
            fragment_offset: u16::from_be_bytes([data[6], data[7]]) & 0x1FFF,
            ttl: data[8],
            protocol: IpProtocol::from_u8(data[9]),
            checksum: u16::from_be_bytes([data[10], data[11]]),
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
        };

        if data.len() < header.header_len() || (header.total_length as usize) < header.header_len() {
            return None;
        }
        Some(header)
    }

    /// Header length in bytes, options included
    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    /// Whether this datagram is a piece of a fragmented one
    pub fn is_fragment(&self) -> bool {
        self.flags.more_fragments || self.fragment_offset != 0
    }

    /// Transport protocol and bytes of an unfragmented datagram
    ///
    /// `data` is the whole IPv4 datagram as captured. The slice ends at
    /// `total_length` (dropping link-layer padding) or at the end of the
    /// captured bytes, whichever comes first.
    pub fn upper_layer<'a>(&self, data: &'a [u8]) -> Option<(IpProtocol, &'a [u8])> {
        if self.is_fragment() {
            return None;
        }
        let end = (self.total_length as usize).min(data.len());
        let start = self.header_len();
        if start > end {
            return None;
        }
        Some((self.protocol, &data[start..end]))
    }
}

/// Parsed fixed IPv6 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
}

impl Ipv6Header {
    /// Fixed header size
    pub const SIZE: usize = 40;

    const HOP_BY_HOP: u8 = 0;
    const ROUTING: u8 = 43;
    const FRAGMENT: u8 = 44;
    const DESTINATION_OPTIONS: u8 = 60;

    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || data[0] >> 4 != 6 {
            return None;
        }

        let word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let mut source = [0u8; 16];
        source.copy_from_slice(&data[8..24]);
        let mut destination = [0u8; 16];
        destination.copy_from_slice(&data[24..40]);

        Some(Ipv6Header {
            traffic_class: ((word >> 20) & 0xFF) as u8,
            flow_label: word & 0x000F_FFFF,
            payload_length: u16::from_be_bytes([data[4], data[5]]),
            next_header: data[6],
            hop_limit: data[7],
            source: Ipv6Addr::from(source),
            destination: Ipv6Addr::from(destination),
        })
    }

    /// Upper-layer protocol and bytes, past any extension headers
    ///
    /// Hop-by-hop, routing and destination-options headers are skipped.
    /// A fragment header, or an extension header running past the captured
    /// bytes, yields `None`.
    pub fn upper_layer<'a>(&self, data: &'a [u8]) -> Option<(IpProtocol, &'a [u8])> {
        let end = (Self::SIZE + self.payload_length as usize).min(data.len());
        let mut offset = Self::SIZE;
        let mut next = self.next_header;

        loop {
            match next {
                Self::HOP_BY_HOP | Self::ROUTING | Self::DESTINATION_OPTIONS => {
                    if offset + 2 > end {
                        return None;
                    }
                    let ext_len = (data[offset + 1] as usize + 1) * 8;
                    next = data[offset];
                    offset += ext_len;
                }
                Self::FRAGMENT => return None,
                protocol => {
                    if offset > end {
                        return None;
                    }
                    return Some((IpProtocol::from_u8(protocol), &data[offset..end]));
                }
            }
        }
    }
}

/// Parsed network-layer header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpHeader {
    V4(Ipv4Header),
    V6(Ipv6Header),
}

impl IpHeader {
    pub fn source(&self) -> IpAddr {
        match self {
            IpHeader::V4(h) => IpAddr::V4(h.source),
            IpHeader::V6(h) => IpAddr::V6(h.source),
        }
    }

    pub fn destination(&self) -> IpAddr {
        match self {
            IpHeader::V4(h) => IpAddr::V4(h.destination),
            IpHeader::V6(h) => IpAddr::V6(h.destination),
        }
    }

    /// TTL or hop limit
    pub fn ttl(&self) -> u8 {
        match self {
            IpHeader::V4(h) => h.ttl,
            IpHeader::V6(h) => h.hop_limit,
        }
    }

    pub fn upper_layer<'a>(&self, data: &'a [u8]) -> Option<(IpProtocol, &'a [u8])> {
        match self {
            IpHeader::V4(h) => h.upper_layer(data),
            IpHeader::V6(h) => h.upper_layer(data),
        }
    }
}

/// IPv4 packet under construction
#[derive(Debug, Clone)]
pub struct Ipv4Packet {
    pub tos: u8,
    pub identification: u16,
    pub flags: IpFlags,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub payload: Vec<u8>,
}

impl Ipv4Packet {
    /// Maximum IPv4 packet size
    pub const MAX_PACKET_SIZE: usize = 65535;

    /// New packet with TTL 64, DF set and no options
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr, protocol: IpProtocol, payload: Vec<u8>) -> Self {
        Ipv4Packet {
            tos: 0,
            identification: 0,
            flags: IpFlags::DONT_FRAGMENT,
            ttl: 64,
            protocol,
            source,
            destination,
            payload,
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn total_length(&self) -> usize {
        Ipv4Header::MIN_SIZE + self.payload.len()
    }

    fn header_bytes(&self, checksum: u16) -> BytesMut {
        let mut buffer = BytesMut::with_capacity(self.total_length());

        buffer.put_u8(0x45);
        buffer.put_u8(self.tos);
        buffer.put_u16(self.total_length() as u16);
        buffer.put_u16(self.identification);
        buffer.put_u16((self.flags.to_u8() as u16) << 13);
        buffer.put_u8(self.ttl);
        buffer.put_u8(self.protocol.to_u8());
        buffer.put_u16(checksum);
        buffer.put_slice(&self.source.octets());
        buffer.put_slice(&self.destination.octets());

        buffer
    }

    /// Serialize with a freshly computed header checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let checksum = internet_checksum(&self.header_bytes(0));
        let mut buffer = self.header_bytes(checksum);
        buffer.put_slice(&self.payload);
        buffer.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::validate_checksum;

    fn sample_packet() -> Vec<u8> {
        Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            IpProtocol::TCP,
            vec![0xAB; 20],
        )
        .to_bytes()
    }

    #[test]
    fn test_ip_protocol_conversion() {
        assert_eq!(IpProtocol::TCP.to_u8(), 6);
        assert_eq!(IpProtocol::from_u8(17), IpProtocol::UDP);
        assert_eq!(IpProtocol::from_u8(200), IpProtocol::Custom(200));
    }

    #[test]
    fn test_ip_flags() {
        assert_eq!(IpFlags::DONT_FRAGMENT.to_u8(), 0b010);
        assert!(IpFlags::from_u8(0b001).more_fragments);
    }

    #[test]
    fn test_ipv4_packet_to_bytes() {
        let bytes = sample_packet();
        assert_eq!(bytes.len(), 40);
        assert_eq!(bytes[0], 0x45);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 40);
        assert_eq!(bytes[6], 0x40);
        assert_eq!(bytes[8], 64);
        assert_eq!(bytes[9], 6);
        assert!(validate_checksum(&bytes[..20]));
    }

    #[test]
    fn test_parse_ipv4_header() {
        let bytes = sample_packet();
        let header = Ipv4Header::parse(&bytes).unwrap();
        assert_eq!(header.source, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(header.destination, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(header.protocol, IpProtocol::TCP);
        assert!(header.flags.dont_fragment);
        assert!(!header.is_fragment());
    }

    #[test]
    fn test_upper_layer_strips_padding() {
        let mut bytes = sample_packet();
        bytes.extend_from_slice(&[0u8; 6]);
        let header = Ipv4Header::parse(&bytes).unwrap();
        let (protocol, payload) = header.upper_layer(&bytes).unwrap();
        assert_eq!(protocol, IpProtocol::TCP);
        assert_eq!(payload.len(), 20);
    }

    #[test]
    fn test_upper_layer_clamps_to_captured_bytes() {
        let bytes = sample_packet();
        let header = Ipv4Header::parse(&bytes).unwrap();
        let (_, payload) = header.upper_layer(&bytes[..30]).unwrap();
        assert_eq!(payload.len(), 10);
    }

    #[test]
    fn test_fragment_has_no_upper_layer() {
        let mut packet = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            IpProtocol::UDP,
            vec![0; 16],
        );
        packet.flags = IpFlags::from_u8(0b001);
        let bytes = packet.to_bytes();

        let header = Ipv4Header::parse(&bytes).unwrap();
        assert!(header.is_fragment());
        assert!(header.upper_layer(&bytes).is_none());
    }

    #[test]
    fn test_parse_rejects_bad_headers() {
        assert!(Ipv4Header::parse(&[0x45; 10]).is_none());

        let mut v6 = sample_packet();
        v6[0] = 0x65;
        assert!(Ipv4Header::parse(&v6).is_none());

        let mut short_total = sample_packet();
        short_total[2] = 0;
        short_total[3] = 10;
        assert!(Ipv4Header::parse(&short_total).is_none());
    }

    fn ipv6_packet(next_header: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x60, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        bytes.push(next_header);
        bytes.push(64);
        bytes.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        bytes.extend_from_slice(&"fe80::1".parse::<Ipv6Addr>().unwrap().octets());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_ipv6_skips_extension_headers() {
        // Hop-by-hop header (8 bytes) announcing TCP
        let mut payload = vec![6, 0, 0, 0, 0, 0, 0, 0];
        payload.extend_from_slice(&[0xCD; 20]);
        let bytes = ipv6_packet(0, &payload);

        let header = Ipv6Header::parse(&bytes).unwrap();
        assert_eq!(header.hop_limit, 64);
        assert_eq!(header.source, Ipv6Addr::LOCALHOST);

        let (protocol, upper) = header.upper_layer(&bytes).unwrap();
        assert_eq!(protocol, IpProtocol::TCP);
        assert_eq!(upper.len(), 20);
    }

    #[test]
    fn test_ipv6_fragment_header_stops() {
        let bytes = ipv6_packet(44, &[6, 0, 0, 1, 0, 0, 0, 1]);
        let header = Ipv6Header::parse(&bytes).unwrap();
        assert!(header.upper_layer(&bytes).is_none());
    }

    #[test]
    fn test_ipv6_truncated_extension_header() {
        let bytes = ipv6_packet(60, &[6]);
        let header = Ipv6Header::parse(&bytes).unwrap();
        assert!(header.upper_layer(&bytes).is_none());
    }
}
