//! Ethernet II frame construction and parsing

use bytes::{BufMut, BytesMut};
use lurker_core::{ethertypes, MacAddr};
use std::fmt;

/// EtherType values the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    ARP,
    /// 802.1Q VLAN tag (0x8100)
    VLAN,
    /// IPv6 (0x86DD)
    IPv6,
    /// Anything else
    Custom(u16),
}

impl EtherType {
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => ethertypes::IPV4,
            EtherType::ARP => ethertypes::ARP,
            EtherType::VLAN => ethertypes::DOT1Q,
            EtherType::IPv6 => ethertypes::IPV6,
            EtherType::Custom(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            ethertypes::IPV4 => EtherType::IPv4,
            ethertypes::ARP => EtherType::ARP,
            ethertypes::DOT1Q => EtherType::VLAN,
            ethertypes::IPV6 => EtherType::IPv6,
            val => EtherType::Custom(val),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::ARP => write!(f, "ARP"),
            EtherType::VLAN => write!(f, "VLAN"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// Parsed Ethernet header of a captured frame
///
/// A single 802.1Q tag is stripped: `ethertype` is the inner type and
/// `vlan_id` carries the tag's VID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub vlan_id: Option<u16>,
    pub ethertype: EtherType,
    /// Bytes consumed by the header, tag included
    pub header_len: usize,
}

impl EthernetHeader {
    /// Untagged header size
    pub const SIZE: usize = 14;

    /// Size of one 802.1Q tag
    pub const VLAN_TAG_SIZE: usize = 4;

    /// Parse the header at the start of `data`
    ///
    /// Returns `None` when the buffer cannot hold the header (or the tag it
    /// announces), or when the type field is an 802.3 length.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }

        let destination = MacAddr::from_slice(&data[0..6])?;
        let source = MacAddr::from_slice(&data[6..12])?;
        let mut type_field = u16::from_be_bytes([data[12], data[13]]);
        let mut header_len = Self::SIZE;
        let mut vlan_id = None;

        if type_field == ethertypes::DOT1Q {
            if data.len() < Self::SIZE + Self::VLAN_TAG_SIZE {
                return None;
            }
            let tci = u16::from_be_bytes([data[14], data[15]]);
            vlan_id = Some(tci & 0x0FFF);
            type_field = u16::from_be_bytes([data[16], data[17]]);
            header_len += Self::VLAN_TAG_SIZE;
        }

        // Values up to 1500 are 802.3 lengths, not EtherTypes
        if type_field <= 1500 {
            return None;
        }

        Some(EthernetHeader {
            destination,
            source,
            vlan_id,
            ethertype: EtherType::from_u16(type_field),
            header_len,
        })
    }
}

/// Ethernet II frame under construction
#[derive(Debug, Clone)]
pub struct EthernetFrame {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ethertype: EtherType,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Minimum frame size without FCS; shorter frames are zero-padded
    pub const MIN_FRAME_SIZE: usize = 60;

    /// Maximum frame size without FCS
    pub const MAX_FRAME_SIZE: usize = 1514;

    pub fn new(destination: MacAddr, source: MacAddr, ethertype: EtherType, payload: Vec<u8>) -> Self {
        EthernetFrame {
            destination,
            source,
            ethertype,
            payload,
        }
    }

    /// Serialize, padding to [`Self::MIN_FRAME_SIZE`]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(EthernetHeader::SIZE + self.payload.len());

        buffer.put_slice(self.destination.as_bytes());
        buffer.put_slice(self.source.as_bytes());
        buffer.put_u16(self.ethertype.to_u16());
        buffer.put_slice(&self.payload);

        let mut result = buffer.to_vec();
        if result.len() < Self::MIN_FRAME_SIZE {
            result.resize(Self::MIN_FRAME_SIZE, 0);
        }
        result
    }

    /// Serialized length, padding included
    pub fn len(&self) -> usize {
        (EthernetHeader::SIZE + self.payload.len()).max(Self::MIN_FRAME_SIZE)
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: MacAddr = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const DST: MacAddr = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

    #[test]
    fn test_ethertype_values() {
        assert_eq!(EtherType::IPv4.to_u16(), 0x0800);
        assert_eq!(EtherType::from_u16(0x0806), EtherType::ARP);
        assert_eq!(EtherType::from_u16(0x88CC), EtherType::Custom(0x88CC));
        assert_eq!(EtherType::Custom(0x88CC).to_string(), "0x88CC");
    }

    #[test]
    fn test_frame_is_padded() {
        let frame = EthernetFrame::new(DST, SRC, EtherType::ARP, vec![1, 2, 3]);
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), EthernetFrame::MIN_FRAME_SIZE);
        assert_eq!(frame.len(), EthernetFrame::MIN_FRAME_SIZE);
        assert_eq!(&bytes[0..6], DST.as_bytes());
        assert_eq!(&bytes[6..12], SRC.as_bytes());
        assert_eq!(&bytes[12..14], &[0x08, 0x06]);
        assert_eq!(&bytes[14..17], &[1, 2, 3]);
        assert!(bytes[17..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_untagged() {
        let bytes = EthernetFrame::new(DST, SRC, EtherType::IPv4, vec![0; 46]).to_bytes();
        let header = EthernetHeader::parse(&bytes).unwrap();
        assert_eq!(header.destination, DST);
        assert_eq!(header.source, SRC);
        assert_eq!(header.ethertype, EtherType::IPv4);
        assert_eq!(header.vlan_id, None);
        assert_eq!(header.header_len, 14);
    }

    #[test]
    fn test_parse_vlan_tagged() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(DST.as_bytes());
        bytes.extend_from_slice(SRC.as_bytes());
        bytes.extend_from_slice(&[0x81, 0x00, 0x20, 0x64, 0x08, 0x06]);
        bytes.extend_from_slice(&[0u8; 28]);

        let header = EthernetHeader::parse(&bytes).unwrap();
        assert_eq!(header.vlan_id, Some(100));
        assert_eq!(header.ethertype, EtherType::ARP);
        assert_eq!(header.header_len, 18);
    }

    #[test]
    fn test_parse_truncated() {
        assert!(EthernetHeader::parse(&[0u8; 13]).is_none());

        let mut tagged = vec![0u8; 12];
        tagged.extend_from_slice(&[0x81, 0x00, 0x00]);
        assert!(EthernetHeader::parse(&tagged).is_none());
    }

    #[test]
    fn test_parse_rejects_length_field() {
        let mut bytes = vec![0u8; 12];
        bytes.extend_from_slice(&[0x00, 0x2e]);
        bytes.extend_from_slice(&[0u8; 46]);
        assert!(EthernetHeader::parse(&bytes).is_none());
    }
}
