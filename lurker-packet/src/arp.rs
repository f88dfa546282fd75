//! ARP packet structure and parsing (Ethernet/IPv4 only)

use bytes::{BufMut, BytesMut};
use lurker_core::{Error, MacAddr, Result};
use std::fmt;
use std::net::Ipv4Addr;

/// Hardware type for Ethernet
pub const HTYPE_ETHERNET: u16 = 1;

/// Protocol type for IPv4
pub const PTYPE_IPV4: u16 = 0x0800;

/// ARP operation code as carried on the wire
///
/// Kept as a raw value so unknown opcodes still decode; compare against the
/// named constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArpOperation(pub u16);

impl ArpOperation {
    pub const REQUEST: ArpOperation = ArpOperation(1);
    pub const REPLY: ArpOperation = ArpOperation(2);
}

impl fmt::Display for ArpOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ArpOperation::REQUEST => write!(f, "request"),
            ArpOperation::REPLY => write!(f, "reply"),
            ArpOperation(other) => write!(f, "op {}", other),
        }
    }
}

/// ARP packet for Ethernet hardware and IPv4 protocol addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub operation: ArpOperation,
    pub sender_hw_addr: MacAddr,
    pub sender_proto_addr: Ipv4Addr,
    pub target_hw_addr: MacAddr,
    pub target_proto_addr: Ipv4Addr,
}

impl ArpPacket {
    /// Wire size of an Ethernet/IPv4 ARP packet
    pub const SIZE: usize = 28;

    /// Request asking who has `target_ip`
    pub fn new_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            operation: ArpOperation::REQUEST,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: MacAddr::ZERO,
            target_proto_addr: target_ip,
        }
    }

    /// Reply stating that `sender_ip` is at `sender_mac`
    pub fn new_reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            operation: ArpOperation::REPLY,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: target_mac,
            target_proto_addr: target_ip,
        }
    }

    /// Parse an ARP packet from bytes
    ///
    /// Only hardware type 1 / protocol type 0x0800 with 6- and 4-byte
    /// addresses is accepted.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::PacketParsing("ARP packet too short".to_string()));
        }

        let htype = u16::from_be_bytes([data[0], data[1]]);
        let ptype = u16::from_be_bytes([data[2], data[3]]);
        let (hlen, plen) = (data[4], data[5]);
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != 6 || plen != 4 {
            return Err(Error::PacketParsing(format!(
                "unsupported ARP format htype={} ptype=0x{:04x} hlen={} plen={}",
                htype, ptype, hlen, plen
            )));
        }

        let mut sender_hw = [0u8; 6];
        sender_hw.copy_from_slice(&data[8..14]);
        let mut target_hw = [0u8; 6];
        target_hw.copy_from_slice(&data[18..24]);

        Ok(Self {
            operation: ArpOperation(u16::from_be_bytes([data[6], data[7]])),
            sender_hw_addr: MacAddr(sender_hw),
            sender_proto_addr: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            target_hw_addr: MacAddr(target_hw),
            target_proto_addr: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);

        buf.put_u16(HTYPE_ETHERNET);
        buf.put_u16(PTYPE_IPV4);
        buf.put_u8(6);
        buf.put_u8(4);
        buf.put_u16(self.operation.0);
        buf.put_slice(self.sender_hw_addr.as_bytes());
        buf.put_slice(&self.sender_proto_addr.octets());
        buf.put_slice(self.target_hw_addr.as_bytes());
        buf.put_slice(&self.target_proto_addr.octets());

        buf.to_vec()
    }

    pub fn is_request(&self) -> bool {
        self.operation == ArpOperation::REQUEST
    }

    pub fn is_reply(&self) -> bool {
        self.operation == ArpOperation::REPLY
    }

    /// Announcement of the sender's own address (sender IP == target IP)
    pub fn is_gratuitous(&self) -> bool {
        self.sender_proto_addr == self.target_proto_addr
    }
}
