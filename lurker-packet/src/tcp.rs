//! TCP header parsing and segment construction

use crate::checksum::transport_checksum;
use bytes::{BufMut, BytesMut};
use lurker_core::ip_protocols;
use std::fmt;
use std::net::Ipv4Addr;

/// TCP control flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// FIN - No more data from sender
    pub fin: bool,
    /// SYN - Synchronize sequence numbers
    pub syn: bool,
    /// RST - Reset the connection
    pub rst: bool,
    /// PSH - Push function
    pub psh: bool,
    /// ACK - Acknowledgment field is significant
    pub ack: bool,
    /// URG - Urgent pointer field is significant
    pub urg: bool,
    /// ECE - ECN-Echo
    pub ece: bool,
    /// CWR - Congestion Window Reduced
    pub cwr: bool,
}

impl TcpFlags {
    const FIN_BIT: u8 = 0b0000_0001;
    const SYN_BIT: u8 = 0b0000_0010;
    const RST_BIT: u8 = 0b0000_0100;
    const PSH_BIT: u8 = 0b0000_1000;
    const ACK_BIT: u8 = 0b0001_0000;
    const URG_BIT: u8 = 0b0010_0000;
    const ECE_BIT: u8 = 0b0100_0000;
    const CWR_BIT: u8 = 0b1000_0000;

    pub const NONE: TcpFlags = TcpFlags::from_u8(0);
    pub const SYN: TcpFlags = TcpFlags::from_u8(Self::SYN_BIT);
    pub const SYN_ACK: TcpFlags = TcpFlags::from_u8(Self::SYN_BIT | Self::ACK_BIT);
    pub const ACK: TcpFlags = TcpFlags::from_u8(Self::ACK_BIT);
    pub const FIN_ACK: TcpFlags = TcpFlags::from_u8(Self::FIN_BIT | Self::ACK_BIT);
    pub const RST: TcpFlags = TcpFlags::from_u8(Self::RST_BIT);
    pub const RST_ACK: TcpFlags = TcpFlags::from_u8(Self::RST_BIT | Self::ACK_BIT);
    pub const PSH_ACK: TcpFlags = TcpFlags::from_u8(Self::PSH_BIT | Self::ACK_BIT);

    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.fin {
            flags |= Self::FIN_BIT;
        }
        if self.syn {
            flags |= Self::SYN_BIT;
        }
        if self.rst {
            flags |= Self::RST_BIT;
        }
        if self.psh {
            flags |= Self::PSH_BIT;
        }
        if self.ack {
            flags |= Self::ACK_BIT;
        }
        if self.urg {
            flags |= Self::URG_BIT;
        }
        if self.ece {
            flags |= Self::ECE_BIT;
        }
        if self.cwr {
            flags |= Self::CWR_BIT;
        }
        flags
    }

    pub const fn from_u8(value: u8) -> Self {
        TcpFlags {
            fin: (value & Self::FIN_BIT) != 0,
            syn: (value & Self::SYN_BIT) != 0,
            rst: (value & Self::RST_BIT) != 0,
            psh: (value & Self::PSH_BIT) != 0,
            ack: (value & Self::ACK_BIT) != 0,
            urg: (value & Self::URG_BIT) != 0,
            ece: (value & Self::ECE_BIT) != 0,
            cwr: (value & Self::CWR_BIT) != 0,
        }
    }

    /// Opening SYN of a handshake: SYN set, FIN, RST and ACK clear
    pub fn is_initial_syn(&self) -> bool {
        self.syn && !self.fin && !self.rst && !self.ack
    }

    /// SYN+ACK of a handshake
    pub fn is_syn_ack(&self) -> bool {
        self.syn && self.ack && !self.fin && !self.rst
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.fin, "FIN"),
            (self.syn, "SYN"),
            (self.rst, "RST"),
            (self.psh, "PSH"),
            (self.ack, "ACK"),
            (self.urg, "URG"),
            (self.ece, "ECE"),
            (self.cwr, "CWR"),
        ];
        let set: Vec<&str> = names.iter().filter(|(on, _)| *on).map(|(_, n)| *n).collect();
        if set.is_empty() {
            write!(f, "-")
        } else {
            write!(f, "{}", set.join("|"))
        }
    }
}

/// Parsed TCP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgment_number: u32,
    /// Header length in 32-bit words
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
}

impl TcpHeader {
    /// Header size without options
    pub const MIN_SIZE: usize = 20;

    /// Parse the header at the start of `data`
    ///
    /// Rejects data offsets below 5 and headers whose options run past the
    /// buffer.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_SIZE {
            return None;
        }

        let header = TcpHeader {
            source_port: u16::from_be_bytes([data[0], data[1]]),
            destination_port: u16::from_be_bytes([data[2], data[3]]),
            sequence_number: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            acknowledgment_number: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            data_offset: data[12] >> 4,
            flags: TcpFlags::from_u8(data[13]),
            window_size: u16::from_be_bytes([data[14], data[15]]),
            checksum: u16::from_be_bytes([data[16], data[17]]),
            urgent_pointer: u16::from_be_bytes([data[18], data[19]]),
        };

        if header.data_offset < 5 || data.len() < header.header_len() {
            return None;
        }
        Some(header)
    }

    /// Header length in bytes, options included
    pub fn header_len(&self) -> usize {
        self.data_offset as usize * 4
    }
}

/// TCP segment under construction (no options)
#[derive(Debug, Clone)]
pub struct TcpSegment {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgment_number: u32,
    pub flags: TcpFlags,
    pub window_size: u16,
    pub checksum: u16,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    pub fn new(
        source_port: u16,
        destination_port: u16,
        sequence_number: u32,
        acknowledgment_number: u32,
        flags: TcpFlags,
        window_size: u16,
        payload: Vec<u8>,
    ) -> Self {
        TcpSegment {
            source_port,
            destination_port,
            sequence_number,
            acknowledgment_number,
            flags,
            window_size,
            checksum: 0,
            payload,
        }
    }

    /// Compute the checksum over the IPv4 pseudo-header and store it
    pub fn calculate_checksum(&mut self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) {
        self.checksum = 0;
        let data = self.to_bytes();
        self.checksum = transport_checksum(&src_ip.octets(), &dst_ip.octets(), ip_protocols::TCP, &data);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(TcpHeader::MIN_SIZE + self.payload.len());

        buffer.put_u16(self.source_port);
        buffer.put_u16(self.destination_port);
        buffer.put_u32(self.sequence_number);
        buffer.put_u32(self.acknowledgment_number);
        buffer.put_u8(5 << 4);
        buffer.put_u8(self.flags.to_u8());
        buffer.put_u16(self.window_size);
        buffer.put_u16(self.checksum);
        // Urgent pointer
        buffer.put_u16(0);
        buffer.put_slice(&self.payload);

        buffer.to_vec()
    }
}
