//! Frame decoding and packet construction for lurker
//!
//! Two directions over the same wire formats:
//!
//! - [`decode`] turns a captured [`lurker_core::RawFrame`] into a
//!   [`DecodedFrame`], a borrowed view with optional Ethernet, ARP, IPv4/IPv6,
//!   TCP and UDP layers. It never fails; malformed layers are simply absent.
//! - [`PacketBuilder`] assembles forged Ethernet frames carrying ARP or
//!   IPv4/TCP, filling in lengths and checksums.
//!
//! # Building a forged SYN-ACK
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use lurker_core::MacAddr;
//! use lurker_packet::{decode, EtherType, PacketBuilder, TcpFlags};
//!
//! let bytes = PacketBuilder::new()
//!     .ethernet(MacAddr([0x02, 0, 0, 0, 0, 0x02]), MacAddr([0x02, 0, 0, 0, 0, 0x01]), EtherType::IPv4)
//!     .ipv4(Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1))
//!     .tcp(80, 40000, 0x1234_5678, 1001, TcpFlags::SYN_ACK)
//!     .build()
//!     .unwrap();
//!
//! let raw = lurker_core::RawFrame::ethernet(bytes);
//! let frame = decode(&raw);
//! assert_eq!(frame.tcp.unwrap().acknowledgment_number, 1001);
//! ```

pub mod arp;
pub mod builder;
pub mod checksum;
pub mod decode;
pub mod ethernet;
pub mod ip;
pub mod tcp;
pub mod udp;

// Re-export commonly used types for convenience
pub use arp::{ArpOperation, ArpPacket};
pub use builder::PacketBuilder;
pub use checksum::{internet_checksum, transport_checksum};
pub use decode::{decode, DecodedFrame};
pub use ethernet::{EtherType, EthernetFrame, EthernetHeader};
pub use ip::{IpHeader, IpProtocol, Ipv4Header, Ipv4Packet, Ipv6Header};
pub use tcp::{TcpFlags, TcpHeader, TcpSegment};
pub use udp::UdpHeader;
