//! CLI argument parsing

use clap::{ArgAction, Parser, ValueEnum};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Encoding of payload records written to a file or stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// One human-readable line per record
    Text,
}

#[derive(Parser, Debug, Default)]
#[command(name = "lurker")]
#[command(
    version,
    about = "On-path ARP/TCP spoofer, connection tracker and payload logger",
    long_about = None
)]
pub struct Cli {
    /// Replay frames from a pcap file
    #[arg(short = 'r', long = "read", value_name = "FILE", conflicts_with = "interface")]
    pub read: Option<PathBuf>,

    /// Capture live on a network interface
    #[arg(short = 'i', long, value_name = "DEV")]
    pub interface: Option<String>,

    /// YAML configuration file; flags override its values
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Answer ARP requests for claimed addresses
    #[arg(long)]
    pub arp_spoof: bool,

    /// IPv4 address to claim (repeatable)
    #[arg(long = "claim", value_name = "IP")]
    pub claim: Vec<Ipv4Addr>,

    /// Hardware address put in forged frames [default: the interface's]
    #[arg(long, value_name = "MAC")]
    pub hw_addr: Option<String>,

    /// Answer SYNs towards targeted endpoints
    #[arg(long)]
    pub tcp_spoof: bool,

    /// Targeted network in CIDR notation (repeatable)
    #[arg(long = "target", value_name = "NET")]
    pub target: Vec<String>,

    /// Targeted destination port (repeatable)
    #[arg(long = "target-port", value_name = "PORT")]
    pub target_port: Vec<u16>,

    /// Forged answer to a targeted SYN: syn-ack or rst
    #[arg(long, value_name = "RESPONSE")]
    pub tcp_response: Option<String>,

    /// Fixed initial sequence number of forged SYN-ACKs [default: random]
    #[arg(long, value_name = "N")]
    pub isn: Option<u32>,

    /// Disable connection tracking
    #[arg(long)]
    pub no_conntrack: bool,

    /// Disable payload logging
    #[arg(long)]
    pub no_data_log: bool,

    /// Seconds of silence before a tracked flow is dropped
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Payload bytes kept per record [default: all]
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<usize>,

    /// Where payload records go: - for stdout or a file path [default: diagnostic log]
    #[arg(long, value_name = "DEST")]
    pub log_dest: Option<String>,

    /// Encoding of payload records
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Put forged frames on the wire (otherwise they are only logged)
    #[arg(long)]
    pub inject: bool,

    /// Forged frames buffered before the oldest are dropped
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// BPF filter [default: derived from enabled handlers]
    #[arg(long, value_name = "BPF")]
    pub filter: Option<String>,

    /// Verbose output (-v, -vv for increasing verbosity)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// List network interfaces and exit
    #[arg(long)]
    pub list_interfaces: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
