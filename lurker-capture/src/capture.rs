//! pcap-backed frame sources

use pcap::{Active, Capture, Offline, PacketHeader};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use lurker_core::{Error, FrameSource, LinkType, RawFrame, Result, SourceEvent, SourceStats};

use crate::stats::StatsAccumulator;

/// Default snapshot length (maximum bytes per packet)
pub const DEFAULT_SNAPLEN: i32 = 0xffff;

/// Default read timeout; bounds how long a stop request can go unnoticed
pub const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Live capture settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Read timeout in milliseconds
    pub timeout_ms: i32,
    pub promiscuous: bool,
    /// Kernel buffer size (0 = pcap default)
    pub buffer_size: i32,
    /// Deliver packets as soon as they arrive
    pub immediate_mode: bool,
    /// BPF filter applied after opening
    pub filter: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
            filter: None,
        }
    }
}

fn header_timestamp(header: &PacketHeader) -> SystemTime {
    let secs = u64::try_from(header.ts.tv_sec).unwrap_or(0);
    let micros = u32::try_from(header.ts.tv_usec).unwrap_or(0).min(999_999);
    UNIX_EPOCH + Duration::new(secs, micros * 1000)
}

fn to_frame(header: &PacketHeader, data: &[u8], link_type: LinkType) -> RawFrame {
    let mut frame = RawFrame::with_timestamp(header_timestamp(header), link_type, data.to_vec());
    frame.orig_len = (header.len as usize).max(frame.data.len());
    frame
}

/// Live capture on a network interface
pub struct LiveCapture {
    interface: String,
    capture: Option<Capture<Active>>,
    link_type: LinkType,
    stats: StatsAccumulator,
}

impl LiveCapture {
    /// Open `interface` for capture
    pub fn open(interface: &str, config: &CaptureConfig) -> Result<Self> {
        debug!("Initializing pcap capture on {}", interface);

        let mut builder = Capture::from_device(interface)
            .map_err(|e| Error::capture(format!("Failed to open device {}: {}", interface, e)))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .immediate_mode(config.immediate_mode);

        if config.buffer_size > 0 {
            builder = builder.buffer_size(config.buffer_size);
        }

        let mut capture = builder
            .open()
            .map_err(|e| Error::capture(format!("Failed to open capture on {}: {}", interface, e)))?;

        if let Some(filter) = &config.filter {
            capture
                .filter(filter, true)
                .map_err(|e| Error::capture(format!("Invalid BPF filter '{}': {}", filter, e)))?;
            debug!("Applied filter: {}", filter);
        }

        let link_type = LinkType::from_dlt(capture.get_datalink().0);
        if link_type != LinkType::Ethernet {
            warn!(interface, dlt = link_type.dlt(), "Interface is not Ethernet; frames will not be decoded");
        }

        info!(interface, promiscuous = config.promiscuous, snaplen = config.snaplen, "Capture started");
        Ok(Self {
            interface: interface.to_string(),
            capture: Some(capture),
            link_type,
            stats: StatsAccumulator::new(),
        })
    }
}

impl FrameSource for LiveCapture {
    fn next_event(&mut self) -> Result<SourceEvent> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(SourceEvent::Exhausted);
        };

        match capture.next_packet() {
            Ok(packet) => {
                let frame = to_frame(packet.header, packet.data, self.link_type);
                self.stats.record_packet(frame.len());
                Ok(SourceEvent::Frame(frame))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(SourceEvent::Idle),
            Err(pcap::Error::NoMorePackets) => Ok(SourceEvent::Exhausted),
            Err(e) => Err(Error::capture(format!("Capture on {} failed: {}", self.interface, e))),
        }
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn describe(&self) -> String {
        format!("interface {}", self.interface)
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            match capture.stats() {
                Ok(stat) => self.stats.record_pcap_drops(&stat),
                Err(e) => warn!(interface = %self.interface, error = %e, "Kernel drop counter unavailable"),
            }
            let stats = self.stats.snapshot();
            info!(
                interface = %self.interface,
                received = stats.received,
                dropped = stats.dropped,
                "Capture closed"
            );
        }
    }

    fn stats(&self) -> SourceStats {
        self.stats.snapshot()
    }
}

/// Replay of a pcap file
pub struct PcapFileSource {
    path: PathBuf,
    capture: Option<Capture<Offline>>,
    link_type: LinkType,
    stats: StatsAccumulator,
}

impl PcapFileSource {
    pub fn open(path: impl AsRef<Path>, filter: Option<&str>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut capture = Capture::from_file(&path)
            .map_err(|e| Error::capture(format!("Failed to open {}: {}", path.display(), e)))?;

        if let Some(filter) = filter {
            capture
                .filter(filter, true)
                .map_err(|e| Error::capture(format!("Invalid BPF filter '{}': {}", filter, e)))?;
        }

        let link_type = LinkType::from_dlt(capture.get_datalink().0);
        info!(path = %path.display(), dlt = link_type.dlt(), "Reading capture file");
        Ok(Self {
            path,
            capture: Some(capture),
            link_type,
            stats: StatsAccumulator::new(),
        })
    }
}

impl FrameSource for PcapFileSource {
    fn next_event(&mut self) -> Result<SourceEvent> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(SourceEvent::Exhausted);
        };

        let event = match capture.next_packet() {
            Ok(packet) => {
                let frame = to_frame(packet.header, packet.data, self.link_type);
                self.stats.record_packet(frame.len());
                SourceEvent::Frame(frame)
            }
            Err(pcap::Error::NoMorePackets) => SourceEvent::Exhausted,
            Err(e) => {
                return Err(Error::capture(format!(
                    "Failed reading {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if matches!(event, SourceEvent::Exhausted) {
            debug!(path = %self.path.display(), "End of capture file");
            self.capture = None;
        }
        Ok(event)
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn close(&mut self) {
        self.capture = None;
    }

    fn stats(&self) -> SourceStats {
        self.stats.snapshot()
    }
}
