//! Frame sinks that put forged frames on the wire

use lurker_core::{Error, FrameSink, Interface, RawFrame, Result};
use lurker_packet::{decode, EthernetHeader};
use pnet_datalink::DataLinkSender;
use tracing::{info, warn};

/// Transmits through a layer-2 channel opened on an interface
pub struct InterfaceSink {
    interface: Interface,
    tx: Box<dyn DataLinkSender>,
}

impl InterfaceSink {
    pub fn open(interface: Interface) -> Result<Self> {
        let tx = interface.open_sender()?;
        info!(interface = %interface, "Injection channel open");
        Ok(Self { interface, tx })
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }
}

impl FrameSink for InterfaceSink {
    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        match self.tx.send_to(frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(Error::transmit(format!("send on {} failed: {}", self.interface.name, e))),
            None => Err(Error::transmit(format!("no buffer available on {}", self.interface.name))),
        }
    }

    fn describe(&self) -> String {
        format!("interface {}", self.interface.name)
    }
}

/// Logs forged frames instead of sending them
///
/// Used for offline replays and for live runs without injection enabled.
#[derive(Debug, Default)]
pub struct DryRunSink {
    frames: u64,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames that would have been sent
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for DryRunSink {
    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        self.frames += 1;

        let raw = RawFrame::ethernet(frame.to_vec());
        let decoded = decode(&raw);
        match (decoded.ethernet, decoded.flow_key(), decoded.arp) {
            (_, Some(flow), _) => {
                let flags = decoded.tcp.map(|tcp| tcp.flags.to_string()).unwrap_or_default();
                info!(target: "lurker::inject", flow = %flow, flags = %flags, len = frame.len(), "dry-run: not sent");
            }
            (_, None, Some(arp)) => {
                info!(
                    target: "lurker::inject",
                    op = %arp.operation,
                    sender = %arp.sender_proto_addr,
                    sender_mac = %arp.sender_hw_addr,
                    target_ip = %arp.target_proto_addr,
                    "dry-run: not sent"
                );
            }
            (Some(EthernetHeader { destination, source, .. }), None, None) => {
                info!(target: "lurker::inject", src = %source, dst = %destination, len = frame.len(), "dry-run: not sent");
            }
            (None, None, None) => {
                warn!(target: "lurker::inject", len = frame.len(), "dry-run: undecodable frame");
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "dry-run".to_string()
    }
}
