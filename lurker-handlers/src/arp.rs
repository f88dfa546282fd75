//! ARP reply spoofing
//!
//! Answers ARP requests for claimed IPv4 addresses with a reply mapping the
//! address to the configured hardware address, unicast to the requester.

use lurker_core::{MacAddr, Result};
use lurker_dispatch::{DispatchContext, Handler, HandlerResult, SpoofAction};
use lurker_packet::{ArpPacket, DecodedFrame};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Handler name
pub const NAME: &str = "arp-spoof";

/// Which addresses to claim and which hardware address to claim them for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpSpoofConfig {
    pub claimed: HashSet<Ipv4Addr>,
    pub hw_addr: MacAddr,
}

impl ArpSpoofConfig {
    pub fn new(claimed: impl IntoIterator<Item = Ipv4Addr>, hw_addr: MacAddr) -> Self {
        Self {
            claimed: claimed.into_iter().collect(),
            hw_addr,
        }
    }
}

pub struct ArpSpoofHandler {
    config: ArpSpoofConfig,
    replies_sent: AtomicU64,
}

impl ArpSpoofHandler {
    pub fn new(config: ArpSpoofConfig) -> Self {
        info!(
            claimed = ?config.claimed,
            hw_addr = %config.hw_addr,
            "ARP spoofing enabled"
        );
        Self {
            config,
            replies_sent: AtomicU64::new(0),
        }
    }

    /// Replies forged so far
    pub fn replies_sent(&self) -> u64 {
        self.replies_sent.load(Ordering::Relaxed)
    }

    fn forge_reply(&self, request: &ArpPacket) -> Option<SpoofAction> {
        if !request.is_request() {
            return None;
        }
        if request.sender_hw_addr == self.config.hw_addr {
            // Our own resolution traffic
            return None;
        }
        if request.is_gratuitous() {
            return None;
        }
        if !self.config.claimed.contains(&request.target_proto_addr) {
            return None;
        }

        let reply = ArpPacket::new_reply(
            self.config.hw_addr,
            request.target_proto_addr,
            request.sender_hw_addr,
            request.sender_proto_addr,
        );
        Some(SpoofAction::ArpReply {
            eth_src: self.config.hw_addr,
            eth_dst: request.sender_hw_addr,
            packet: reply,
        })
    }
}

impl Handler for ArpSpoofHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, frame: &DecodedFrame<'_>, _ctx: &mut DispatchContext) -> Result<HandlerResult> {
        let Some(request) = frame.arp.as_ref() else {
            return Ok(HandlerResult::Continue);
        };

        match self.forge_reply(request) {
            Some(action) => {
                self.replies_sent.fetch_add(1, Ordering::Relaxed);
                debug!(
                    requester = %request.sender_proto_addr,
                    requester_mac = %request.sender_hw_addr,
                    target = %request.target_proto_addr,
                    "Answering ARP request"
                );
                Ok(HandlerResult::EmitSpoof(action))
            }
            None => Ok(HandlerResult::Continue),
        }
    }

    fn shutdown(&self) -> Result<()> {
        info!(replies = self.replies_sent(), "ARP spoofing stopped");
        Ok(())
    }
}
