//! Connection tracking handler
//!
//! Feeds every TCP segment to the dispatch context's tracker and reports
//! connection lifecycle events.

use lurker_core::Result;
use lurker_dispatch::{DispatchContext, Handler, HandlerResult, TcpObservation, TcpState};
use lurker_packet::DecodedFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Handler name
pub const NAME: &str = "conntrack";

#[derive(Default)]
pub struct ConnTrackHandler {
    opened: AtomicU64,
    established: AtomicU64,
    closed: AtomicU64,
}

impl ConnTrackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flows that reached SYN_SENT
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn established(&self) -> u64 {
        self.established.load(Ordering::Relaxed)
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }
}

impl Handler for ConnTrackHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, frame: &DecodedFrame<'_>, ctx: &mut DispatchContext) -> Result<HandlerResult> {
        let Some((key, segment)) = TcpObservation::from_frame(frame) else {
            return Ok(HandlerResult::Continue);
        };

        let before = ctx.tracker().get_live(&key, segment.at).map(|flow| flow.state);
        let Some(flow) = ctx.tracker_mut().observe(key, &segment) else {
            return Ok(HandlerResult::Continue);
        };
        if before == Some(flow.state) {
            return Ok(HandlerResult::Continue);
        }

        match flow.state {
            TcpState::SynSent => {
                self.opened.fetch_add(1, Ordering::Relaxed);
            }
            TcpState::Established => {
                self.established.fetch_add(1, Ordering::Relaxed);
                info!(
                    id = %flow.id,
                    initiator = %flow.initiator,
                    responder = %flow.responder(),
                    spoofed = flow.spoofed.is_some(),
                    "Connection established"
                );
            }
            TcpState::Closed => {
                self.closed.fetch_add(1, Ordering::Relaxed);
                info!(
                    id = %flow.id,
                    initiator = %flow.initiator,
                    responder = %flow.responder(),
                    sent = flow.from_initiator.bytes,
                    received = flow.from_responder.bytes,
                    "Connection closed"
                );
            }
            _ => {}
        }

        Ok(HandlerResult::Continue)
    }

    fn shutdown(&self) -> Result<()> {
        info!(
            opened = self.opened(),
            established = self.established(),
            closed = self.closed(),
            "Connection tracking stopped"
        );
        Ok(())
    }
}
