//! Payload logging handler

use lurker_core::{LogRecord, LogSink, Result};
use lurker_dispatch::{DispatchContext, Handler, HandlerResult};
use lurker_packet::DecodedFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Handler name
pub const NAME: &str = "data-log";

/// Emits a [`LogRecord`] for every TCP segment carrying payload
///
/// Reads the tracker for the flow id but never changes flow state. Sink
/// failures go to the `lurker::fallback` target and never stop dispatch.
pub struct DataLogger {
    sink: Arc<dyn LogSink>,
    max_payload: Option<usize>,
    records: AtomicU64,
    sink_failures: AtomicU64,
}

impl DataLogger {
    /// `max_payload` caps the bytes copied into each record; `None` keeps all
    pub fn new(sink: Arc<dyn LogSink>, max_payload: Option<usize>) -> Self {
        Self {
            sink,
            max_payload,
            records: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }
}

impl Handler for DataLogger {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, frame: &DecodedFrame<'_>, ctx: &mut DispatchContext) -> Result<HandlerResult> {
        if frame.tcp.is_none() || !frame.has_payload() {
            return Ok(HandlerResult::Continue);
        }
        let Some(flow) = frame.flow_key() else {
            return Ok(HandlerResult::Continue);
        };

        let payload = frame.payload;
        let kept = self
            .max_payload
            .map_or(payload.len(), |max| max.min(payload.len()));
        let record = LogRecord {
            timestamp: frame.timestamp(),
            flow,
            flow_id: ctx
                .tracker()
                .get_live(&flow, frame.timestamp())
                .map(|state| state.id),
            length: payload.len(),
            payload: payload[..kept].to_vec(),
            truncated: kept < payload.len(),
        };

        self.records.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.sink.record(&record) {
            self.sink_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                target: "lurker::fallback",
                error = %e,
                flow = %record.flow,
                length = record.length,
                payload = ?record.payload,
                "payload record lost"
            );
        }

        Ok(HandlerResult::Continue)
    }

    fn shutdown(&self) -> Result<()> {
        info!(
            records = self.records(),
            sink_failures = self.sink_failures(),
            "Data logger stopped"
        );
        self.sink.flush()
    }
}
