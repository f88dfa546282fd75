//! Per-source capture counters

use lurker_core::SourceStats;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals kept by a pcap source
///
/// Delivered frames are counted as they are read; kernel drops are only
/// folded in when the handle is closed.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    received: AtomicU64,
    bytes: AtomicU64,
    dropped: AtomicU64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet(&self, size: usize) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Fold in the drop counter of a pcap handle about to be released
    pub fn record_pcap_drops(&self, stat: &pcap::Stat) {
        self.dropped.fetch_add(u64::from(stat.dropped), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SourceStats {
        SourceStats {
            received: self.received.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
