//! Raw captured frames

use bytes::Bytes;
use std::time::SystemTime;

use crate::LinkType;

/// A captured link-layer frame
///
/// Immutable once built. The dispatch loop owns it for one cycle; handlers
/// copy out whatever they need to keep.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// When the frame was captured
    pub timestamp: SystemTime,
    /// Link type declared by the capture source
    pub link_type: LinkType,
    /// Captured bytes (including all headers)
    pub data: Bytes,
    /// Length on the wire (may exceed `data.len()` when truncated by snaplen)
    pub orig_len: usize,
}

impl RawFrame {
    /// Create a new frame captured now
    pub fn new(link_type: LinkType, data: impl Into<Bytes>) -> Self {
        Self::with_timestamp(SystemTime::now(), link_type, data)
    }

    /// Create a new frame with an explicit capture timestamp
    pub fn with_timestamp(
        timestamp: SystemTime,
        link_type: LinkType,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        let orig_len = data.len();
        Self {
            timestamp,
            link_type,
            data,
            orig_len,
        }
    }

    /// Ethernet frame captured now
    pub fn ethernet(data: impl Into<Bytes>) -> Self {
        Self::new(LinkType::Ethernet, data)
    }

    /// Get frame data as slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of captured bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if frame is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the capture cut the frame short
    pub fn is_truncated(&self) -> bool {
        self.orig_len > self.data.len()
    }
}
