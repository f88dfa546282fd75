//! Frame sources

use std::collections::VecDeque;

use crate::{LinkType, RawFrame, Result};

/// Outcome of one pull from a [`FrameSource`]
#[derive(Debug)]
pub enum SourceEvent {
    /// A frame was captured
    Frame(RawFrame),
    /// No frame arrived within the source's read timeout
    Idle,
    /// The source is finished (end of file, closed device)
    Exhausted,
}

/// Counters a source reports about its own capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Frames handed to the caller
    pub received: u64,
    /// Captured bytes handed to the caller
    pub bytes: u64,
    /// Frames the kernel dropped before delivery; only known once closed
    pub dropped: u64,
}

/// Lazy, pull-based sequence of captured frames
///
/// A source is finite (file-backed) or infinite (live interface). It is not
/// restartable: once [`SourceEvent::Exhausted`] has been returned every later
/// pull returns it again. An `Err` means the capture died and is fatal.
pub trait FrameSource: Send {
    /// Pull the next event, blocking at most for the source's read timeout
    fn next_event(&mut self) -> Result<SourceEvent>;

    /// Link type of every frame this source produces
    fn link_type(&self) -> LinkType;

    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Release the capture handle
    fn close(&mut self) {}

    /// Capture counters so far
    fn stats(&self) -> SourceStats {
        SourceStats::default()
    }
}

/// In-memory source over a fixed list of frames
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<RawFrame>,
    link_type: Option<LinkType>,
    stats: SourceStats,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        let frames: VecDeque<RawFrame> = frames.into_iter().collect();
        let link_type = frames.front().map(|f| f.link_type);
        Self {
            frames,
            link_type,
            stats: SourceStats::default(),
        }
    }

    /// Frames not yet pulled
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn next_event(&mut self) -> Result<SourceEvent> {
        Ok(match self.frames.pop_front() {
            Some(frame) => {
                self.stats.received += 1;
                self.stats.bytes += frame.len() as u64;
                SourceEvent::Frame(frame)
            }
            None => SourceEvent::Exhausted,
        })
    }

    fn link_type(&self) -> LinkType {
        self.link_type.unwrap_or(LinkType::Ethernet)
    }

    fn describe(&self) -> String {
        format!("memory ({} frames)", self.frames.len())
    }

    fn close(&mut self) {
        self.frames.clear();
    }

    fn stats(&self) -> SourceStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_drains_then_exhausts() {
        let mut source = MemorySource::new(vec![
            RawFrame::ethernet(vec![1u8; 14]),
            RawFrame::ethernet(vec![2u8; 14]),
        ]);
        assert_eq!(source.remaining(), 2);

        assert!(matches!(source.next_event().unwrap(), SourceEvent::Frame(f) if f.data[0] == 1));
        assert!(matches!(source.next_event().unwrap(), SourceEvent::Frame(f) if f.data[0] == 2));
        assert!(matches!(source.next_event().unwrap(), SourceEvent::Exhausted));
        assert!(matches!(source.next_event().unwrap(), SourceEvent::Exhausted));

        let stats = source.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.bytes, 28);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_memory_source_close() {
        let mut source = MemorySource::new(vec![RawFrame::ethernet(vec![0u8; 14])]);
        source.close();
        assert!(matches!(source.next_event().unwrap(), SourceEvent::Exhausted));
    }
}
