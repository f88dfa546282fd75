//! Frame sinks for injecting forged frames

use parking_lot::Mutex;
use std::sync::Arc;

use crate::Result;

/// Destination for serialized frames
///
/// Failures are reported as [`crate::Error::Transmit`] and never retried:
/// a retried forged segment would carry stale sequence numbers.
pub trait FrameSink: Send {
    /// Put one complete link-layer frame on the wire
    fn transmit(&mut self, frame: &[u8]) -> Result<()>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Sink that keeps every transmitted frame in memory
///
/// Clones share the same buffer, so a test can keep one clone and hand the
/// other to the injector.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every frame transmitted so far
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

impl FrameSink for MemorySink {
    fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        self.frames.lock().push(frame.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        writer.transmit(&[0xaa, 0xbb]).unwrap();
        writer.transmit(&[0xcc]).unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.frames()[0], vec![0xaa, 0xbb]);
    }
}
