//! Structured payload records and their sinks

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;
use uuid::Uuid;

use crate::{Error, FlowKey, Result};

/// One application payload observed on a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Capture time of the frame carrying the payload
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: SystemTime,
    /// Direction the payload travelled in
    pub flow: FlowKey,
    /// Tracker id of the flow, when it is tracked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<Uuid>,
    /// Full payload length in the frame
    pub length: usize,
    /// Payload bytes, possibly cut to the configured prefix
    pub payload: Vec<u8>,
    /// Whether `payload` is shorter than `length`
    pub truncated: bool,
}

impl LogRecord {
    /// RFC 3339 rendering of the capture time
    pub fn timestamp_rfc3339(&self) -> String {
        DateTime::<Utc>::from(self.timestamp).to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

fn serialize_timestamp<S: Serializer>(ts: &SystemTime, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let rendered = DateTime::<Utc>::from(*ts).to_rfc3339_opts(SecondsFormat::Micros, true);
    serializer.serialize_str(&rendered)
}

/// Destination for [`LogRecord`]s
///
/// Implementations must not block frame processing for long; a failure is
/// returned as [`Error::LogSink`] and the caller reports it elsewhere.
pub trait LogSink: Send + Sync {
    fn record(&self, record: &LogRecord) -> Result<()>;

    /// Push out anything buffered
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Emits records as `tracing` events under the `lurker::payload` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn record(&self, record: &LogRecord) -> Result<()> {
        info!(
            target: "lurker::payload",
            timestamp = %record.timestamp_rfc3339(),
            flow = %record.flow,
            flow_id = ?record.flow_id,
            length = record.length,
            truncated = record.truncated,
            payload = ?record.payload,
            "payload"
        );
        Ok(())
    }
}

/// Buffered line output, optionally flushed after every record
struct RecordWriter<W: Write> {
    inner: BufWriter<W>,
    flush_each: bool,
}

impl<W: Write> RecordWriter<W> {
    fn new(writer: W, flush_each: bool) -> Self {
        Self {
            inner: BufWriter::new(writer),
            flush_each,
        }
    }

    fn end_record(&mut self) -> Result<()> {
        if self.flush_each {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| Error::LogSink(format!("failed to flush: {}", e)))
    }
}

/// Writes one JSON object per line to any writer (file, stdout)
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<RecordWriter<W>>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Block-buffered; records reach `writer` on flush or when the buffer fills
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(RecordWriter::new(writer, false)),
        }
    }

    /// Every record reaches `writer` as soon as it is written
    pub fn line_buffered(writer: W) -> Self {
        Self {
            writer: Mutex::new(RecordWriter::new(writer, true)),
        }
    }
}

impl<W: Write + Send> LogSink for JsonLinesSink<W> {
    fn record(&self, record: &LogRecord) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut writer.inner, record)
            .map_err(|e| Error::LogSink(format!("failed to encode record: {}", e)))?;
        writer
            .inner
            .write_all(b"\n")
            .map_err(|e| Error::LogSink(format!("failed to write record: {}", e)))?;
        writer.end_record()
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()
    }
}

/// Writes one human-readable line per record
///
/// Format: `<timestamp> <flow> len=<n> "<payload>"`, with non-printable
/// payload bytes escaped and `...` appended when the payload was cut.
pub struct TextLinesSink<W: Write + Send> {
    writer: Mutex<RecordWriter<W>>,
}

impl<W: Write + Send> TextLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(RecordWriter::new(writer, false)),
        }
    }

    /// Every record reaches `writer` as soon as it is written
    pub fn line_buffered(writer: W) -> Self {
        Self {
            writer: Mutex::new(RecordWriter::new(writer, true)),
        }
    }
}

/// Escaped rendering of payload bytes
pub fn escape_payload(payload: &[u8]) -> String {
    payload
        .iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect()
}

impl<W: Write + Send> LogSink for TextLinesSink<W> {
    fn record(&self, record: &LogRecord) -> Result<()> {
        let suffix = if record.truncated { "..." } else { "" };
        let mut writer = self.writer.lock();
        writeln!(
            writer.inner,
            "{} {} len={} \"{}{}\"",
            record.timestamp_rfc3339(),
            record.flow,
            record.length,
            escape_payload(&record.payload),
            suffix
        )
        .map_err(|e| Error::LogSink(format!("failed to write record: {}", e)))?;
        writer.end_record()
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()
    }
}

/// Keeps records in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LogSink for MemoryLogSink {
    fn record(&self, record: &LogRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn sample() -> LogRecord {
        LogRecord {
            timestamp: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            flow: FlowKey::tcp(
                "10.0.0.1:40000".parse().unwrap(),
                "10.0.0.2:80".parse().unwrap(),
            ),
            flow_id: None,
            length: 4,
            payload: b"PING".to_vec(),
            truncated: false,
        }
    }

    /// Shared buffer so the test can read back what the sink wrote
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_sink() {
        let buf = SharedBuf::default();
        let sink = JsonLinesSink::new(buf.clone());

        sink.record(&sample()).unwrap();
        sink.record(&sample()).unwrap();
        sink.flush().unwrap();

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["length"], 4);
        assert_eq!(value["flow"]["src"], "10.0.0.1:40000");
        assert_eq!(value["flow"]["protocol"], "tcp");
        assert_eq!(value["payload"], serde_json::json!([80, 73, 78, 71]));
        assert_eq!(value["timestamp"], "2023-11-14T22:13:20.000000Z");
        assert!(value.get("flow_id").is_none());
    }

    #[test]
    fn test_text_lines_sink() {
        let buf = SharedBuf::default();
        let sink = TextLinesSink::new(buf.clone());

        let mut record = sample();
        record.payload = b"GET /\r\n".to_vec();
        record.length = 12;
        record.truncated = true;
        sink.record(&record).unwrap();
        sink.flush().unwrap();

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        assert_eq!(
            text,
            "2023-11-14T22:13:20.000000Z 10.0.0.1:40000 -> 10.0.0.2:80 (tcp) len=12 \"GET /\\r\\n...\"\n"
        );
    }

    #[test]
    fn test_line_buffered_sinks_write_through() {
        let json_buf = SharedBuf::default();
        let json = JsonLinesSink::line_buffered(json_buf.clone());
        let text_buf = SharedBuf::default();
        let text = TextLinesSink::line_buffered(text_buf.clone());

        json.record(&sample()).unwrap();
        text.record(&sample()).unwrap();

        // Visible without an explicit flush
        let written = String::from_utf8(json_buf.0.lock().clone()).unwrap();
        assert!(written.ends_with("}\n"));
        assert_eq!(written.lines().count(), 1);
        let written = String::from_utf8(text_buf.0.lock().clone()).unwrap();
        assert!(written.ends_with("len=4 \"PING\"\n"));
    }

    #[test]
    fn test_block_buffered_sink_holds_until_flush() {
        let buf = SharedBuf::default();
        let sink = JsonLinesSink::new(buf.clone());

        sink.record(&sample()).unwrap();
        assert!(buf.0.lock().is_empty());

        sink.flush().unwrap();
        assert!(!buf.0.lock().is_empty());
    }

    #[test]
    fn test_memory_log_sink() {
        let sink = MemoryLogSink::new();
        let shared = sink.clone();
        shared.record(&sample()).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].payload, b"PING");
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        assert!(TracingLogSink.record(&sample()).is_ok());
        assert!(TracingLogSink.flush().is_ok());
    }
}
