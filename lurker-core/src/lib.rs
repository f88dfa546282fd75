//! lurker core library
//!
//! Shared types, error handling and the I/O seams of the lurker packet
//! interception pipeline:
//!
//! - [`RawFrame`] and [`LinkType`] for captured frames
//! - [`FlowKey`] for direction-independent flow identity
//! - [`FrameSource`], [`FrameSink`] and [`LogSink`], the traits through which
//!   the pipeline talks to capture devices, injection paths and log outputs

pub mod error;
pub mod flow;
pub mod frame;
pub mod interface;
pub mod log;
pub mod sink;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use flow::{FlowKey, TransportProtocol};
pub use frame::RawFrame;
pub use interface::Interface;
pub use log::{JsonLinesSink, LogRecord, LogSink, MemoryLogSink, TextLinesSink, TracingLogSink};
pub use sink::{FrameSink, MemorySink};
pub use source::{FrameSource, MemorySource, SourceEvent, SourceStats};
pub use types::*;
