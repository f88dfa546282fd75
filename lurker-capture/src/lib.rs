//! Capture and injection for lurker
//!
//! - [`LiveCapture`] and [`PcapFileSource`]: pcap-backed [`FrameSource`]s
//! - [`InterfaceSink`] and [`DryRunSink`]: [`FrameSink`]s for forged frames
//! - [`filters`]: BPF builders, including the default filter for a handler set
//!
//! ## Example
//!
//! ```no_run
//! use lurker_capture::{filters, CaptureConfig, LiveCapture};
//! use lurker_core::{FrameSource, SourceEvent};
//!
//! # fn main() -> lurker_core::Result<()> {
//! let config = CaptureConfig {
//!     filter: filters::handler_filter(true, true),
//!     ..Default::default()
//! };
//! let mut capture = LiveCapture::open("eth0", &config)?;
//!
//! loop {
//!     match capture.next_event()? {
//!         SourceEvent::Frame(frame) => println!("{} bytes", frame.len()),
//!         SourceEvent::Idle => continue,
//!         SourceEvent::Exhausted => break,
//!     }
//! }
//! capture.close();
//! # Ok(())
//! # }
//! ```
//!
//! [`FrameSource`]: lurker_core::FrameSource
//! [`FrameSink`]: lurker_core::FrameSink

pub mod capture;
pub mod filters;
pub mod inject;
pub mod stats;

pub use capture::{CaptureConfig, LiveCapture, PcapFileSource};
pub use inject::{DryRunSink, InterfaceSink};
pub use stats::StatsAccumulator;
