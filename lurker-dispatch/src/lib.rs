//! Dispatch framework for lurker
//!
//! This crate turns a stream of captured frames into handler decisions:
//!
//! - [`Handler`]: a protocol handler, run for every frame in registration order
//! - [`HandlerRegistry`]: ordered, uniquely-named handlers with enable flags
//! - [`DispatchContext`]: cross-frame state, chiefly the [`ConnectionTracker`]
//! - [`Dispatcher`]: the loop, with panic isolation and a [`StopHandle`]
//! - [`Injector`]: bounded background queue feeding a frame sink
//!
//! # Example
//!
//! ```no_run
//! use lurker_core::{MemorySink, MemorySource};
//! use lurker_dispatch::{DispatchContext, Dispatcher, HandlerRegistry, Injector, StopHandle};
//!
//! # fn main() -> lurker_core::Result<()> {
//! let registry = HandlerRegistry::new();
//! let injector = Injector::spawn(Box::new(MemorySink::new()), 1024)?;
//! let mut dispatcher = Dispatcher::new(registry, DispatchContext::default(), injector);
//!
//! let summary = dispatcher.run(&mut MemorySource::new(vec![]), &StopHandle::new())?;
//! println!("{} frames", summary.frames);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod injector;
pub mod registry;
pub mod tracker;

pub use action::SpoofAction;
pub use context::DispatchContext;
pub use dispatcher::{Dispatcher, ExitReason, RunSummary, StopHandle};
pub use handler::{Handler, HandlerResult};
pub use injector::{Injector, InjectorStats};
pub use registry::{HandlerInfo, HandlerRegistry};
pub use tracker::{ConnectionTracker, FlowState, SpoofKind, TcpObservation, TcpState};
