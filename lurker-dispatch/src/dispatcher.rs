//! The dispatch loop
//!
//! Pulls frames from a [`FrameSource`], decodes each one once and offers it
//! to every enabled handler in registration order. A handler error or panic
//! is logged and counted; the frame still reaches the remaining handlers and
//! the loop keeps going. Forged frames go to the [`Injector`].

use lurker_core::{FrameSource, RawFrame, Result, SourceEvent, SourceStats};
use lurker_packet::decode;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

use crate::context::DispatchContext;
use crate::handler::HandlerResult;
use crate::injector::{Injector, InjectorStats};
use crate::registry::HandlerRegistry;

/// Frames between two idle-flow sweeps
pub const DEFAULT_SWEEP_INTERVAL: u64 = 1024;

/// Cooperative stop flag, checked between frames
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The source ran out of frames
    Exhausted,
    /// The stop handle was triggered
    Stopped,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Exhausted => write!(f, "source exhausted"),
            ExitReason::Stopped => write!(f, "stop requested"),
        }
    }
}

/// Totals reported when the loop exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub exit: ExitReason,
    pub frames: u64,
    pub bytes: u64,
    /// Handler errors and panics
    pub handler_failures: u64,
    pub spoofs_emitted: u64,
    pub flows_evicted: u64,
    /// Flows still tracked at exit
    pub active_flows: usize,
    /// Source counters read after close, kernel drops included
    pub capture: SourceStats,
    pub injector: InjectorStats,
}

#[derive(Debug, Default)]
struct Tally {
    frames: u64,
    bytes: u64,
    handler_failures: u64,
    spoofs_emitted: u64,
    flows_evicted: u64,
}

/// Owns the handlers, their shared context and the injector
pub struct Dispatcher {
    registry: HandlerRegistry,
    context: DispatchContext,
    injector: Option<Injector>,
    sweep_interval: u64,
    tally: Tally,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, context: DispatchContext, injector: Injector) -> Self {
        Self {
            registry,
            context,
            injector: Some(injector),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            tally: Tally::default(),
        }
    }

    /// Sweep idle flows every `frames` frames (at least 1)
    pub fn with_sweep_interval(mut self, frames: u64) -> Self {
        self.sweep_interval = frames.max(1);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    /// Run until the source is exhausted, the stop handle fires or the
    /// capture fails
    ///
    /// On every exit path the source is closed, handler shutdown hooks run
    /// and the injector is drained. Meant to be called once: afterwards the
    /// injector is gone and forged frames are discarded.
    ///
    /// # Errors
    ///
    /// The capture error that ended the loop.
    pub fn run(&mut self, source: &mut dyn FrameSource, stop: &StopHandle) -> Result<RunSummary> {
        let handlers: Vec<&str> = self.registry.enabled().map(|h| h.name()).collect();
        info!(source = %source.describe(), handlers = ?handlers, "Dispatch loop started");

        let outcome = self.pump(source, stop);

        source.close();
        let capture = source.stats();
        let shutdown_failures = self.registry.shutdown_all();
        let injector = self.injector.take().map(Injector::shutdown).unwrap_or_default();

        let exit = match outcome {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, frames = self.tally.frames, "Capture failed, dispatch loop aborted");
                return Err(e);
            }
        };

        let summary = RunSummary {
            exit,
            frames: self.tally.frames,
            bytes: self.tally.bytes,
            handler_failures: self.tally.handler_failures + shutdown_failures as u64,
            spoofs_emitted: self.tally.spoofs_emitted,
            flows_evicted: self.tally.flows_evicted,
            active_flows: self.context.tracker().len(),
            capture,
            injector,
        };
        info!(
            exit = %summary.exit,
            frames = summary.frames,
            bytes = summary.bytes,
            handler_failures = summary.handler_failures,
            spoofs = summary.spoofs_emitted,
            flows_evicted = summary.flows_evicted,
            active_flows = summary.active_flows,
            capture_dropped = summary.capture.dropped,
            injected = summary.injector.sent,
            inject_dropped = summary.injector.dropped,
            inject_failed = summary.injector.failed,
            "Dispatch loop finished"
        );
        Ok(summary)
    }

    fn pump(&mut self, source: &mut dyn FrameSource, stop: &StopHandle) -> Result<ExitReason> {
        loop {
            if stop.is_stopped() {
                return Ok(ExitReason::Stopped);
            }

            match source.next_event()? {
                SourceEvent::Frame(raw) => {
                    self.dispatch(&raw);
                    if self.tally.frames % self.sweep_interval == 0 {
                        self.sweep(self.context.now());
                    }
                }
                SourceEvent::Idle => self.sweep(SystemTime::now()),
                SourceEvent::Exhausted => return Ok(ExitReason::Exhausted),
            }
        }
    }

    /// Offer one frame to every enabled handler
    pub fn dispatch(&mut self, raw: &RawFrame) {
        self.tally.frames += 1;
        self.tally.bytes += raw.len() as u64;
        self.context.advance(raw.timestamp);

        let frame = decode(raw);

        for handler in self.registry.enabled() {
            let name = handler.name();
            let ctx = &mut self.context;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&frame, ctx)));

            match outcome {
                Ok(Ok(HandlerResult::Continue)) => {}
                Ok(Ok(HandlerResult::EmitSpoof(action))) => match action.serialize() {
                    Ok(bytes) => {
                        self.tally.spoofs_emitted += 1;
                        info!(handler = name, action = %action, len = bytes.len(), "Spoofed frame emitted");
                        match &self.injector {
                            Some(injector) => injector.enqueue(bytes),
                            None => warn!(handler = name, "Injector already shut down, frame discarded"),
                        }
                    }
                    Err(e) => {
                        self.tally.handler_failures += 1;
                        warn!(handler = name, error = %e, "Spoofed frame could not be built");
                    }
                },
                Ok(Err(e)) => {
                    self.tally.handler_failures += 1;
                    warn!(handler = name, error = %e, "Handler failed");
                }
                Err(payload) => {
                    self.tally.handler_failures += 1;
                    error!(handler = name, panic = %panic_message(payload.as_ref()), "Handler panicked");
                }
            }
        }
    }

    fn sweep(&mut self, now: SystemTime) {
        let evicted = self.context.tracker_mut().evict_idle(now);
        if evicted > 0 {
            self.tally.flows_evicted += evicted as u64;
            debug!(evicted, active = self.context.tracker().len(), "Idle flows evicted");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
