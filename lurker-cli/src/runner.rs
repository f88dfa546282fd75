//! Pipeline assembly: source, handlers, injector and dispatch loop

use lurker_capture::{CaptureConfig, DryRunSink, InterfaceSink, LiveCapture, PcapFileSource};
use lurker_core::{
    Error, FrameSink, FrameSource, Interface, JsonLinesSink, LogSink, Result, TextLinesSink,
    TracingLogSink,
};
use lurker_dispatch::{DispatchContext, Dispatcher, Injector, RunSummary, StopHandle};
use lurker_handlers::{standard_registry, DataLogConfig, HandlerSet};
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use tracing::{info, warn};

use crate::args::LogFormat;
use crate::config::{CaptureSource, PayloadOutput, RuntimeConfig};

/// Open the configured capture source
pub fn open_source(config: &RuntimeConfig) -> Result<Box<dyn FrameSource>> {
    match &config.source {
        CaptureSource::File(path) => Ok(Box::new(PcapFileSource::open(
            path,
            config.filter.as_deref(),
        )?)),
        CaptureSource::Interface(name) => {
            let capture_config = CaptureConfig {
                filter: config.filter.clone(),
                ..Default::default()
            };
            Ok(Box::new(LiveCapture::open(name, &capture_config)?))
        }
    }
}

/// Sink for forged frames: the wire when injecting, the log otherwise
pub fn open_frame_sink(config: &RuntimeConfig) -> Result<Box<dyn FrameSink>> {
    match (&config.source, config.inject) {
        (CaptureSource::Interface(name), true) => {
            let interface = Interface::by_name(name)?;
            if !interface.is_up {
                warn!(interface = %interface, "Injecting on an interface that is down");
            }
            Ok(Box::new(InterfaceSink::open(interface)?))
        }
        _ => Ok(Box::new(DryRunSink::new())),
    }
}

fn lines_sink<W: io::Write + Send + 'static>(writer: W, format: LogFormat) -> Arc<dyn LogSink> {
    match format {
        LogFormat::Json => Arc::new(JsonLinesSink::new(writer)),
        LogFormat::Text => Arc::new(TextLinesSink::new(writer)),
    }
}

/// Records on stdout are flushed one by one so a reader sees them live
fn stdout_sink(format: LogFormat) -> Arc<dyn LogSink> {
    match format {
        LogFormat::Json => Arc::new(JsonLinesSink::line_buffered(io::stdout())),
        LogFormat::Text => Arc::new(TextLinesSink::line_buffered(io::stdout())),
    }
}

/// Open the payload record destination
pub fn open_log_sink(output: &PayloadOutput) -> Result<Arc<dyn LogSink>> {
    match output {
        PayloadOutput::Tracing => Ok(Arc::new(TracingLogSink)),
        PayloadOutput::Stdout(format) => Ok(stdout_sink(*format)),
        PayloadOutput::File(path, format) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    Error::configuration(format!("cannot open payload log {}: {}", path.display(), e))
                })?;
            Ok(lines_sink(file, *format))
        }
    }
}

/// Handler selection for `config`, logging payloads to `log_sink`
pub fn handler_set(config: &RuntimeConfig, log_sink: Arc<dyn LogSink>) -> HandlerSet {
    HandlerSet {
        arp_spoof: config.arp_spoof.clone(),
        tcp_spoof: config.tcp_spoof.clone(),
        conntrack: config.conntrack,
        data_log: DataLogConfig {
            enabled: config.data_log,
            sink: log_sink,
            max_payload: config.max_payload,
        },
    }
}

/// Registry, context and injector wired together
pub fn build_dispatcher(
    config: &RuntimeConfig,
    frame_sink: Box<dyn FrameSink>,
    log_sink: Arc<dyn LogSink>,
) -> Result<Dispatcher> {
    let registry = standard_registry(&handler_set(config, log_sink))?;
    for handler in registry.list() {
        info!(handler = handler.name, enabled = handler.enabled, "Registered handler");
    }

    let injector = Injector::spawn(frame_sink, config.queue_capacity)?;
    let context = DispatchContext::new(config.idle_timeout);
    Ok(Dispatcher::new(registry, context, injector))
}

/// Run the whole pipeline until the source ends or `stop` is requested
pub fn run(config: &RuntimeConfig, stop: &StopHandle) -> Result<RunSummary> {
    let mut source = open_source(config)?;
    let frame_sink = open_frame_sink(config)?;
    let log_sink = open_log_sink(&config.payload_output)?;

    info!(
        source = %source.describe(),
        sink = %frame_sink.describe(),
        filter = config.filter.as_deref().unwrap_or("none"),
        "Starting"
    );

    let mut dispatcher = build_dispatcher(config, frame_sink, log_sink)?;
    dispatcher.run(source.as_mut(), stop)
}
