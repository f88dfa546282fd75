//! Command-line front end for lurker
//!
//! Argument parsing, configuration loading and validation, logging setup,
//! and assembly of the capture/dispatch/injection pipeline.

pub mod args;
pub mod config;
pub mod logging;
pub mod runner;

pub use args::{Cli, LogFormat};
pub use config::{CaptureSource, PayloadOutput, RuntimeConfig, Settings};
