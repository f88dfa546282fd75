//! Diagnostic logging setup

use lurker_core::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Level implied by the `-v` count, unless the config file names one
pub fn default_level(verbose: u8, configured: Option<&str>) -> String {
    match (verbose, configured) {
        (0, Some(level)) => level.to_string(),
        (0, None) => "info".to_string(),
        (1, _) => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` overrides the level derived from `verbose` and `configured`.
pub fn init(verbose: u8, configured: Option<&str>) -> Result<()> {
    let level = default_level(verbose, configured);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&level)
            .map_err(|e| Error::configuration(format!("invalid log level '{}': {}", level, e)))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::configuration(format!("failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(0, None), "info");
        assert_eq!(default_level(0, Some("warn")), "warn");
        assert_eq!(default_level(1, Some("warn")), "debug");
        assert_eq!(default_level(3, None), "trace");
    }
}
