//! Error types for lurker

use thiserror::Error;

/// Result type alias for lurker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lurker
///
/// Only [`Error::Configuration`] and [`Error::Capture`] are fatal to a run.
/// Every other kind is local to a single frame, handler or forged packet and
/// is reported by the dispatch loop without stopping it.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Conflicting or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Capture source failed to open or died mid-stream
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// A handler returned an internal error or panicked
    #[error("Handler '{handler}' failed: {reason}")]
    Handler { handler: String, reason: String },

    /// A forged frame could not be put on the wire
    #[error("Transmit error: {reason}")]
    Transmit { reason: String },

    /// A log record could not be written
    #[error("Log sink error: {0}")]
    LogSink(String),

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface error
    #[error("Interface error: {0}")]
    Interface(String),

    /// Packet construction error
    #[error("Packet construction error: {0}")]
    PacketConstruction(String),

    /// Packet parsing error
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a capture error with a custom message
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Error::Capture(msg.into())
    }

    /// Create a transmit error
    pub fn transmit<S: Into<String>>(reason: S) -> Self {
        Error::Transmit {
            reason: reason.into(),
        }
    }

    /// Create a handler failure
    pub fn handler<S: Into<String>, R: Into<String>>(handler: S, reason: R) -> Self {
        Error::Handler {
            handler: handler.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must terminate the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Capture(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(Error::configuration("both -r and -i given").is_fatal());
        assert!(Error::capture("device went away").is_fatal());
        assert!(!Error::transmit("permission denied").is_fatal());
        assert!(!Error::handler("tcp-spoof", "boom").is_fatal());
        assert!(!Error::LogSink("disk full".to_string()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = Error::handler("arp-spoof", "bad config");
        assert_eq!(err.to_string(), "Handler 'arp-spoof' failed: bad config");

        let err = Error::transmit("no such device");
        assert_eq!(err.to_string(), "Transmit error: no such device");
    }
}
