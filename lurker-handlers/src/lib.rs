//! Protocol handlers for lurker
//!
//! - [`arp`]: answers ARP requests for claimed addresses
//! - [`tcp`]: answers opening SYNs with a forged SYN-ACK or RST+ACK
//! - [`conntrack`]: feeds TCP segments to the connection tracker
//! - [`datalog`]: records TCP payloads to a [`LogSink`]
//!
//! [`standard_registry`] registers them in the order the dispatch loop must
//! run them: spoofers first, so a forged answer is recorded on the flow
//! before the tracker sees the SYN.

pub mod arp;
pub mod conntrack;
pub mod datalog;
pub mod tcp;

pub use arp::{ArpSpoofConfig, ArpSpoofHandler};
pub use conntrack::ConnTrackHandler;
pub use datalog::DataLogger;
pub use tcp::{TcpResponse, TcpSpoofConfig, TcpSpoofHandler, TcpSpoofPolicy, TcpTargetFilter};

use lurker_core::{LogSink, Result, TracingLogSink};
use lurker_dispatch::HandlerRegistry;
use std::sync::Arc;

/// Payload logging settings
#[derive(Clone)]
pub struct DataLogConfig {
    pub enabled: bool,
    pub sink: Arc<dyn LogSink>,
    pub max_payload: Option<usize>,
}

impl Default for DataLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sink: Arc::new(TracingLogSink),
            max_payload: None,
        }
    }
}

/// Which handlers to build and how
///
/// Spoofers are registered only when configured. Connection tracking and
/// payload logging are always registered and toggled through their enable
/// flag.
#[derive(Clone)]
pub struct HandlerSet {
    pub arp_spoof: Option<ArpSpoofConfig>,
    pub tcp_spoof: Option<TcpSpoofConfig>,
    pub conntrack: bool,
    pub data_log: DataLogConfig,
}

impl Default for HandlerSet {
    fn default() -> Self {
        Self {
            arp_spoof: None,
            tcp_spoof: None,
            conntrack: true,
            data_log: DataLogConfig::default(),
        }
    }
}

/// Build the registry for `set`
pub fn standard_registry(set: &HandlerSet) -> Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    if let Some(config) = &set.arp_spoof {
        registry.register(Box::new(ArpSpoofHandler::new(config.clone())))?;
    }
    if let Some(config) = &set.tcp_spoof {
        registry.register(Box::new(TcpSpoofHandler::new(config.clone())))?;
    }

    registry.register(Box::new(ConnTrackHandler::new()))?;
    registry.set_enabled(conntrack::NAME, set.conntrack)?;

    registry.register(Box::new(DataLogger::new(
        Arc::clone(&set.data_log.sink),
        set.data_log.max_payload,
    )))?;
    registry.set_enabled(datalog::NAME, set.data_log.enabled)?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lurker_core::MacAddr;
    use std::net::Ipv4Addr;

    #[test]
    fn test_default_registry() {
        let registry = standard_registry(&HandlerSet::default()).unwrap();
        let names: Vec<_> = registry.list().into_iter().map(|info| info.name).collect();
        assert_eq!(names, vec![conntrack::NAME, datalog::NAME]);
        assert!(registry.is_enabled(conntrack::NAME));
        assert!(registry.is_enabled(datalog::NAME));
    }

    #[test]
    fn test_full_registry_order_and_flags() {
        let set = HandlerSet {
            arp_spoof: Some(ArpSpoofConfig::new(
                [Ipv4Addr::new(10, 0, 0, 254)],
                MacAddr([2, 0, 0, 0, 0, 9]),
            )),
            tcp_spoof: Some(TcpSpoofConfig {
                targets: TcpTargetFilter::new(vec![], vec![80]),
                policy: TcpSpoofPolicy::default(),
            }),
            conntrack: false,
            data_log: DataLogConfig {
                enabled: false,
                ..Default::default()
            },
        };

        let registry = standard_registry(&set).unwrap();
        let names: Vec<_> = registry.list().into_iter().map(|info| info.name).collect();
        assert_eq!(names, vec![arp::NAME, tcp::NAME, conntrack::NAME, datalog::NAME]);

        let enabled: Vec<_> = registry.enabled().map(|h| h.name()).collect();
        assert_eq!(enabled, vec![arp::NAME, tcp::NAME]);
    }
}
