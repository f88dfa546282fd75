//! Configuration file, flag overlay and validation
//!
//! Settings come from an optional YAML file, then command-line flags
//! override them. [`Settings::validate`] turns the merged result into a
//! [`RuntimeConfig`] or an [`Error::Configuration`].

use ipnetwork::IpNetwork;
use lurker_capture::filters;
use lurker_core::{Error, Interface, MacAddr, Result};
use lurker_dispatch::injector::DEFAULT_QUEUE_CAPACITY;
use lurker_handlers::tcp::{DEFAULT_TTL, DEFAULT_WINDOW};
use lurker_handlers::{ArpSpoofConfig, TcpResponse, TcpSpoofConfig, TcpSpoofPolicy, TcpTargetFilter};
use serde::Deserialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::args::{Cli, LogFormat};

/// Default idle timeout for tracked flows
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArpSection {
    pub enabled: bool,
    pub claim: Vec<Ipv4Addr>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TcpSection {
    pub enabled: bool,
    pub targets: Vec<String>,
    pub ports: Vec<u16>,
    pub response: Option<String>,
    pub isn: Option<u32>,
    pub window: Option<u16>,
    pub ttl: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataLogSection {
    pub enabled: bool,
    pub dest: Option<String>,
    pub format: Option<LogFormat>,
    pub max_payload: Option<usize>,
}

impl Default for DataLogSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dest: None,
            format: None,
            max_payload: None,
        }
    }
}

/// Everything a run can be configured with, before validation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub read: Option<PathBuf>,
    pub interface: Option<String>,
    pub filter: Option<String>,
    pub hw_addr: Option<String>,
    pub inject: bool,
    pub queue_capacity: usize,
    pub idle_timeout_secs: u64,
    /// Default diagnostic level; `RUST_LOG` and `-v` take precedence
    pub log_level: Option<String>,
    pub arp_spoof: ArpSection,
    pub tcp_spoof: TcpSection,
    pub conntrack: bool,
    pub data_log: DataLogSection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            read: None,
            interface: None,
            filter: None,
            hw_addr: None,
            inject: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            log_level: None,
            arp_spoof: ArpSection::default(),
            tcp_spoof: TcpSection::default(),
            conntrack: true,
            data_log: DataLogSection::default(),
        }
    }
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    File(PathBuf),
    Interface(String),
}

/// Where payload records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadOutput {
    /// `tracing` events under the `lurker::payload` target
    Tracing,
    Stdout(LogFormat),
    File(PathBuf, LogFormat),
}

/// Validated configuration of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub source: CaptureSource,
    /// BPF filter to apply; explicit or derived from the enabled handlers
    pub filter: Option<String>,
    pub inject: bool,
    pub queue_capacity: usize,
    pub idle_timeout: Duration,
    pub arp_spoof: Option<ArpSpoofConfig>,
    pub tcp_spoof: Option<TcpSpoofConfig>,
    pub conntrack: bool,
    pub data_log: bool,
    pub max_payload: Option<usize>,
    pub payload_output: PayloadOutput,
}

impl Settings {
    /// Parse a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
            .map_err(|e| Error::configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| Error::configuration(format!("invalid configuration: {}", e)))
    }

    /// Config file named by `--config` (if any) with the flags applied on top
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.overlay(cli);
        Ok(settings)
    }

    /// Apply command-line flags over file values
    ///
    /// Repeatable flags add to the lists from the file.
    pub fn overlay(&mut self, cli: &Cli) {
        if let Some(path) = &cli.read {
            self.read = Some(path.clone());
        }
        if let Some(interface) = &cli.interface {
            self.interface = Some(interface.clone());
        }
        if cli.filter.is_some() {
            self.filter = cli.filter.clone();
        }
        if cli.hw_addr.is_some() {
            self.hw_addr = cli.hw_addr.clone();
        }
        self.inject |= cli.inject;
        if let Some(capacity) = cli.queue_capacity {
            self.queue_capacity = capacity;
        }
        if let Some(secs) = cli.idle_timeout {
            self.idle_timeout_secs = secs;
        }

        self.arp_spoof.enabled |= cli.arp_spoof;
        self.arp_spoof.claim.extend(cli.claim.iter().copied());

        self.tcp_spoof.enabled |= cli.tcp_spoof;
        self.tcp_spoof.targets.extend(cli.target.iter().cloned());
        self.tcp_spoof.ports.extend(cli.target_port.iter().copied());
        if cli.tcp_response.is_some() {
            self.tcp_spoof.response = cli.tcp_response.clone();
        }
        if cli.isn.is_some() {
            self.tcp_spoof.isn = cli.isn;
        }

        if cli.no_conntrack {
            self.conntrack = false;
        }
        if cli.no_data_log {
            self.data_log.enabled = false;
        }
        if cli.max_payload.is_some() {
            self.data_log.max_payload = cli.max_payload;
        }
        if cli.log_dest.is_some() {
            self.data_log.dest = cli.log_dest.clone();
        }
        if cli.log_format.is_some() {
            self.data_log.format = cli.log_format;
        }
    }

    /// Check the settings, resolving the hardware address from the live interface
    pub fn validate(self) -> Result<RuntimeConfig> {
        self.validate_with(|name| Interface::by_name(name).map(|iface| iface.mac_address))
    }

    /// Check the settings with a custom interface MAC lookup
    pub fn validate_with<F>(self, resolve_mac: F) -> Result<RuntimeConfig>
    where
        F: Fn(&str) -> Result<MacAddr>,
    {
        let source = match (&self.read, &self.interface) {
            (Some(_), Some(_)) => {
                return Err(Error::configuration(
                    "already set a capture source, do not specify multiple capture sources",
                ))
            }
            (Some(path), None) => CaptureSource::File(path.clone()),
            (None, Some(name)) => CaptureSource::Interface(name.clone()),
            (None, None) => {
                return Err(Error::configuration(
                    "no capture source, use --read FILE or --interface DEV",
                ))
            }
        };

        if self.idle_timeout_secs == 0 {
            return Err(Error::configuration("idle timeout must be at least one second"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::configuration("queue capacity must be at least 1"));
        }
        if self.inject && !matches!(source, CaptureSource::Interface(_)) {
            return Err(Error::configuration("injection needs a live interface"));
        }
        if self.data_log.max_payload == Some(0) {
            return Err(Error::configuration("max payload must be at least 1 byte"));
        }

        let explicit_mac = self.hw_addr.as_deref().map(str::parse::<MacAddr>).transpose()?;

        let arp_spoof = if self.arp_spoof.enabled {
            if self.arp_spoof.claim.is_empty() {
                return Err(Error::configuration("ARP spoofing needs at least one --claim address"));
            }
            let hw_addr = match (explicit_mac, &source) {
                (Some(mac), _) => mac,
                (None, CaptureSource::Interface(name)) => {
                    let mac = resolve_mac(name)?;
                    if mac == MacAddr::ZERO {
                        return Err(Error::configuration(format!(
                            "interface {} has no hardware address, use --hw-addr",
                            name
                        )));
                    }
                    mac
                }
                (None, CaptureSource::File(_)) => {
                    return Err(Error::configuration(
                        "ARP spoofing on a capture file needs --hw-addr",
                    ))
                }
            };
            Some(ArpSpoofConfig::new(self.arp_spoof.claim.iter().copied(), hw_addr))
        } else {
            None
        };

        let tcp_spoof = if self.tcp_spoof.enabled {
            let networks = self
                .tcp_spoof
                .targets
                .iter()
                .map(|net| {
                    net.parse::<IpNetwork>().map_err(|e| {
                        Error::configuration(format!("invalid target network '{}': {}", net, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let targets = TcpTargetFilter::new(networks, self.tcp_spoof.ports.clone());
            if targets.is_empty() {
                return Err(Error::configuration(
                    "TCP spoofing needs at least one --target network or --target-port",
                ));
            }

            let response = match &self.tcp_spoof.response {
                Some(text) => text.parse::<TcpResponse>().map_err(Error::configuration)?,
                None => TcpResponse::default(),
            };
            Some(TcpSpoofConfig {
                targets,
                policy: TcpSpoofPolicy {
                    response,
                    isn: self.tcp_spoof.isn,
                    window: self.tcp_spoof.window.unwrap_or(DEFAULT_WINDOW),
                    ttl: self.tcp_spoof.ttl.unwrap_or(DEFAULT_TTL),
                    hw_addr: explicit_mac,
                },
            })
        } else {
            None
        };

        let format = self.data_log.format.unwrap_or_default();
        let payload_output = match self.data_log.dest.as_deref() {
            None => PayloadOutput::Tracing,
            Some("-") => PayloadOutput::Stdout(format),
            Some("") => return Err(Error::configuration("empty payload log destination")),
            Some(path) => PayloadOutput::File(PathBuf::from(path), format),
        };

        let needs_tcp = tcp_spoof.is_some() || self.conntrack || self.data_log.enabled;
        let filter = self
            .filter
            .or_else(|| filters::handler_filter(arp_spoof.is_some(), needs_tcp));

        Ok(RuntimeConfig {
            source,
            filter,
            inject: self.inject,
            queue_capacity: self.queue_capacity,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            arp_spoof,
            tcp_spoof,
            conntrack: self.conntrack,
            data_log: self.data_log.enabled,
            max_payload: self.data_log.max_payload,
            payload_output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const IFACE_MAC: MacAddr = MacAddr([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["lurker"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let mut settings = Settings::default();
        settings.overlay(&cli);
        settings
    }

    fn validate(args: &[&str]) -> Result<RuntimeConfig> {
        settings(args).validate_with(|_| Ok(IFACE_MAC))
    }

    #[test]
    fn test_minimal_file_replay() {
        let config = validate(&["-r", "dump.pcap"]).unwrap();
        assert_eq!(config.source, CaptureSource::File(PathBuf::from("dump.pcap")));
        assert!(config.arp_spoof.is_none() && config.tcp_spoof.is_none());
        assert!(config.conntrack && config.data_log);
        assert_eq!(config.idle_timeout, Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS));
        assert_eq!(config.payload_output, PayloadOutput::Tracing);
        assert_eq!(config.filter.as_deref(), Some("(tcp) or (vlan and (tcp))"));
    }

    #[test]
    fn test_capture_source_required_and_unique() {
        assert!(matches!(validate(&[]), Err(Error::Configuration(_))));

        let mut both = settings(&["-r", "dump.pcap"]);
        both.interface = Some("eth0".to_string());
        let err = both.validate_with(|_| Ok(IFACE_MAC)).unwrap_err();
        assert!(err.to_string().contains("multiple capture sources"));
    }

    #[test]
    fn test_arp_spoof_resolves_interface_mac() {
        let config = validate(&["-i", "eth0", "--arp-spoof", "--claim", "10.0.0.254"]).unwrap();
        let arp = config.arp_spoof.unwrap();
        assert_eq!(arp.hw_addr, IFACE_MAC);
        assert!(arp.claimed.contains(&Ipv4Addr::new(10, 0, 0, 254)));
        assert_eq!(
            config.filter.as_deref(),
            Some("((arp) or (tcp)) or (vlan and ((arp) or (tcp)))")
        );
    }

    #[test]
    fn test_arp_spoof_requirements() {
        assert!(validate(&["-i", "eth0", "--arp-spoof"]).is_err());
        assert!(validate(&["-r", "x.pcap", "--arp-spoof", "--claim", "10.0.0.1"]).is_err());

        let config = validate(&[
            "-r",
            "x.pcap",
            "--arp-spoof",
            "--claim",
            "10.0.0.1",
            "--hw-addr",
            "02:aa:bb:cc:dd:ee",
        ])
        .unwrap();
        assert_eq!(
            config.arp_spoof.unwrap().hw_addr,
            MacAddr([0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee])
        );

        let no_mac = settings(&["-i", "lo", "--arp-spoof", "--claim", "10.0.0.1"])
            .validate_with(|_| Ok(MacAddr::ZERO));
        assert!(no_mac.is_err());
    }

    #[test]
    fn test_tcp_spoof_settings() {
        assert!(validate(&["-r", "x.pcap", "--tcp-spoof"]).is_err());
        assert!(validate(&["-r", "x.pcap", "--tcp-spoof", "--target", "10.0.0.0/33"]).is_err());
        assert!(validate(&["-r", "x.pcap", "--tcp-spoof", "--target-port", "80", "--tcp-response", "fin"]).is_err());

        let config = validate(&[
            "-r",
            "x.pcap",
            "--tcp-spoof",
            "--target",
            "192.168.0.0/16",
            "--target-port",
            "80",
            "--tcp-response",
            "rst",
            "--isn",
            "42",
        ])
        .unwrap();
        let tcp = config.tcp_spoof.unwrap();
        assert_eq!(tcp.targets.ports, vec![80]);
        assert_eq!(tcp.targets.networks.len(), 1);
        assert_eq!(tcp.policy.response, TcpResponse::Rst);
        assert_eq!(tcp.policy.isn, Some(42));
        assert_eq!(tcp.policy.window, DEFAULT_WINDOW);
    }

    #[test]
    fn test_numeric_limits() {
        assert!(validate(&["-r", "x.pcap", "--idle-timeout", "0"]).is_err());
        assert!(validate(&["-r", "x.pcap", "--queue-capacity", "0"]).is_err());
        assert!(validate(&["-r", "x.pcap", "--max-payload", "0"]).is_err());
        assert!(validate(&["-r", "x.pcap", "--inject"]).is_err());
    }

    #[test]
    fn test_payload_output() {
        let stdout = validate(&["-r", "x.pcap", "--log-dest", "-"]).unwrap();
        assert_eq!(stdout.payload_output, PayloadOutput::Stdout(LogFormat::Json));

        let file = validate(&["-r", "x.pcap", "--log-dest", "out.log", "--log-format", "text"]).unwrap();
        assert_eq!(
            file.payload_output,
            PayloadOutput::File(PathBuf::from("out.log"), LogFormat::Text)
        );
    }

    #[test]
    fn test_yaml_file_with_flag_override() {
        let yaml = r#"
interface: eth0
idle_timeout_secs: 60
hw_addr: "02:00:00:00:00:09"
tcp_spoof:
  enabled: true
  ports: [22]
  response: syn-ack
  ttl: 128
data_log:
  dest: "-"
  format: text
  max_payload: 64
"#;
        let mut settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(settings.conntrack);

        let cli = Cli::try_parse_from(["lurker", "--target-port", "80", "--idle-timeout", "30"]).unwrap();
        settings.overlay(&cli);

        let config = settings.validate_with(|_| Ok(IFACE_MAC)).unwrap();
        assert_eq!(config.source, CaptureSource::Interface("eth0".to_string()));
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.max_payload, Some(64));
        assert_eq!(config.payload_output, PayloadOutput::Stdout(LogFormat::Text));

        let tcp = config.tcp_spoof.unwrap();
        assert_eq!(tcp.targets.ports, vec![22, 80]);
        assert_eq!(tcp.policy.ttl, 128);
        assert_eq!(tcp.policy.hw_addr, Some(MacAddr([2, 0, 0, 0, 0, 9])));
    }

    #[test]
    fn test_unknown_yaml_key_is_rejected() {
        let err = Settings::from_yaml("intreface: eth0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
