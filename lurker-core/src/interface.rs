//! Network interface lookup

use crate::{Error, MacAddr};
use pnet_datalink::{self, Channel, DataLinkSender, NetworkInterface};
use std::fmt;

/// Network interface
#[derive(Debug, Clone)]
pub struct Interface {
    /// Interface name (e.g., "eth0", "en0")
    pub name: String,
    /// Interface index
    pub index: u32,
    /// MAC address (zero when the interface has none)
    pub mac_address: MacAddr,
    /// Is interface up?
    pub is_up: bool,
    /// Is this the loopback interface?
    pub is_loopback: bool,
}

impl From<&NetworkInterface> for Interface {
    fn from(iface: &NetworkInterface) -> Self {
        let mac_bytes = match iface.mac {
            Some(mac) => [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5],
            None => [0, 0, 0, 0, 0, 0],
        };

        Self {
            name: iface.name.clone(),
            index: iface.index,
            mac_address: MacAddr(mac_bytes),
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
        }
    }
}

impl Interface {
    /// Get interface by name
    pub fn by_name(name: &str) -> Result<Self, Error> {
        find(name).map(|iface| Self::from(&iface))
    }

    /// List all available interfaces
    pub fn list_all() -> Vec<Self> {
        pnet_datalink::interfaces()
            .iter()
            .map(Self::from)
            .collect()
    }

    /// Whether the interface has a usable hardware address
    pub fn has_mac(&self) -> bool {
        self.mac_address != MacAddr::ZERO
    }

    /// Open a persistent layer-2 sender on this interface
    pub fn open_sender(&self) -> Result<Box<dyn DataLinkSender>, Error> {
        let interface = find(&self.name)?;

        match pnet_datalink::channel(&interface, Default::default()) {
            Ok(Channel::Ethernet(tx, _rx)) => Ok(tx),
            Ok(_) => Err(Error::Interface("Unsupported channel type".to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(Error::Interface(
                format!("Permission denied opening {} (need root or CAP_NET_RAW)", self.name),
            )),
            Err(e) => Err(Error::Interface(format!("Failed to create channel: {}", e))),
        }
    }
}

fn find(name: &str) -> Result<NetworkInterface, Error> {
    pnet_datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mac_address)?;
        if !self.is_up {
            write!(f, " [down]")?;
        }
        if self.is_loopback {
            write!(f, " [loopback]")?;
        }
        Ok(())
    }
}
