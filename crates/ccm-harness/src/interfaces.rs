//! Loopback interface discovery.

use crate::{Error, Result};
use nix::ifaddrs::getifaddrs;
use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddrV4;

/// An IPv4 address bound to a named interface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterfaceBinding {
    /// Interface name, including any alias label (`lo:ccm0`).
    pub interface: String,

    /// Dotted-quad address.
    pub address: String,
}

impl InterfaceBinding {
    /// Creates a binding.
    pub fn new(interface: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for InterfaceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.interface, self.address)
    }
}

/// Source of the bindings currently present on the host.
pub trait InterfaceSource {
    /// Returns every IPv4 binding on interfaces whose name starts with `prefix`.
    fn bindings(&self, prefix: &str) -> Result<BTreeSet<InterfaceBinding>>;
}

/// Reads bindings with `getifaddrs(3)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn bindings(&self, prefix: &str) -> Result<BTreeSet<InterfaceBinding>> {
        let addrs = getifaddrs().map_err(Error::InterfaceQuery)?;

        let bindings = addrs
            .filter(|ifaddr| ifaddr.interface_name.starts_with(prefix))
            .filter_map(|ifaddr| {
                let storage = ifaddr.address?;
                let sin = *storage.as_sockaddr_in()?;
                let address = SocketAddrV4::from(sin).ip().to_string();
                Some(InterfaceBinding::new(ifaddr.interface_name, address))
            })
            .collect();

        Ok(bindings)
    }
}
