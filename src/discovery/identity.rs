//! Working out which discovered container is the local process.
//!
//! Overlay drivers attach containers through interfaces whose names and
//! addresses are not known up front, so the local container is found by
//! intersecting every local address with the discovered addresses.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};

use crate::types::DiscoveredContainer;

/// Source of the addresses bound to this host's interfaces.
pub trait LocalAddresses: Send + Sync {
    fn addresses(&self) -> io::Result<Vec<IpAddr>>;
}

/// Addresses of all interfaces on this host, via `getifaddrs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl LocalAddresses for SystemInterfaces {
    fn addresses(&self) -> io::Result<Vec<IpAddr>> {
        let ifaddrs = nix::ifaddrs::getifaddrs()?;

        let addrs = ifaddrs
            .filter_map(|ifaddr| {
                let address = ifaddr.address?;
                if let Some(sin) = address.as_sockaddr_in() {
                    return Some(IpAddr::V4(*SocketAddrV4::from(*sin).ip()));
                }

                address
                    .as_sockaddr_in6()
                    .map(|sin6| IpAddr::V6(*SocketAddrV6::from(*sin6).ip()))
            })
            .collect();

        Ok(addrs)
    }
}

/// A fixed address list, for hosts simulated in tests or configured by hand.
impl LocalAddresses for Vec<IpAddr> {
    fn addresses(&self) -> io::Result<Vec<IpAddr>> {
        Ok(self.clone())
    }
}

/// The local address and the discovered container that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfIdentity {
    pub address: IpAddr,
    pub container: DiscoveredContainer,
}

/// First local address that belongs to a discovered container.
pub fn locate(
    discovered: &HashSet<DiscoveredContainer>,
    local: &[IpAddr],
) -> Option<SelfIdentity> {
    let by_ip: HashMap<IpAddr, &DiscoveredContainer> = discovered
        .iter()
        .map(|container| (container.ip(), container))
        .collect();

    local.iter().find_map(|address| {
        by_ip.get(address).map(|container| SelfIdentity {
            address: *address,
            container: (*container).clone(),
        })
    })
}
