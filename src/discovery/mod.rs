//! The discovery engine.
//!
//! Every call to [`SwarmDiscovery::discover_containers`] is a fresh snapshot
//! of the control plane: networks are resolved, then each service selector is
//! correlated against them and the results are unioned.  Nothing is cached
//! across calls except the local container's identity.

use std::collections::HashSet;
use std::net::IpAddr;

use log::{debug, error, info};
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::runtime::docker::Endpoint;
use crate::runtime::{ControlPlane, DockerControlPlane};
use crate::selector::SelectorSet;
use crate::types::DiscoveredContainer;

mod correlate;
mod identity;
mod networks;

pub use correlate::correlate;
pub use identity::{locate, LocalAddresses, SelfIdentity, SystemInterfaces};
pub use networks::{resolve_networks, ResolvedNetworks};

pub struct SwarmDiscovery<G, L = SystemInterfaces> {
    gateway: G,
    interfaces: L,
    selectors: SelectorSet,
    identity: OnceCell<SelfIdentity>,
}

impl SwarmDiscovery<DockerControlPlane> {
    /// Engine backed by the Docker engine named in `config`, or in
    /// `DOCKER_HOST` when the config leaves it unset.
    pub fn from_config(config: &Config) -> Result<Self> {
        let selectors = config.selectors()?;
        let endpoint = match &config.docker_host {
            Some(host) => Endpoint::parse(host)?,
            None => Endpoint::from_env()?,
        };

        Ok(Self::new(DockerControlPlane::new(endpoint), selectors))
    }
}

impl<G: ControlPlane> SwarmDiscovery<G> {
    pub fn new(gateway: G, selectors: SelectorSet) -> Self {
        Self::with_interfaces(gateway, SystemInterfaces, selectors)
    }
}

impl<G, L> SwarmDiscovery<G, L>
where
    G: ControlPlane,
    L: LocalAddresses,
{
    pub fn with_interfaces(gateway: G, interfaces: L, selectors: SelectorSet) -> Self {
        Self {
            gateway,
            interfaces,
            selectors,
            identity: OnceCell::new(),
        }
    }

    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn with_network_name(self, name: impl AsRef<str>) -> Self {
        self.map_selectors(|selectors| selectors.with_network_name(name))
    }

    pub fn with_service_name(self, name: impl AsRef<str>) -> Self {
        self.map_selectors(|selectors| selectors.with_service_name(name))
    }

    pub fn with_service_label(self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map_selectors(|selectors| selectors.with_service_label(key, value))
    }

    // New selectors may change which container is ours.
    fn map_selectors(self, f: impl FnOnce(SelectorSet) -> SelectorSet) -> Self {
        Self {
            gateway: self.gateway,
            interfaces: self.interfaces,
            selectors: f(self.selectors),
            identity: OnceCell::new(),
        }
    }

    /// Snapshot of every running container matched by the selectors.
    ///
    /// Any control plane failure fails the whole call; there are no partial
    /// results and no retries.
    pub async fn discover_containers(&self) -> Result<HashSet<DiscoveredContainer>> {
        debug!(
            "Discovering containers: networks = {:?}, services = {:?}, labels = {:?}",
            self.selectors.network_names().collect::<Vec<_>>(),
            self.selectors.service_names().collect::<Vec<_>>(),
            self.selectors.service_labels().collect::<Vec<_>>(),
        );

        let networks = resolve_networks(&self.gateway, &self.selectors).await?;
        let filters = correlate::service_filters(&self.selectors);
        let discovered = correlate::correlate_all(&self.gateway, &networks, &filters).await?;

        debug!("Discovered {} containers", discovered.len());
        Ok(discovered)
    }

    /// Run one self-identification attempt, bypassing the cached identity.
    ///
    /// `Ok(None)` means no local address matched any discovered container,
    /// e.g. because this container is not attached to the network yet.
    pub async fn locate_self(&self) -> Result<Option<SelfIdentity>> {
        let discovered = self.discover_containers().await?;
        let local = self.interfaces.addresses().map_err(Error::Interfaces)?;

        Ok(locate(&discovered, &local))
    }

    /// Establish the self identity if it is not known yet.
    ///
    /// Concurrent callers wait for a single attempt; if that attempt finds
    /// nothing or fails, the next caller tries again.
    pub async fn discover_self(&self) -> Result<Option<&SelfIdentity>> {
        let result = self
            .identity
            .get_or_try_init(|| async {
                match self.locate_self().await {
                    Ok(Some(identity)) => {
                        info!(
                            "Identified self as {} at {}",
                            identity.container, identity.address
                        );
                        Ok(identity)
                    }
                    Ok(None) => Err(None),
                    Err(err) => Err(Some(err)),
                }
            })
            .await;

        match result {
            Ok(identity) => Ok(Some(identity)),
            Err(None) => {
                debug!("No local address matches a discovered container yet");
                Ok(None)
            }
            Err(Some(err)) => Err(err),
        }
    }

    /// The self identity, discovering it on first use.  Errors are logged
    /// and reported as "not known yet".
    pub async fn self_identity(&self) -> Option<&SelfIdentity> {
        match self.discover_self().await {
            Ok(identity) => identity,
            Err(err) => {
                error!("Self discovery failed: {}", err);
                None
            }
        }
    }

    pub async fn self_address(&self) -> Option<IpAddr> {
        self.self_identity().await.map(|identity| identity.address)
    }

    pub async fn self_container(&self) -> Option<&DiscoveredContainer> {
        self.self_identity()
            .await
            .map(|identity| &identity.container)
    }

    /// Forget the cached self identity so the next lookup discovers it again.
    pub fn invalidate_self(&mut self) -> Option<SelfIdentity> {
        self.identity.take()
    }
}
