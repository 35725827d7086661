//! Resolution of configured network names to the networks that exist.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::runtime::ControlPlane;
use crate::selector::SelectorSet;
use crate::types::Network;

/// Networks matched by the configured names, keyed by network id.
///
/// Ids are compared case-insensitively and iterate in lexical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedNetworks {
    by_id: BTreeMap<String, Network>,
}

impl ResolvedNetworks {
    pub fn get(&self, id: &str) -> Option<&Network> {
        self.by_id.get(&id.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.by_id.values()
    }

    fn insert(&mut self, network: Network) {
        self.by_id.insert(network.id.to_lowercase(), network);
    }
}

/// Look up every configured network name, one query per name.
///
/// A name that matches nothing is logged and skipped.
pub async fn resolve_networks<G>(gateway: &G, selectors: &SelectorSet) -> Result<ResolvedNetworks>
where
    G: ControlPlane + ?Sized,
{
    let mut resolved = ResolvedNetworks::default();

    for name in selectors.network_names() {
        let networks = gateway
            .list_networks(name)
            .await
            .map_err(|err| Error::discovery(format!("listing networks named {name}"), err))?;

        let mut found = false;
        for network in networks
            .into_iter()
            .filter(|network| network.name.to_lowercase() == name.to_lowercase())
        {
            info!("Found relevant network: {}[{}]", network.name, network.id);
            resolved.insert(network);
            found = true;
        }

        if !found {
            warn!("No network named {} exists", name);
        }
    }

    Ok(resolved)
}
