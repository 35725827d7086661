//! Correlation of services, their tasks and the tasks' network attachments.

use std::collections::HashSet;

use futures_util::future::try_join_all;
use log::{debug, info, warn};

use super::networks::ResolvedNetworks;
use crate::error::{Error, Result};
use crate::runtime::{ControlPlane, ServiceFilter};
use crate::selector::SelectorSet;
use crate::types::DiscoveredContainer;

/// One filter per configured service name and one per label pair.  Labels
/// are independent criteria, not a conjunction.
pub(crate) fn service_filters(selectors: &SelectorSet) -> Vec<ServiceFilter> {
    let names = selectors
        .service_names()
        .map(|name| ServiceFilter::Name(name.to_string()));
    let labels = selectors
        .service_labels()
        .map(|(key, value)| ServiceFilter::Label {
            key: key.to_string(),
            value: value.to_string(),
        });

    names.chain(labels).collect()
}

/// Run every filter concurrently and union the results.  The first failing
/// query fails the whole call.
pub(crate) async fn correlate_all<G>(
    gateway: &G,
    networks: &ResolvedNetworks,
    filters: &[ServiceFilter],
) -> Result<HashSet<DiscoveredContainer>>
where
    G: ControlPlane + ?Sized,
{
    let passes = try_join_all(
        filters
            .iter()
            .map(|filter| correlate(gateway, networks, filter)),
    )
    .await?;

    Ok(passes.into_iter().flatten().collect())
}

/// Discover the running tasks of every service matching `filter` that are
/// attached to one of `networks`.
///
/// A service qualifies once per virtual IP that sits on a resolved network.
/// For each such IP, only task attachments on that same network are
/// considered, and only tasks in the running state are kept.
pub async fn correlate<G>(
    gateway: &G,
    networks: &ResolvedNetworks,
    filter: &ServiceFilter,
) -> Result<HashSet<DiscoveredContainer>>
where
    G: ControlPlane + ?Sized,
{
    let services = gateway
        .list_services(filter)
        .await
        .map_err(|err| Error::discovery(format!("listing services matching {filter}"), err))?;

    let mut discovered = HashSet::new();
    for service in &services {
        for vip in &service.virtual_ips {
            let Some(network) = networks.get(&vip.network_id) else {
                continue;
            };

            info!(
                "Found qualifying service {} on network {}[{}:{}]",
                service.name, network.name, network.id, vip.addr
            );

            let tasks = gateway.list_tasks(&service.name).await.map_err(|err| {
                Error::discovery(format!("listing tasks of service {}", service.name), err)
            })?;

            for task in &tasks {
                let attachments = task.attachments.iter().filter(|attachment| {
                    attachment.network_id.eq_ignore_ascii_case(&vip.network_id)
                });

                for attachment in attachments {
                    if !task.is_running() {
                        debug!(
                            "Skipping task {} of service {}: state is {}",
                            task.id, service.name, task.state
                        );
                        continue;
                    }

                    let Some(ip) = attachment.primary_address() else {
                        warn!(
                            "Task {} of service {} has no usable address on network {}",
                            task.id, service.name, network.name
                        );
                        continue;
                    };

                    info!(
                        "Found qualifying task[id: {}, container: {}, state: {}] \
                         on network {}[{}:{}]",
                        task.id,
                        task.container_id.as_deref().unwrap_or("-"),
                        task.state,
                        network.name,
                        network.id,
                        ip
                    );

                    discovered.insert(DiscoveredContainer::new(
                        ip,
                        network.clone(),
                        service.clone(),
                        task.clone(),
                        attachment.clone(),
                    ));
                }
            }
        }
    }

    Ok(discovered)
}
