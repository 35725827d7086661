//! Manual harness: polls discovery and logs what it finds.

use std::time::Duration;

use log::{error, info};
use tokio::signal;
use tokio::time::sleep;

use swarm_discovery::{Config, SwarmDiscovery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting swarm discovery with config: {:?}", cfg);

    let discovery = SwarmDiscovery::from_config(&cfg)?;
    info!("Using Docker endpoint {}", discovery.gateway().endpoint());
    let interval = Duration::from_secs(cfg.poll_interval);

    let poll = async {
        for _ in 0..cfg.iterations {
            let me = discovery
                .self_address()
                .await
                .map_or_else(|| "unknown".to_string(), |ip| ip.to_string());

            match discovery.discover_containers().await {
                Ok(containers) => {
                    info!("MyAddress: {} total nodes: [{}]", me, containers.len());

                    let mut ips = containers
                        .iter()
                        .map(|container| container.ip().to_string())
                        .collect::<Vec<_>>();
                    ips.sort();
                    info!("Discovered nodes including self:\n{}", ips.join("\n"));
                }
                Err(e) => {
                    error!("Discovery failed: {}", e);
                }
            }

            sleep(interval).await;
        }
    };

    // Graceful Shutdown
    tokio::select! {
        _ = poll => {
            info!("Finished polling");
        }
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        },
    }

    Ok(())
}
