//! Peer discovery for containers running as Docker swarm services.
//!
//! A [`SwarmDiscovery`] engine asks the swarm control plane which running
//! tasks belong to a set of services (selected by name or by label) on a set
//! of overlay networks, and works out which of them is the local container.
//! It is meant to be embedded in clustered applications that need to find
//! their siblings without DNS or an external registry.
//!
//! ```no_run
//! use swarm_discovery::{SelectorSet, SwarmDiscovery, DockerControlPlane};
//!
//! # async fn run() -> swarm_discovery::Result<()> {
//! let selectors = SelectorSet::builder()
//!     .network_name("appnet")
//!     .service_label("tier", "frontend")
//!     .build()?;
//! let discovery = SwarmDiscovery::new(DockerControlPlane::from_env()?, selectors);
//!
//! for peer in discovery.discover_containers().await? {
//!     println!("{}", peer.ip());
//! }
//! println!("self: {:?}", discovery.self_address().await);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod runtime;
pub mod selector;
pub mod types;

pub use config::Config;
pub use discovery::{LocalAddresses, SelfIdentity, SwarmDiscovery, SystemInterfaces};
pub use error::{Error, GatewayError, Result};
pub use runtime::{ControlPlane, DockerControlPlane, ServiceFilter};
pub use selector::{SelectorSet, SelectorSetBuilder};
pub use types::{
    DiscoveredContainer, Network, NetworkAttachment, Service, Task, TaskState, VirtualIp,
};
