use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::{Network, Service, Task};

pub mod docker;
pub use docker::DockerControlPlane;

/// Criterion used to ask the control plane for candidate services.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceFilter {
    Name(String),
    Label { key: String, value: String },
}

impl fmt::Display for ServiceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceFilter::Name(name) => write!(f, "name {name}"),
            ServiceFilter::Label { key, value } => write!(f, "label {key}={value}"),
        }
    }
}

/// Read-only view of the orchestrator's control plane.
///
/// Implementations do the filtering: discovery trusts whatever comes back as
/// the candidate set.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Networks whose name equals `name`.
    async fn list_networks(&self, name: &str) -> Result<Vec<Network>, GatewayError>;

    /// Services matching `filter`.
    async fn list_services(&self, filter: &ServiceFilter) -> Result<Vec<Service>, GatewayError>;

    /// All tasks, in any state, of the service called `service_name`.
    async fn list_tasks(&self, service_name: &str) -> Result<Vec<Task>, GatewayError>;
}

#[async_trait]
impl<T: ControlPlane + ?Sized> ControlPlane for Arc<T> {
    async fn list_networks(&self, name: &str) -> Result<Vec<Network>, GatewayError> {
        (**self).list_networks(name).await
    }

    async fn list_services(&self, filter: &ServiceFilter) -> Result<Vec<Service>, GatewayError> {
        (**self).list_services(filter).await
    }

    async fn list_tasks(&self, service_name: &str) -> Result<Vec<Task>, GatewayError> {
        (**self).list_tasks(service_name).await
    }
}
