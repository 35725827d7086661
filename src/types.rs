//! Descriptors returned by the control plane and the discovery output.
//!
//! These mirror the subset of the orchestrator's network, service and task
//! objects that discovery needs.  They are plain values: every field takes
//! part in equality and hashing so that a [`DiscoveredContainer`] can be
//! deduplicated inside a `HashSet`.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::Deserialize;

/// An overlay network known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Network {
    pub id: String,
    pub name: String,
}

/// A stable service address on one network.  `addr` is kept as reported,
/// usually in CIDR form (`10.0.0.5/24`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualIp {
    pub network_id: String,
    pub addr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub virtual_ips: Vec<VirtualIp>,
}

/// Lifecycle state of a task as reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    New,
    Allocated,
    Pending,
    Assigned,
    Accepted,
    Preparing,
    Ready,
    Starting,
    Running,
    Complete,
    Shutdown,
    Failed,
    Rejected,
    Remove,
    Orphaned,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::New => "new",
            TaskState::Allocated => "allocated",
            TaskState::Pending => "pending",
            TaskState::Assigned => "assigned",
            TaskState::Accepted => "accepted",
            TaskState::Preparing => "preparing",
            TaskState::Ready => "ready",
            TaskState::Starting => "starting",
            TaskState::Running => "running",
            TaskState::Complete => "complete",
            TaskState::Shutdown => "shutdown",
            TaskState::Failed => "failed",
            TaskState::Rejected => "rejected",
            TaskState::Remove => "remove",
            TaskState::Orphaned => "orphaned",
            TaskState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Binding of a task to a network, with the addresses it was given there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkAttachment {
    pub network_id: String,
    pub addresses: Vec<String>,
}

impl NetworkAttachment {
    /// First address that parses as an IP, with any prefix length removed.
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses.iter().find_map(|addr| parse_address(addr))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    pub id: String,
    pub service_id: String,
    pub state: TaskState,
    /// Only set once the task has a container.
    pub container_id: Option<String>,
    pub attachments: Vec<NetworkAttachment>,
}

impl Task {
    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }
}

/// A running task reachable on one of the configured networks.
///
/// Two records are equal only when every field is equal, so the same task
/// matched through several selectors collapses into a single entry while the
/// same task on two qualifying networks stays as two entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredContainer {
    ip: IpAddr,
    network: Network,
    service: Service,
    task: Task,
    attachment: NetworkAttachment,
}

impl DiscoveredContainer {
    pub fn new(
        ip: IpAddr,
        network: Network,
        service: Service,
        task: Task,
        attachment: NetworkAttachment,
    ) -> Self {
        Self {
            ip,
            network,
            service,
            task,
            attachment,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn network_attachment(&self) -> &NetworkAttachment {
        &self.attachment
    }

    pub fn container_id(&self) -> Option<&str> {
        self.task.container_id.as_deref()
    }
}

impl fmt::Display for DiscoveredContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[task: {}] on {}[{}:{}]",
            self.service.name, self.task.id, self.network.name, self.network.id, self.ip
        )
    }
}

/// Parse `10.0.0.9` or `10.0.0.9/24` into an address.
pub fn parse_address(raw: &str) -> Option<IpAddr> {
    let host = raw.split_once('/').map_or(raw, |(host, _)| host);
    host.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_prefix_is_stripped() {
        assert_eq!(parse_address("10.0.0.9/24"), Some("10.0.0.9".parse().unwrap()));
        assert_eq!(parse_address("10.0.0.9"), Some("10.0.0.9".parse().unwrap()));
        assert_eq!(
            parse_address("fd00::12/64"),
            Some("fd00::12".parse().unwrap())
        );
        assert_eq!(parse_address("not-an-ip/24"), None);
        assert_eq!(parse_address(""), None);
    }

    #[test]
    fn primary_address_skips_garbage() {
        let attachment = NetworkAttachment {
            network_id: "n1".into(),
            addresses: vec!["".into(), "10.0.1.4/24".into(), "10.0.1.5/24".into()],
        };
        assert_eq!(
            attachment.primary_address(),
            Some("10.0.1.4".parse().unwrap())
        );

        let empty = NetworkAttachment {
            network_id: "n1".into(),
            addresses: vec![],
        };
        assert_eq!(empty.primary_address(), None);
    }

    #[test]
    fn task_state_decodes_unknown_values() {
        let state: TaskState = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(state, TaskState::Running);

        let state: TaskState = serde_json::from_str("\"something-new\"").unwrap();
        assert_eq!(state, TaskState::Unknown);
        assert_eq!(TaskState::Shutdown.to_string(), "shutdown");
    }
}
