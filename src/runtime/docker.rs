//! Docker Engine API implementation of [`ControlPlane`].
//!
//! Every query opens its own HTTP/1.1 connection to the engine, either over
//! the local unix socket or over plain TCP, depending on `DOCKER_HOST`.  The
//! engine must be a swarm manager for the service and task endpoints to work.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Method, Request, Response};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use log::{debug, info};
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};

use super::{ControlPlane, ServiceFilter};
use crate::error::GatewayError;
use crate::types::{Network, NetworkAttachment, Service, Task, TaskState, VirtualIp};

const DEFAULT_SOCKET: &str = "/var/run/docker.sock";
const DEFAULT_TCP_PORT: u16 = 2375;

/// Where the Docker engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Unix(PathBuf::from(DEFAULT_SOCKET))
    }
}

impl Endpoint {
    /// Parse a `DOCKER_HOST` style address: `unix:///path`, `tcp://host:port`
    /// or `http://host:port`.
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let raw = raw.trim();

        if let Some(path) = raw.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(GatewayError::InvalidEndpoint(raw.to_string()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        for scheme in ["tcp://", "http://"] {
            if let Some(addr) = raw.strip_prefix(scheme) {
                let addr = addr.trim_end_matches('/');
                if addr.is_empty() || addr.contains('/') {
                    return Err(GatewayError::InvalidEndpoint(raw.to_string()));
                }
                // A bare host or a bracketed IPv6 literal without a port.
                let has_port = match addr.rfind(']') {
                    Some(bracket) => addr[bracket..].contains(':'),
                    None => addr.contains(':'),
                };
                let addr = if has_port {
                    addr.to_string()
                } else {
                    format!("{addr}:{DEFAULT_TCP_PORT}")
                };
                return Ok(Endpoint::Tcp(addr));
            }
        }

        Err(GatewayError::InvalidEndpoint(raw.to_string()))
    }

    /// `DOCKER_HOST` if set, the default unix socket otherwise.
    pub fn from_env() -> Result<Self, GatewayError> {
        match env::var("DOCKER_HOST") {
            Ok(host) if !host.trim().is_empty() => Self::parse(&host),
            _ => Ok(Self::default()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

pub struct DockerControlPlane {
    endpoint: Endpoint,
}

impl DockerControlPlane {
    pub fn new(endpoint: Endpoint) -> Self {
        info!("Using Docker control plane at {}", endpoint);
        Self { endpoint }
    }

    pub fn from_env() -> Result<Self, GatewayError> {
        Endpoint::from_env().map(Self::new)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &HashMap<&str, Vec<String>>,
    ) -> Result<T, GatewayError> {
        let uri = format!("{path}?filters={}", encode_filters(filters)?);
        let host = match &self.endpoint {
            Endpoint::Unix(_) => "docker".to_string(),
            Endpoint::Tcp(addr) => addr.clone(),
        };
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::HOST, host)
            .body(Empty::<Bytes>::new())?;

        debug!("GET {} via {}", req.uri(), self.endpoint);

        let resp = match &self.endpoint {
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .map_err(|source| self.connect_error(source))?;
                send(stream, req).await?
            }
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|source| self.connect_error(source))?;
                send(stream, req).await?
            }
        };

        let (parts, body) = resp.into_parts();
        let data = body.collect().await?.to_bytes();
        if !parts.status.is_success() {
            return Err(GatewayError::UnexpectedStatus {
                code: parts.status,
                body: String::from_utf8_lossy(&data).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&data)?)
    }

    fn connect_error(&self, source: std::io::Error) -> GatewayError {
        GatewayError::Connect {
            endpoint: self.endpoint.to_string(),
            source,
        }
    }
}

async fn send<S>(stream: S, req: Request<Empty<Bytes>>) -> Result<Response<Incoming>, GatewayError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!("Docker connection closed with error: {}", err);
        }
    });

    Ok(sender.send_request(req).await?)
}

fn encode_filters(filters: &HashMap<&str, Vec<String>>) -> Result<String, GatewayError> {
    let json = serde_json::to_string(filters).map_err(GatewayError::Encode)?;
    Ok(percent_encode(json.as_bytes(), NON_ALPHANUMERIC).to_string())
}

fn filter(key: &'static str, value: String) -> HashMap<&'static str, Vec<String>> {
    HashMap::from([(key, vec![value])])
}

#[async_trait]
impl ControlPlane for DockerControlPlane {
    async fn list_networks(&self, name: &str) -> Result<Vec<Network>, GatewayError> {
        let networks: Vec<WireNetwork> = self
            .fetch("/networks", &filter("name", name.to_string()))
            .await?;

        // The engine's name filter also matches substrings.
        Ok(networks
            .into_iter()
            .map(Network::from)
            .filter(|network| network.name.eq_ignore_ascii_case(name))
            .collect())
    }

    async fn list_services(&self, criteria: &ServiceFilter) -> Result<Vec<Service>, GatewayError> {
        let filters = match criteria {
            ServiceFilter::Name(name) => filter("name", name.clone()),
            ServiceFilter::Label { key, value } => filter("label", format!("{key}={value}")),
        };
        let services: Vec<WireService> = self.fetch("/services", &filters).await?;

        let services = services.into_iter().map(Service::from);
        Ok(match criteria {
            ServiceFilter::Name(name) => services
                .filter(|service| service.name.eq_ignore_ascii_case(name))
                .collect(),
            ServiceFilter::Label { .. } => services.collect(),
        })
    }

    async fn list_tasks(&self, service_name: &str) -> Result<Vec<Task>, GatewayError> {
        let tasks: Vec<WireTask> = self
            .fetch("/tasks", &filter("service", service_name.to_string()))
            .await?;

        Ok(tasks.into_iter().map(Task::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct WireNetwork {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
}

impl From<WireNetwork> for Network {
    fn from(wire: WireNetwork) -> Self {
        Network {
            id: wire.id,
            name: wire.name,
        }
    }
}

#[derive(Deserialize)]
struct WireService {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Spec", default)]
    spec: Option<WireServiceSpec>,
    #[serde(rename = "Endpoint", default)]
    endpoint: Option<WireEndpoint>,
}

#[derive(Deserialize)]
struct WireServiceSpec {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
struct WireEndpoint {
    #[serde(rename = "VirtualIPs", default)]
    virtual_ips: Option<Vec<WireVirtualIp>>,
}

#[derive(Deserialize)]
struct WireVirtualIp {
    #[serde(rename = "NetworkID", default)]
    network_id: String,
    #[serde(rename = "Addr", default)]
    addr: String,
}

impl From<WireService> for Service {
    fn from(wire: WireService) -> Self {
        let (name, labels) = match wire.spec {
            Some(spec) => (spec.name, spec.labels.unwrap_or_default()),
            None => (String::new(), BTreeMap::new()),
        };
        let virtual_ips = wire
            .endpoint
            .and_then(|endpoint| endpoint.virtual_ips)
            .unwrap_or_default()
            .into_iter()
            .map(|vip| VirtualIp {
                network_id: vip.network_id,
                addr: vip.addr,
            })
            .collect();

        Service {
            id: wire.id,
            name,
            labels,
            virtual_ips,
        }
    }
}

#[derive(Deserialize)]
struct WireTask {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "ServiceID", default)]
    service_id: String,
    #[serde(rename = "Status", default)]
    status: Option<WireTaskStatus>,
    #[serde(rename = "NetworksAttachments", default)]
    networks_attachments: Option<Vec<WireAttachment>>,
}

#[derive(Deserialize)]
struct WireTaskStatus {
    #[serde(rename = "State", default)]
    state: Option<TaskState>,
    #[serde(rename = "ContainerStatus", default)]
    container_status: Option<WireContainerStatus>,
}

#[derive(Deserialize)]
struct WireContainerStatus {
    #[serde(rename = "ContainerID", default)]
    container_id: Option<String>,
}

#[derive(Deserialize)]
struct WireAttachment {
    #[serde(rename = "Network", default)]
    network: Option<WireAttachedNetwork>,
    #[serde(rename = "Addresses", default)]
    addresses: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct WireAttachedNetwork {
    #[serde(rename = "ID", default)]
    id: String,
}

impl From<WireTask> for Task {
    fn from(wire: WireTask) -> Self {
        let (state, container_id) = match wire.status {
            Some(status) => (
                status.state.unwrap_or(TaskState::Unknown),
                status
                    .container_status
                    .and_then(|container| container.container_id)
                    .filter(|id| !id.is_empty()),
            ),
            None => (TaskState::Unknown, None),
        };
        let attachments = wire
            .networks_attachments
            .unwrap_or_default()
            .into_iter()
            .filter_map(|attachment| {
                let network = attachment.network?;
                Some(NetworkAttachment {
                    network_id: network.id,
                    addresses: attachment.addresses.unwrap_or_default(),
                })
            })
            .collect();

        Task {
            id: wire.id,
            service_id: wire.service_id,
            state,
            container_id,
            attachments,
        }
    }
}
