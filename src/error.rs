//! Error types shared across the crate.

use std::io;

/// Failure reported by a [`ControlPlane`](crate::runtime::ControlPlane) query.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid control plane endpoint `{0}`")]
    InvalidEndpoint(String),
    #[error("failed to connect to `{endpoint}`: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),
    #[error("http transport error: {0}")]
    Transport(#[from] hyper::Error),
    #[error("unexpected status code {code}, body: {body}")]
    UnexpectedStatus { code: http::StatusCode, body: String },
    #[error("failed to encode query filters: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("at least one network name must be configured")]
    MissingNetworks,
    #[error("at least one service name or service label must be configured")]
    MissingServiceSelector,
    #[error("container discovery failed while {operation}: {source}")]
    Discovery {
        operation: String,
        #[source]
        source: GatewayError,
    },
    #[error("failed to enumerate local interface addresses: {0}")]
    Interfaces(#[source] io::Error),
    #[error("failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl Error {
    pub(crate) fn discovery(operation: impl Into<String>, source: GatewayError) -> Self {
        Error::Discovery {
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error was raised while validating selectors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::MissingNetworks | Error::MissingServiceSelector)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
