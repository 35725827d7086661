use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::selector::SelectorSet;

/// Raw discovery settings, as read from files and the environment.
///
/// The selector fields are comma-separated lists; labels are `key=value`
/// pairs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_names: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_names: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_labels: Option<String>,
    /// Overrides `DOCKER_HOST`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_host: Option<String>,
    /// Seconds between polls of the harness binary.
    pub poll_interval: u64,
    pub iterations: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_names: None,
            service_names: None,
            service_labels: None,
            docker_host: None,
            poll_interval: 1,
            iterations: 300,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::figment()
            .extract()
            .map_err(|e| Error::Config(Box::new(e)))
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("swarm-discovery.toml"))
            .merge(Json::file("swarm-discovery.json"))
            .merge(Env::prefixed("SWARM_DISCOVERY_"))
    }

    pub fn selectors(&self) -> Result<SelectorSet> {
        SelectorSet::parse(
            self.network_names.as_deref(),
            self.service_names.as_deref(),
            self.service_labels.as_deref(),
        )
    }
}
