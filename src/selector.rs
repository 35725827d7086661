//! Selector sets: which networks, services and service labels to discover.
//!
//! All names and label keys are matched case-insensitively.  Entries are
//! stored under their lowercased form and keep the spelling they were first
//! given with, which is what gets sent to the control plane.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A validated, immutable set of discovery selectors.
///
/// There is always at least one network name, and at least one service name
/// or service label.  Additions go through the consuming `with_*` methods,
/// which can only grow the set and so never break those invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSet {
    network_names: BTreeMap<String, String>,
    service_names: BTreeMap<String, String>,
    service_labels: BTreeMap<String, (String, String)>,
}

impl SelectorSet {
    pub fn builder() -> SelectorSetBuilder {
        SelectorSetBuilder::default()
    }

    /// Build a selector set from explicit lists.
    pub fn new<N, S, L, K, V>(networks: N, services: S, labels: L) -> Result<Self>
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
        L: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut builder = Self::builder();
        for name in networks {
            builder = builder.network_name(name.as_ref());
        }
        for name in services {
            builder = builder.service_name(name.as_ref());
        }
        for (key, value) in labels {
            builder = builder.service_label(key.as_ref(), value.as_ref());
        }
        builder.build()
    }

    /// Build a selector set from raw configuration strings.
    ///
    /// Each argument is a comma-separated list.  Labels are `key=value`
    /// pairs; elements without `=` are ignored.
    pub fn parse(
        networks: Option<&str>,
        services: Option<&str>,
        labels: Option<&str>,
    ) -> Result<Self> {
        let mut builder = Self::builder();
        for name in split_list(networks) {
            builder = builder.network_name(name);
        }
        for name in split_list(services) {
            builder = builder.service_name(name);
        }
        for element in split_list(labels) {
            if let Some((key, value)) = element.split_once('=') {
                builder = builder.service_label(key, value);
            }
        }
        builder.build()
    }

    pub fn network_names(&self) -> impl Iterator<Item = &str> {
        self.network_names.values().map(String::as_str)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.service_names.values().map(String::as_str)
    }

    pub fn service_labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.service_labels
            .values()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn contains_network(&self, name: &str) -> bool {
        self.network_names.contains_key(&name.to_lowercase())
    }

    pub fn contains_service(&self, name: &str) -> bool {
        self.service_names.contains_key(&name.to_lowercase())
    }

    pub fn service_label(&self, key: &str) -> Option<&str> {
        self.service_labels
            .get(&key.to_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn with_network_name(mut self, name: impl AsRef<str>) -> Self {
        insert_name(&mut self.network_names, name.as_ref());
        self
    }

    pub fn with_service_name(mut self, name: impl AsRef<str>) -> Self {
        insert_name(&mut self.service_names, name.as_ref());
        self
    }

    pub fn with_service_label(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        insert_label(&mut self.service_labels, key.as_ref(), value.as_ref());
        self
    }
}

/// Collects selectors before validation.  [`build`](Self::build) is the
/// only way to turn it into a [`SelectorSet`].
#[derive(Debug, Default)]
pub struct SelectorSetBuilder {
    network_names: BTreeMap<String, String>,
    service_names: BTreeMap<String, String>,
    service_labels: BTreeMap<String, (String, String)>,
}

impl SelectorSetBuilder {
    pub fn network_name(mut self, name: impl AsRef<str>) -> Self {
        insert_name(&mut self.network_names, name.as_ref());
        self
    }

    pub fn service_name(mut self, name: impl AsRef<str>) -> Self {
        insert_name(&mut self.service_names, name.as_ref());
        self
    }

    pub fn service_label(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        insert_label(&mut self.service_labels, key.as_ref(), value.as_ref());
        self
    }

    pub fn build(self) -> Result<SelectorSet> {
        if self.network_names.is_empty() {
            log::error!("You must specify at least one network name");
            return Err(Error::MissingNetworks);
        }

        if self.service_names.is_empty() && self.service_labels.is_empty() {
            log::error!("You must specify at least one service name or service label");
            return Err(Error::MissingServiceSelector);
        }

        Ok(SelectorSet {
            network_names: self.network_names,
            service_names: self.service_names,
            service_labels: self.service_labels,
        })
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|element| !element.is_empty())
}

fn insert_name(names: &mut BTreeMap<String, String>, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    names
        .entry(name.to_lowercase())
        .or_insert_with(|| name.to_string());
}

// Last value wins for a repeated key.
fn insert_label(labels: &mut BTreeMap<String, (String, String)>, key: &str, value: &str) {
    let key = key.trim();
    if key.is_empty() {
        return;
    }
    labels
        .entry(key.to_lowercase())
        .and_modify(|(_, existing)| *existing = value.trim().to_string())
        .or_insert_with(|| (key.to_string(), value.trim().to_string()));
}
