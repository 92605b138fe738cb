//! Pod placement metadata supplied by discovery.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use super::cluster::split_host;

/// Where a member pod runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodPlacement {
    pub name: String,
    pub ip: String,
    /// Physical (worker) node hosting the pod
    pub node: String,
    #[serde(default)]
    pub restarts: u32,
    #[serde(default)]
    pub start_time: Option<String>,
    /// Free-form note shown next to the pod, e.g. missing endpoint data
    #[serde(default)]
    pub info: String,
}

/// Placement lookup keyed by pod IP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementIndex {
    pods: BTreeMap<String, PodPlacement>,
}

impl PlacementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, placement: PodPlacement) {
        self.pods.insert(placement.ip.clone(), placement);
    }

    pub fn get_mut(&mut self, ip: &str) -> Option<&mut PodPlacement> {
        self.pods.get_mut(ip)
    }

    /// Looks up `host` or `host:port`.
    pub fn lookup(&self, address: &str) -> Option<&PodPlacement> {
        self.pods.get(split_host(address))
    }

    /// Physical node for an address, if known and non-empty.
    pub fn node_of(&self, address: &str) -> Option<&str> {
        self.lookup(address)
            .map(|p| p.node.as_str())
            .filter(|node| !node.is_empty())
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PodPlacement> {
        self.pods.values()
    }
}

impl FromIterator<PodPlacement> for PlacementIndex {
    fn from_iter<T: IntoIterator<Item = PodPlacement>>(iter: T) -> Self {
        let mut index = Self::new();
        for placement in iter {
            index.insert(placement);
        }
        index
    }
}
