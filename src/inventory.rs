//! Inventory
//!
//! Loads the service discovery snapshot: the endpoint addresses backing the
//! cluster service and the pods its selector matches. Both lists are merged
//! by pod IP into the placement index, and every known pod becomes a
//! candidate.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use crate::error::{InspectError, Result};
use crate::types::{Candidate, PlacementIndex, PodPlacement};

/// Placement note for pods the service endpoints do not list.
pub const ENDPOINT_MISSING: &str = "Endpoint data missing";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub ip: String,
    pub pod: String,
    #[serde(default)]
    pub node: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodEntry {
    pub name: String,
    pub ip: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub restarts: u32,
    #[serde(default)]
    pub start_time: Option<String>,
}

/// On-disk inventory layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFile {
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
    #[serde(default)]
    pub pods: Vec<PodEntry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub placement: PlacementIndex,
    /// Every known pod, ordered by name
    pub candidates: Vec<Candidate>,
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            InspectError::inventory(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: InventoryFile = serde_yaml::from_str(content)?;
        Self::from_file(file)
    }

    pub fn from_file(file: InventoryFile) -> Result<Self> {
        let mut placement = PlacementIndex::new();

        for endpoint in file.endpoints {
            if endpoint.ip.is_empty() {
                return Err(InspectError::inventory(format!(
                    "endpoint for pod {} has no IP",
                    endpoint.pod
                )));
            }
            placement.insert(PodPlacement {
                name: endpoint.pod,
                ip: endpoint.ip,
                node: endpoint.node,
                ..Default::default()
            });
        }

        for pod in file.pods {
            if pod.ip.is_empty() {
                warn!("Pod {} has no IP yet, skipping", pod.name);
                continue;
            }
            match placement.get_mut(&pod.ip) {
                Some(known) => {
                    known.restarts = pod.restarts;
                    known.start_time = pod.start_time;
                }
                None => {
                    warn!(
                        "Selector matches {} ({}), but it is not included in the endpoints",
                        pod.name, pod.ip
                    );
                    placement.insert(PodPlacement {
                        name: pod.name,
                        ip: pod.ip,
                        node: pod.node,
                        restarts: pod.restarts,
                        start_time: pod.start_time,
                        info: ENDPOINT_MISSING.to_string(),
                    });
                }
            }
        }

        let mut candidates: Vec<Candidate> = placement
            .iter()
            .map(|p| Candidate::new(p.name.clone(), p.ip.clone()))
            .collect();
        candidates.sort();
        debug!("Inventory lists {} candidates", candidates.len());

        Ok(Self {
            placement,
            candidates,
        })
    }
}
