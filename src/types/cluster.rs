//! Cluster Data Types
//!
//! What a single member reports about the cluster:
//! - Slot ranges and their owners
//! - The node roster, keyed by host
//! - Flat statistics gathered from the info reports

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flag carried by the roster entry of the answering member.
pub const SELF_FLAG: &str = "myself";

/// Display term for replica roles.
pub const REPLICA_DISPLAY: &str = "repl.";

/// Role reported when no roster entry carries the self flag.
pub const UNKNOWN_ROLE: &str = "unknown";

/// Reserved statistics key for the key count; `@` never occurs in report field names.
pub const KEY_COUNT: &str = "@keys";

/// A member process selected for querying.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Pod name
    pub name: String,
    /// Host part of the member endpoint (pod IP)
    pub address: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// `host:port` as it appears in the member's own slot and roster reports.
    pub fn endpoint(&self, port: u16) -> String {
        format!("{}:{}", self.address, port)
    }
}

/// Cluster member identified by its `host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub address: String,
}

impl NodeRef {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            address: format!("{}:{}", host, port),
        }
    }

    /// Host portion, split on the first `:`.
    pub fn host(&self) -> &str {
        split_host(&self.address)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

pub(crate) fn split_host(address: &str) -> &str {
    match address.split_once(':') {
        Some((host, _)) => host,
        None => address,
    }
}

/// Inclusive slot range; the first owner is the primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
    pub owners: Vec<NodeRef>,
}

impl SlotRange {
    pub fn len(&self) -> usize {
        usize::from(self.end.saturating_sub(self.start)) + 1
    }

    pub fn primary(&self) -> Option<&NodeRef> {
        self.owners.first()
    }

    pub fn replicas(&self) -> &[NodeRef] {
        self.owners.get(1..).unwrap_or(&[])
    }

    pub fn is_owned_by(&self, address: &str) -> bool {
        self.owners.iter().any(|owner| owner.address == address)
    }
}

/// Risk annotation derived for a slot range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Remark {
    /// The range has a primary only
    ReplicaMissing,
    /// All owners run on the same physical node
    SameHost,
}

impl fmt::Display for Remark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remark::ReplicaMissing => f.write_str("ReplicaMissing"),
            Remark::SameHost => f.write_str("SameHost"),
        }
    }
}

/// One roster line of the member's node report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: String,
    pub address: NodeRef,
    pub flags: Vec<String>,
    /// Id of the primary this node replicates, if any
    pub primary_id: Option<String>,
    pub ping_sent: u64,
    pub pong_recv: u64,
    pub config_epoch: u64,
    pub link_state: String,
    pub slots: Vec<String>,
}

impl NodeStatus {
    pub fn is_self(&self) -> bool {
        self.flags.iter().any(|flag| flag == SELF_FLAG)
    }

    pub fn flags_text(&self) -> String {
        self.flags.join(",")
    }
}

/// Non-fatal irregularities found while parsing replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseAnomaly {
    /// A roster line had fewer tokens than required
    ShortLine { tokens: usize },
    /// A roster address token had no port
    BadAddress(String),
    /// No roster entry carried the self flag
    MissingSelf,
    /// More than one roster entry carried the self flag; the later ones lost it
    DuplicateSelf(String),
}

/// Roster keyed by host; later lines for the same host replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub nodes: BTreeMap<String, NodeStatus>,
    pub anomalies: Vec<ParseAnomaly>,
}

impl Roster {
    pub fn get(&self, host: &str) -> Option<&NodeStatus> {
        self.nodes.get(host)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn myself(&self) -> Option<&NodeStatus> {
        self.nodes.values().find(|node| node.is_self())
    }

    /// Role of the answering member for display, or `unknown`.
    pub fn self_role(&self) -> String {
        match self.myself() {
            Some(node) => normalize_role(&node.flags_text()),
            None => UNKNOWN_ROLE.to_string(),
        }
    }
}

/// Drops the self flag and shortens the replica synonym.
///
/// Works token-wise so applying it twice changes nothing.
pub fn normalize_role(flags: &str) -> String {
    flags
        .split(',')
        .filter(|flag| !flag.is_empty() && *flag != SELF_FLAG)
        .map(|flag| if flag == "slave" { REPLICA_DISPLAY } else { flag })
        .collect::<Vec<_>>()
        .join(",")
}

/// Flat property bag merged from the statistics reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsInfo(BTreeMap<String, String>);

impl StatsInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn extend(&mut self, other: StatsInfo) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Base-10 key count, or empty when unavailable.
    pub fn key_count(&self) -> String {
        self.get(KEY_COUNT)
            .filter(|v| v.parse::<u64>().is_ok())
            .unwrap_or_default()
            .to_string()
    }

    /// One `key:value` line per entry.
    pub fn to_report(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect()
    }
}

impl FromIterator<(String, String)> for StatsInfo {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
