//! Topology Reconciler
//!
//! Folds the per-member results into one cluster map:
//! - Picks a single authoritative slot view and reports members that disagree
//! - Joins slot owners with pod placement and tags risky ranges
//! - Summarizes every candidate for the node view

use serde::Serialize;
use tracing::{debug, warn};
use crate::collector::{NodeSnapshot, QueryResult};
use crate::types::{Candidate, PlacementIndex, Remark, SlotRange};

/// Remark shown for candidates whose pipeline failed.
pub const UNAVAILABLE_REMARK: &str = "RedisUnavailable";

/// Pod and physical node an owner address resolved to; empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OwnerPlacement {
    pub address: String,
    pub pod: String,
    pub host: String,
    /// Placement note carried over from discovery
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedRange {
    pub range: SlotRange,
    /// One entry per owner, in owner order
    pub owners: Vec<OwnerPlacement>,
    pub remarks: Vec<Remark>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub candidate: String,
    pub error: String,
}

/// One row of the node view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub host: String,
    pub name: String,
    pub ip: String,
    pub role: String,
    pub keys: String,
    pub slots: String,
    pub ranges: String,
    pub state: String,
    pub uptime: String,
    pub remarks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub ranges: Vec<AnnotatedRange>,
    pub candidate_count: usize,
    pub failures: Vec<Failure>,
    /// Candidate whose slot view is authoritative
    pub reporter: Option<String>,
    /// Candidates whose slot view differs from the reporter's
    pub disagreeing: Vec<String>,
    pub nodes: Vec<NodeSummary>,
}

impl Topology {
    pub fn success_count(&self) -> usize {
        self.candidate_count - self.failures.len()
    }

    /// Slots and ranges whose owners include `address`.
    pub fn slot_totals(&self, address: &str) -> (usize, usize) {
        slot_totals(&self.ranges, address)
    }
}

fn slot_totals(ranges: &[AnnotatedRange], address: &str) -> (usize, usize) {
    ranges
        .iter()
        .filter(|r| r.range.is_owned_by(address))
        .fold((0, 0), |(slots, count), r| (slots + r.range.len(), count + 1))
}

/// Remarks for one range, in fixed order.
pub fn range_remarks(range: &SlotRange, placement: &PlacementIndex) -> Vec<Remark> {
    let mut remarks = Vec::new();
    if range.owners.len() == 1 {
        remarks.push(Remark::ReplicaMissing);
    }
    if range.owners.len() > 1 && same_host(range, placement) {
        remarks.push(Remark::SameHost);
    }
    remarks
}

/// True when every owner resolves to one physical node. Any unresolved
/// owner makes the answer false.
fn same_host(range: &SlotRange, placement: &PlacementIndex) -> bool {
    let mut nodes = range.owners.iter().map(|owner| placement.node_of(&owner.address));
    let Some(Some(first)) = nodes.next() else {
        return false;
    };
    nodes.all(|node| node == Some(first))
}

/// Go-style duration text, e.g. `1h2m5s`.
pub fn format_uptime(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m{}s", m, s),
        _ => format!("{}h{}m{}s", h, m, s),
    }
}

fn owner_placement(address: &str, placement: &PlacementIndex) -> OwnerPlacement {
    let pod = placement.lookup(address);
    OwnerPlacement {
        address: address.to_string(),
        pod: pod.map(|p| p.name.clone()).unwrap_or_default(),
        host: pod.map(|p| p.node.clone()).unwrap_or_default(),
        info: pod.map(|p| p.info.clone()).unwrap_or_default(),
    }
}

/// Picks the reporter with the smallest `(address, name)` among successes
/// that returned slot data.
fn choose_reporter(results: &[QueryResult]) -> Option<(&Candidate, &NodeSnapshot)> {
    results
        .iter()
        .filter_map(|r| r.snapshot().map(|s| (&r.candidate, s)))
        .filter(|(_, s)| !s.slots.is_empty())
        .min_by(|(a, _), (b, _)| (&a.address, &a.name).cmp(&(&b.address, &b.name)))
}

fn summarize(
    result: &QueryResult,
    placement: &PlacementIndex,
    ranges: &[AnnotatedRange],
    remote_port: u16,
) -> NodeSummary {
    let candidate = &result.candidate;
    let pod = placement.lookup(&candidate.address);
    let mut summary = NodeSummary {
        host: pod.map(|p| p.node.clone()).unwrap_or_default(),
        name: candidate.name.clone(),
        ip: candidate.address.clone(),
        ..Default::default()
    };

    match result.snapshot() {
        Some(snapshot) => {
            let stats = &snapshot.stats;
            summary.role = snapshot.roster.self_role();
            summary.keys = stats.key_count();
            summary.state = stats.get("cluster_state").unwrap_or_default().to_string();
            summary.uptime = stats
                .get("uptime_in_seconds")
                .and_then(|v| v.parse().ok())
                .map(format_uptime)
                .unwrap_or_default();
            if !snapshot.slots.is_empty() {
                let (slots, count) = slot_totals(ranges, &candidate.endpoint(remote_port));
                summary.slots = slots.to_string();
                summary.ranges = count.to_string();
            }
        }
        None => summary.remarks.push(UNAVAILABLE_REMARK.to_string()),
    }
    summary
}

/// Builds the topology from every candidate's result.
///
/// Never fails: no results, or no successes, yield an empty range list with
/// the failures listed.
pub fn reconcile(results: Vec<QueryResult>, placement: &PlacementIndex, remote_port: u16) -> Topology {
    let mut topology = Topology {
        candidate_count: results.len(),
        ..Default::default()
    };

    if let Some((reporter, canonical)) = choose_reporter(&results) {
        debug!(reporter = %reporter.name, "Using slot view of {}", reporter.address);
        topology.reporter = Some(reporter.name.clone());
        topology.ranges = canonical
            .slots
            .iter()
            .map(|range| AnnotatedRange {
                owners: range
                    .owners
                    .iter()
                    .map(|owner| owner_placement(&owner.address, placement))
                    .collect(),
                remarks: range_remarks(range, placement),
                range: range.clone(),
            })
            .collect();

        let mut disagreeing: Vec<String> = results
            .iter()
            .filter_map(|r| r.snapshot().map(|s| (&r.candidate, s)))
            .filter(|(c, s)| *c != reporter && !s.slots.is_empty() && s.slots != canonical.slots)
            .map(|(c, _)| c.name.clone())
            .collect();
        disagreeing.sort();
        if !disagreeing.is_empty() {
            warn!(
                reporter = %reporter.name,
                "Slot views disagree with the reporter: {}",
                disagreeing.join(", ")
            );
        }
        topology.disagreeing = disagreeing;
    }

    let mut failures: Vec<Failure> = results
        .iter()
        .filter_map(|r| {
            r.error().map(|e| Failure {
                candidate: r.candidate.name.clone(),
                error: e.to_string(),
            })
        })
        .collect();
    failures.sort_by(|a, b| a.candidate.cmp(&b.candidate));
    topology.failures = failures;

    let mut nodes: Vec<NodeSummary> = results
        .iter()
        .map(|r| summarize(r, placement, &topology.ranges, remote_port))
        .collect();
    nodes.sort_by(|a, b| (&a.host, &a.ip).cmp(&(&b.host, &b.ip)));
    topology.nodes = nodes;

    topology
}
