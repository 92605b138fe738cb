//! Collector
//!
//! Fans out one query pipeline per candidate and fans the results back in
//! over a single channel. Each pipeline opens a tunnel, runs the query
//! sequence, parses the replies and closes the tunnel on every exit path.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use crate::client::{ProtocolClient, RawReplies};
use crate::config::InspectConfig;
use crate::error::{InspectError, QueryError};
use crate::parse::{build_stats, from_resp, parse_roster, parse_slot_ranges};
use crate::tunnel::{Forwarder, Tunnel, TunnelLog, TunnelSettings};
use crate::types::{Candidate, Roster, SlotRange, StatsInfo};

/// Everything one member reported.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub stats: StatsInfo,
    pub roster: Roster,
    pub slots: Vec<SlotRange>,
}

impl NodeSnapshot {
    pub fn from_replies(replies: RawReplies) -> Result<Self, QueryError> {
        let slots = parse_slot_ranges(from_resp(&replies.slots)?);
        let roster = parse_roster(&replies.nodes);
        let stats = build_stats(&replies.cluster_info, &replies.info, replies.key_count);
        Ok(Self { stats, roster, slots })
    }
}

/// Outcome for one candidate. A failed pipeline carries no data.
#[derive(Debug)]
pub struct QueryResult {
    pub candidate: Candidate,
    pub outcome: Result<NodeSnapshot, InspectError>,
}

impl QueryResult {
    pub fn snapshot(&self) -> Option<&NodeSnapshot> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&InspectError> {
        self.outcome.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    pub remote_port: u16,
    pub tunnel: TunnelSettings,
    pub query_timeout: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from(&InspectConfig::default())
    }
}

impl From<&InspectConfig> for CollectorSettings {
    fn from(config: &InspectConfig) -> Self {
        Self {
            remote_port: config.remote_port,
            tunnel: TunnelSettings::from(&config.tunnel),
            query_timeout: config.query.timeout(),
        }
    }
}

/// Sends exactly one result for its candidate, even if the task dies first.
struct ResultSlot {
    candidate: Option<Candidate>,
    tx: mpsc::UnboundedSender<QueryResult>,
}

impl ResultSlot {
    fn complete(mut self, outcome: Result<NodeSnapshot, InspectError>) {
        if let Some(candidate) = self.candidate.take() {
            let _ = self.tx.send(QueryResult { candidate, outcome });
        }
    }
}

impl Drop for ResultSlot {
    fn drop(&mut self) {
        if let Some(candidate) = self.candidate.take() {
            let _ = self.tx.send(QueryResult {
                outcome: Err(InspectError::Aborted(candidate.name.clone())),
                candidate,
            });
        }
    }
}

#[derive(Clone)]
pub struct Collector {
    forwarder: Arc<dyn Forwarder>,
    settings: CollectorSettings,
    log: TunnelLog,
}

impl Collector {
    pub fn new(forwarder: Arc<dyn Forwarder>, settings: CollectorSettings) -> Self {
        Self {
            forwarder,
            settings,
            log: TunnelLog::Quiet,
        }
    }

    /// Routes relay diagnostics; errors are unaffected.
    pub fn with_log(mut self, log: TunnelLog) -> Self {
        self.log = log;
        self
    }

    /// Queries every candidate concurrently and returns one result each,
    /// in completion order.
    pub async fn collect(&self, candidates: Vec<Candidate>) -> Vec<QueryResult> {
        let expected = candidates.len();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for candidate in candidates {
            let slot = ResultSlot {
                candidate: Some(candidate.clone()),
                tx: tx.clone(),
            };
            let pipeline = self.clone();
            tokio::spawn(async move {
                let outcome = pipeline.run(&candidate).await;
                slot.complete(outcome);
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(expected);
        while let Some(result) = rx.recv().await {
            match &result.outcome {
                Ok(_) => debug!(candidate = %result.candidate.name, "Query succeeded"),
                Err(e) => warn!(candidate = %result.candidate.name, "Query failed: {}", e),
            }
            results.push(result);
            if results.len() == expected {
                break;
            }
        }

        info!(
            "Collected {} results, {} failed",
            results.len(),
            results.iter().filter(|r| !r.is_ok()).count()
        );
        results
    }

    /// One pipeline: tunnel, queries, parse. The tunnel is closed whether
    /// the queries succeed or not.
    async fn run(&self, candidate: &Candidate) -> Result<NodeSnapshot, InspectError> {
        let mut tunnel = Tunnel::open(
            self.forwarder.clone(),
            candidate,
            self.settings.remote_port,
            &self.settings.tunnel,
            &self.log,
        )
        .await?;

        let outcome = query_member(tunnel.local_port(), self.settings.query_timeout).await;
        tunnel.close().await;
        Ok(outcome?)
    }
}

async fn query_member(port: u16, query_timeout: Duration) -> Result<NodeSnapshot, QueryError> {
    let mut client = ProtocolClient::connect(port, query_timeout).await?;
    let replies = client.query_all().await?;
    NodeSnapshot::from_replies(replies)
}
