//! Node roster report parsing.
//!
//! Line layout: `id ip:port@cport[,hostname] flags primary-id ping pong epoch link-state [slot...]`

use tracing::warn;
use crate::types::{NodeRef, NodeStatus, ParseAnomaly, Roster, SELF_FLAG};

/// Lines with fewer tokens are truncated or malformed and skipped.
pub const MIN_ROSTER_TOKENS: usize = 7;

/// Splits `ip:port@cport[,hostname]` into host and port.
fn parse_address(token: &str) -> Option<(String, u16)> {
    let addr = token.split('@').next().unwrap_or(token);
    let (host, port) = addr.split_once(':')?;
    let port = port.parse().ok()?;
    Some((host.to_string(), port))
}

fn parse_counter(token: Option<&&str>) -> u64 {
    token.and_then(|t| t.parse().ok()).unwrap_or(0)
}

/// Builds the roster keyed by host.
///
/// Short lines and lines without a usable address are skipped and recorded
/// as anomalies. Only the first self-flagged entry keeps the flag.
pub fn parse_roster(report: &str) -> Roster {
    let mut roster = Roster::default();
    let mut self_host: Option<String> = None;

    for line in report.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split(' ').filter(|t| !t.is_empty()).collect();
        if tokens.len() < MIN_ROSTER_TOKENS {
            roster.anomalies.push(ParseAnomaly::ShortLine {
                tokens: tokens.len(),
            });
            continue;
        }

        let Some((host, port)) = parse_address(tokens[1]) else {
            roster.anomalies.push(ParseAnomaly::BadAddress(tokens[1].to_string()));
            continue;
        };

        let mut flags: Vec<String> = tokens[2].split(',').map(str::to_string).collect();
        if flags.iter().any(|f| f == SELF_FLAG) {
            match &self_host {
                Some(first) if *first != host => {
                    roster.anomalies.push(ParseAnomaly::DuplicateSelf(host.clone()));
                    flags.retain(|f| f != SELF_FLAG);
                }
                _ => self_host = Some(host.clone()),
            }
        }

        let primary_id = Some(tokens[3])
            .filter(|id| *id != "-")
            .map(str::to_string);

        let status = NodeStatus {
            id: tokens[0].to_string(),
            address: NodeRef::new(&host, port),
            flags,
            primary_id,
            ping_sent: parse_counter(tokens.get(4)),
            pong_recv: parse_counter(tokens.get(5)),
            config_epoch: parse_counter(tokens.get(6)),
            link_state: tokens.get(7).map(|s| s.to_string()).unwrap_or_default(),
            slots: tokens.iter().skip(8).map(|s| s.to_string()).collect(),
        };
        roster.nodes.insert(host, status);
    }

    // A later line for the self host may have replaced the flagged one.
    if roster.myself().is_none() {
        roster.anomalies.push(ParseAnomaly::MissingSelf);
    }
    for anomaly in &roster.anomalies {
        match anomaly {
            ParseAnomaly::ShortLine { .. } => {}
            other => warn!("Roster anomaly: {:?}", other),
        }
    }

    roster
}
