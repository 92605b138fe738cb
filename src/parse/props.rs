//! `key:value` report parsing for the info reports.

use crate::types::{StatsInfo, KEY_COUNT};

/// Parses `key:value` lines separated by `\r\n` or `\n`.
///
/// Section headers, blank lines and lines with zero or several `:` are
/// skipped. A repeated key keeps its last value.
pub fn parse_properties(report: &str) -> StatsInfo {
    report
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let mut parts = line.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => Some((key.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Merges the cluster and process reports and adds the synthesized key count.
pub fn build_stats(cluster_info: &str, info: &str, key_count: i64) -> StatsInfo {
    let mut stats = parse_properties(cluster_info);
    stats.extend(parse_properties(info));
    stats.insert(KEY_COUNT, key_count.to_string());
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_cluster_info() {
        let report = "cluster_state:ok\r\ncluster_slots_assigned:16384\r\ncluster_known_nodes:6\r\n";
        let stats = parse_properties(report);
        assert_eq!(stats.len(), 3);
        assert_eq!(stats.get("cluster_state"), Some("ok"));
        assert_eq!(stats.get("cluster_known_nodes"), Some("6"));
    }

    #[test]
    fn skips_headers_and_multi_separator_lines() {
        let report = "# Server\nredis_version:7.2.4\nexecutable:/usr/local/bin/redis-server\nweird:a:b\n\nuptime_in_seconds:3725\n";
        let stats = parse_properties(report);
        assert_eq!(stats.get("redis_version"), Some("7.2.4"));
        assert_eq!(stats.get("uptime_in_seconds"), Some("3725"));
        assert_eq!(stats.get("executable"), Some("/usr/local/bin/redis-server"));
        assert_eq!(stats.get("weird"), None);
        assert_eq!(stats.get("# Server"), None);
    }

    #[test]
    fn last_duplicate_wins() {
        let stats = parse_properties("role:master\nrole:slave\n");
        assert_eq!(stats.get("role"), Some("slave"));
    }

    #[test]
    fn key_count_does_not_collide() {
        let stats = build_stats("cluster_state:ok\r\n", "db0:keys=12,expires=0,avg_ttl=0\r\nkeys:999\r\n", 12);
        assert_eq!(stats.key_count(), "12");
        assert_eq!(stats.get("keys"), Some("999"));
        assert_eq!(stats.get("cluster_state"), Some("ok"));
    }

    proptest! {
        #[test]
        fn reserialized_report_round_trips(
            entries in proptest::collection::btree_map("[a-z_]{1,12}", "[a-z0-9_.,=]{0,12}", 0..20)
        ) {
            let stats: StatsInfo = entries.into_iter().collect();
            prop_assert_eq!(parse_properties(&stats.to_report()), stats);
        }
    }
}
