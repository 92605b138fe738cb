#![allow(dead_code)]

use futures::future::BoxFuture;
use rediscluster_inspect::resp::{RespReader, RespValue};
use rediscluster_inspect::tunnel::ForwardRequest;
use rediscluster_inspect::{Forwarder, TcpForwarder, TunnelError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Canned replies of one cluster member.
#[derive(Debug, Clone, Default)]
pub struct FakeMember {
    pub slots: Vec<(u16, u16, Vec<&'static str>)>,
    pub nodes: String,
    pub cluster_info: String,
    pub info: String,
    pub keys: i64,
    /// Command answered with an error reply
    pub failing: Option<&'static str>,
    /// Accept connections but never answer
    pub silent: bool,
    /// Command left unanswered; earlier commands are served normally
    pub hang_on: Option<&'static str>,
}

impl FakeMember {
    pub fn healthy(me: &str, slots: Vec<(u16, u16, Vec<&'static str>)>) -> Self {
        let mut hosts: Vec<&str> = slots.iter().flat_map(|(_, _, owners)| owners.iter().copied()).collect();
        hosts.push(me);
        hosts.sort();
        hosts.dedup();
        let nodes = hosts
            .into_iter()
            .map(|host| {
                let flags = if host == me { "myself,master" } else { "master" };
                format!("id-{host} {host}:6379@16379 {flags} - 0 0 1 connected\n")
            })
            .collect();
        Self {
            slots,
            nodes,
            cluster_info: "cluster_state:ok\r\ncluster_slots_assigned:16384\r\n".into(),
            info: "# Server\r\nredis_version:7.2.4\r\nuptime_in_seconds:3725\r\n".into(),
            keys: 42,
            ..Default::default()
        }
    }

    fn slots_reply(&self) -> RespValue {
        RespValue::Array(
            self.slots
                .iter()
                .map(|(start, end, owners)| {
                    let mut fields = vec![RespValue::Integer(*start as i64), RespValue::Integer(*end as i64)];
                    fields.extend(owners.iter().map(|host| {
                        RespValue::Array(vec![RespValue::bulk(*host), RespValue::Integer(6379)])
                    }));
                    RespValue::Array(fields)
                })
                .collect(),
        )
    }

    fn reply(&self, command: &str) -> RespValue {
        if self.failing == Some(command) {
            return RespValue::error("ERR This instance has cluster support disabled");
        }
        match command {
            "PING" => RespValue::simple("PONG"),
            "CLUSTER SLOTS" => self.slots_reply(),
            "CLUSTER NODES" => RespValue::bulk(self.nodes.clone()),
            "CLUSTER INFO" => RespValue::bulk(self.cluster_info.clone()),
            "INFO" => RespValue::bulk(self.info.clone()),
            "DBSIZE" => RespValue::Integer(self.keys),
            other => RespValue::error(&format!("ERR unknown command '{}'", other)),
        }
    }
}

/// Serves `member` on a loopback port and returns the port.
pub async fn spawn_member(member: FakeMember) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let member = member.clone();
            tokio::spawn(async move {
                let mut conn = RespReader::new(stream);
                while let Ok(request) = conn.read_value().await {
                    if member.silent {
                        continue;
                    }
                    let command = request
                        .as_array()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(RespValue::as_text)
                        .collect::<Vec<_>>()
                        .join(" ")
                        .to_uppercase();
                    if member.hang_on == Some(command.as_str()) {
                        continue;
                    }
                    let reply = member.reply(&command).to_bytes();
                    if conn.get_mut().write_all(&reply).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    port
}

/// Sends candidates to fake members by address; stalled addresses never
/// become ready.
#[derive(Default)]
pub struct RoutedForwarder {
    routes: HashMap<String, u16>,
    stalled: HashSet<String>,
    inner: TcpForwarder,
}

impl RoutedForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, address: &str, port: u16) -> Self {
        self.routes.insert(address.to_string(), port);
        self
    }

    pub fn stall(mut self, address: &str) -> Self {
        self.stalled.insert(address.to_string());
        self
    }
}

impl Forwarder for RoutedForwarder {
    fn forward(
        &self,
        mut request: ForwardRequest,
        ready: oneshot::Sender<()>,
        stop: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<(), TunnelError>> {
        if self.stalled.contains(&request.candidate.address) {
            return Box::pin(async move {
                let _ready = ready;
                let _ = stop.await;
                Ok(())
            });
        }
        match self.routes.get(&request.candidate.address) {
            Some(port) => {
                request.candidate.address = "127.0.0.1".into();
                request.remote_port = *port;
                self.inner.forward(request, ready, stop)
            }
            None => {
                let target = request.target();
                Box::pin(async move { Err(TunnelError::Resolve(target)) })
            }
        }
    }
}

/// Counts relay futures that ran to completion.
pub struct CountingForwarder {
    inner: RoutedForwarder,
    exits: Arc<AtomicUsize>,
}

impl CountingForwarder {
    pub fn new(inner: RoutedForwarder) -> (Self, Arc<AtomicUsize>) {
        let exits = Arc::new(AtomicUsize::new(0));
        (Self { inner, exits: exits.clone() }, exits)
    }
}

impl Forwarder for CountingForwarder {
    fn forward(
        &self,
        request: ForwardRequest,
        ready: oneshot::Sender<()>,
        stop: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<(), TunnelError>> {
        let relay = self.inner.forward(request, ready, stop);
        let exits = self.exits.clone();
        Box::pin(async move {
            let result = relay.await;
            exits.fetch_add(1, Ordering::SeqCst);
            result
        })
    }
}

pub fn short_timeouts() -> rediscluster_inspect::CollectorSettings {
    rediscluster_inspect::CollectorSettings {
        remote_port: 6379,
        tunnel: rediscluster_inspect::TunnelSettings {
            ready_timeout: Duration::from_millis(300),
            attempts: 3,
            stop_grace: Duration::from_millis(200),
        },
        query_timeout: Duration::from_secs(2),
    }
}
