//! Protocol Client
//!
//! Read-only queries against one cluster member over an established tunnel.
//! Every round trip is bounded by the configured query timeout.

use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use crate::error::QueryError;
use crate::resp::{RespError, RespReader, RespValue};

/// Raw replies of the full query sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReplies {
    /// `CLUSTER SLOTS`
    pub slots: RespValue,
    /// `CLUSTER NODES`
    pub nodes: String,
    /// `CLUSTER INFO`
    pub cluster_info: String,
    /// `INFO`
    pub info: String,
    /// `DBSIZE`
    pub key_count: i64,
}

pub struct ProtocolClient {
    conn: RespReader<TcpStream>,
    query_timeout: Duration,
}

impl ProtocolClient {
    /// Connects and runs the PING liveness check.
    ///
    /// Both a failed connect and a failed `PING` count as unreachable, as
    /// opposed to later command failures.
    pub async fn connect(port: u16, query_timeout: Duration) -> Result<Self, QueryError> {
        let stream = match timeout(query_timeout, TcpStream::connect(("127.0.0.1", port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(QueryError::Unreachable(e.to_string())),
            Err(_) => {
                return Err(QueryError::Unreachable(format!(
                    "connect timed out after {:?}",
                    query_timeout
                )))
            }
        };

        let mut client = Self {
            conn: RespReader::new(stream),
            query_timeout,
        };
        match client.command(&["PING"]).await {
            Ok(reply) if reply.as_text().as_deref() == Some("PONG") => Ok(client),
            Ok(reply) => Err(QueryError::Unreachable(format!("unexpected PING reply {:?}", reply))),
            Err(e) => Err(QueryError::Unreachable(e.to_string())),
        }
    }

    /// Sends one command and reads its reply. Error replies become
    /// [`QueryError::Command`].
    pub async fn command(&mut self, args: &[&str]) -> Result<RespValue, QueryError> {
        let name = args.join(" ");
        let request = RespValue::command(args).to_bytes();
        let limit = self.query_timeout;
        let conn = &mut self.conn;

        let round_trip = async move {
            conn.get_mut().write_all(&request).await?;
            conn.read_value().await
        };
        let reply = match timeout(limit, round_trip).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(RespError::Io(e))) => return Err(QueryError::Protocol(e.to_string())),
            Ok(Err(e)) => return Err(QueryError::Protocol(format!("{}: {}", name, e))),
            Err(_) => {
                return Err(QueryError::Timeout {
                    command: name,
                    timeout: limit,
                })
            }
        };

        match reply {
            RespValue::Error(message) => Err(QueryError::Command {
                command: name,
                message: String::from_utf8_lossy(&message).into_owned(),
            }),
            reply => {
                debug!(command = %name, "Reply received");
                Ok(reply)
            }
        }
    }

    async fn text(&mut self, args: &[&str]) -> Result<String, QueryError> {
        let reply = self.command(args).await?;
        reply
            .as_text()
            .ok_or_else(|| QueryError::malformed(&args.join(" "), "expected a string reply"))
    }

    pub async fn cluster_slots(&mut self) -> Result<RespValue, QueryError> {
        self.command(&["CLUSTER", "SLOTS"]).await
    }

    pub async fn cluster_nodes(&mut self) -> Result<String, QueryError> {
        self.text(&["CLUSTER", "NODES"]).await
    }

    pub async fn cluster_info(&mut self) -> Result<String, QueryError> {
        self.text(&["CLUSTER", "INFO"]).await
    }

    pub async fn info(&mut self) -> Result<String, QueryError> {
        self.text(&["INFO"]).await
    }

    pub async fn dbsize(&mut self) -> Result<i64, QueryError> {
        let reply = self.command(&["DBSIZE"]).await?;
        reply
            .as_integer()
            .ok_or_else(|| QueryError::malformed("DBSIZE", "expected an integer reply"))
    }

    /// Runs the full sequence; the first failure aborts the rest.
    pub async fn query_all(&mut self) -> Result<RawReplies, QueryError> {
        Ok(RawReplies {
            slots: self.cluster_slots().await?,
            nodes: self.cluster_nodes().await?,
            cluster_info: self.cluster_info().await?,
            info: self.info().await?,
            key_count: self.dbsize().await?,
        })
    }
}
