use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures while establishing or running a tunnel relay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TunnelError {
    #[error("tunnel to {target} not ready within {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    /// The local port was claimed between allocation and relay bind.
    #[error("local port {0} already in use")]
    PortConflict(u16),

    #[error("failed to resolve {0}")]
    Resolve(String),

    #[error("transport to {target} failed: {reason}")]
    Transport { target: String, reason: String },

    #[error("{0} rejected the connection")]
    Rejected(String),

    #[error("relay exited before signalling readiness")]
    Closed,

    #[error("tunnel IO error: {0}")]
    Io(String),
}

impl TunnelError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TunnelError::PortConflict(_))
    }
}

impl From<io::Error> for TunnelError {
    fn from(e: io::Error) -> Self {
        TunnelError::Io(e.to_string())
    }
}

/// Failures talking to a cluster member over an established tunnel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Connect or PING liveness check failed.
    #[error("member unreachable: {0}")]
    Unreachable(String),

    /// The member answered a command with an error reply.
    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    #[error("{command} got no reply within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("malformed {command} reply: {reason}")]
    Malformed { command: String, reason: String },
}

impl QueryError {
    pub fn malformed(command: &str, reason: impl Into<String>) -> Self {
        QueryError::Malformed {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InspectError {
    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Inventory error: {0}")]
    Inventory(String),

    /// The pipeline task ended without reporting a result.
    #[error("query task aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InspectError>;

impl InspectError {
    pub fn config(msg: impl Into<String>) -> Self {
        InspectError::Config(msg.into())
    }

    pub fn inventory(msg: impl Into<String>) -> Self {
        InspectError::Inventory(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            InspectError::Tunnel(TunnelError::Timeout { .. })
                | InspectError::Query(QueryError::Timeout { .. })
        )
    }
}
