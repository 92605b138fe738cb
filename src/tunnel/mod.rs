//! Tunnel Module
//!
//! Ephemeral local-to-remote relays used to reach cluster members:
//! - Local port allocation
//! - Relay task lifecycle (ready, stop, join)
//! - Diagnostic output routing

mod tcp;

pub use tcp::TcpForwarder;

use futures::future::BoxFuture;
use std::fmt;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use crate::config::TunnelConfig;
use crate::error::TunnelError;
use crate::types::Candidate;

/// Where incidental relay output goes.
///
/// Only diagnostics travel here; establishment failures always come back as
/// errors from [`Tunnel::open`].
#[derive(Debug, Clone, Default)]
pub enum TunnelLog {
    /// Drop diagnostics
    #[default]
    Quiet,
    /// Emit diagnostics as debug events
    Trace,
    /// Send diagnostic lines to an explicit sink
    Sink(mpsc::UnboundedSender<String>),
}

impl TunnelLog {
    pub fn line(&self, candidate: &str, message: impl fmt::Display) {
        match self {
            TunnelLog::Quiet => {}
            TunnelLog::Trace => debug!(target: "tunnel", candidate, "{}", message),
            TunnelLog::Sink(tx) => {
                let _ = tx.send(format!("{}: {}", candidate, message));
            }
        }
    }
}

/// Everything a relay needs to serve one candidate.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub candidate: Candidate,
    pub remote_port: u16,
    pub local_port: u16,
    pub log: TunnelLog,
}

impl ForwardRequest {
    /// `host:port` the relay connects to.
    pub fn target(&self) -> String {
        self.candidate.endpoint(self.remote_port)
    }
}

/// A relay transport.
///
/// The returned future runs the relay until `stop` resolves (a send or a
/// dropped sender both count). It must send on `ready` exactly once after the
/// local port accepts connections, or return an error without sending.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(
        &self,
        request: ForwardRequest,
        ready: oneshot::Sender<()>,
        stop: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<(), TunnelError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelSettings {
    pub ready_timeout: Duration,
    pub attempts: u32,
    pub stop_grace: Duration,
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self::from(&TunnelConfig::default())
    }
}

impl From<&TunnelConfig> for TunnelSettings {
    fn from(config: &TunnelConfig) -> Self {
        Self {
            ready_timeout: config.ready_timeout(),
            attempts: config.attempts.max(1),
            stop_grace: config.stop_grace(),
        }
    }
}

/// Binds port 0 on loopback, reads the assigned port and releases it.
///
/// Another process may take the port before the relay binds it; relays
/// report that as [`TunnelError::PortConflict`].
pub fn allocate_local_port() -> Result<u16, TunnelError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

type RelayTask = JoinHandle<Result<(), TunnelError>>;

/// Waits up to `grace` for the relay task, then aborts it.
async fn join_relay(mut task: RelayTask, grace: Duration) -> Option<Result<(), TunnelError>> {
    match timeout(grace, &mut task).await {
        Ok(Ok(result)) => Some(result),
        Ok(Err(e)) => Some(Err(TunnelError::Io(format!("relay task failed: {}", e)))),
        Err(_) => {
            warn!("Relay ignored stop signal, aborting");
            task.abort();
            let _ = task.await;
            None
        }
    }
}

/// A running relay from `127.0.0.1:local_port` to one candidate.
pub struct Tunnel {
    candidate: String,
    local_port: u16,
    stop: Option<oneshot::Sender<()>>,
    task: Option<RelayTask>,
    stop_grace: Duration,
}

impl Tunnel {
    /// Starts a relay and waits for it to become ready.
    ///
    /// Port conflicts are retried up to `settings.attempts` times. On timeout
    /// the relay is stopped and joined before the error is returned.
    pub async fn open(
        forwarder: Arc<dyn Forwarder>,
        candidate: &Candidate,
        remote_port: u16,
        settings: &TunnelSettings,
        log: &TunnelLog,
    ) -> Result<Self, TunnelError> {
        let mut attempt = 1;
        loop {
            match Self::open_once(forwarder.clone(), candidate, remote_port, settings, log).await {
                Err(e) if e.is_retryable() && attempt < settings.attempts => {
                    debug!(candidate = %candidate.name, attempt, "Retrying tunnel: {}", e);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn open_once(
        forwarder: Arc<dyn Forwarder>,
        candidate: &Candidate,
        remote_port: u16,
        settings: &TunnelSettings,
        log: &TunnelLog,
    ) -> Result<Self, TunnelError> {
        let local_port = allocate_local_port()?;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let request = ForwardRequest {
            candidate: candidate.clone(),
            remote_port,
            local_port,
            log: log.clone(),
        };
        let task = tokio::spawn(forwarder.forward(request, ready_tx, stop_rx));

        match timeout(settings.ready_timeout, ready_rx).await {
            Ok(Ok(())) => {
                debug!(candidate = %candidate.name, local_port, "Tunnel ready");
                Ok(Self {
                    candidate: candidate.name.clone(),
                    local_port,
                    stop: Some(stop_tx),
                    task: Some(task),
                    stop_grace: settings.stop_grace,
                })
            }
            Ok(Err(_)) => {
                // The relay gave up before signalling readiness.
                drop(stop_tx);
                match join_relay(task, settings.stop_grace).await {
                    Some(Err(e)) => Err(e),
                    _ => Err(TunnelError::Closed),
                }
            }
            Err(_) => {
                let _ = stop_tx.send(());
                join_relay(task, settings.stop_grace).await;
                Err(TunnelError::Timeout {
                    target: candidate.name.clone(),
                    timeout: settings.ready_timeout,
                })
            }
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn is_open(&self) -> bool {
        self.task.is_some()
    }

    /// Stops the relay and waits for its task to exit. Safe to call twice.
    pub async fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Some(Err(e)) = join_relay(task, self.stop_grace).await {
                debug!(candidate = %self.candidate, "Relay exited with error: {}", e);
            }
        }
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
