use futures::future::BoxFuture;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::copy_bidirectional;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::timeout;
use super::{ForwardRequest, Forwarder};
use crate::error::TunnelError;

/// Relays loopback connections straight to the candidate's `host:port`.
///
/// Establishment resolves the target, makes one test connection and binds
/// the local port; only then is readiness signalled.
#[derive(Debug, Clone)]
pub struct TcpForwarder {
    connect_timeout: Duration,
}

impl TcpForwarder {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpForwarder {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl Forwarder for TcpForwarder {
    fn forward(
        &self,
        request: ForwardRequest,
        ready: oneshot::Sender<()>,
        stop: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<(), TunnelError>> {
        Box::pin(relay(request, self.connect_timeout, ready, stop))
    }
}

async fn connect(target: &str, connect_timeout: Duration) -> Result<TcpStream, TunnelError> {
    let remote = lookup_host(target)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| TunnelError::Resolve(target.to_string()))?;

    match timeout(connect_timeout, TcpStream::connect(remote)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
            Err(TunnelError::Rejected(target.to_string()))
        }
        Ok(Err(e)) => Err(TunnelError::Transport {
            target: target.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(TunnelError::Transport {
            target: target.to_string(),
            reason: format!("connect timed out after {:?}", connect_timeout),
        }),
    }
}

async fn relay(
    request: ForwardRequest,
    connect_timeout: Duration,
    ready: oneshot::Sender<()>,
    mut stop: oneshot::Receiver<()>,
) -> Result<(), TunnelError> {
    let target = request.target();
    let name = request.candidate.name.clone();

    drop(connect(&target, connect_timeout).await?);

    let listener = match TcpListener::bind(("127.0.0.1", request.local_port)).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            return Err(TunnelError::PortConflict(request.local_port));
        }
        Err(e) => return Err(e.into()),
    };

    request.log.line(
        &name,
        format_args!("Forwarding from 127.0.0.1:{} -> {}", request.local_port, target),
    );
    let _ = ready.send(());

    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut stop => break,
            accepted = listener.accept() => {
                let (mut inbound, peer) = accepted?;
                request.log.line(&name, format_args!("Handling connection from {}", peer));
                let log = request.log.clone();
                let target = target.clone();
                let name = name.clone();
                connections.spawn(async move {
                    let result = match connect(&target, connect_timeout).await {
                        Ok(mut outbound) => copy_bidirectional(&mut inbound, &mut outbound)
                            .await
                            .map(|_| ())
                            .map_err(TunnelError::from),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        log.line(&name, format_args!("Connection from {} ended: {}", peer, e));
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    connections.shutdown().await;
    request.log.line(&name, "Relay stopped");
    Ok(())
}
