//! Server lifecycle
//!
//! [`SyncServer::start`] binds the listener and returns a [`ServerHandle`];
//! the accept loop runs on its own task and every connection on a task of
//! its own. [`ServerHandle::stop`] asks every connection to finish its
//! in-flight request, waits out the grace period, then the remainder of the
//! hard deadline, and finally aborts whatever is left.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use osync_core::config::ServerConfig;
use osync_core::domain::LibraryMode;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::routes::{self, ServerState};
use crate::ServerError;

/// HTTP server exposing one library read-only.
#[derive(Debug, Clone)]
pub struct SyncServer {
    state: Arc<ServerState>,
    addr: SocketAddr,
    grace: Duration,
    deadline: Duration,
}

impl SyncServer {
    /// Creates a new `SyncServer` from the `server` config section.
    ///
    /// # Arguments
    /// * `root` - Library root to serve
    /// * `mode` - Layout of the library
    /// * `config` - Bind address, port and shutdown timings
    pub fn new(root: PathBuf, mode: LibraryMode, config: &ServerConfig) -> Self {
        Self {
            state: Arc::new(ServerState::new(root, mode)),
            addr: SocketAddr::new(config.bind, config.port),
            grace: Duration::from_millis(config.shutdown_grace_ms),
            deadline: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }

    /// Override the listening address (port `0` picks a free port).
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn mode(&self) -> LibraryMode {
        self.state.mode()
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Each call creates an independent server; the caller keeps the
    /// returned handle to stop it.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let root = self.state.root().to_path_buf();
        if !tokio::fs::metadata(&root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(ServerError::InvalidRoot(root));
        }

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: self.addr,
            source,
        })?;

        info!(
            addr = %local_addr,
            mode = %self.state.mode(),
            root = %root.display(),
            "Sync server listening"
        );

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(listener, shutdown.clone()));

        Ok(ServerHandle {
            local_addr,
            shutdown,
            task: Some(task),
        })
    }

    /// Accept loop. Returns once `shutdown` fires and connections are drained.
    async fn run(self, listener: TcpListener, shutdown: CancellationToken) {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!(%peer, "Accepted connection");
                            connections.spawn(serve_connection(
                                stream,
                                Arc::clone(&self.state),
                                shutdown.clone(),
                            ));
                        }
                        Err(e) => warn!(error = %e, "Failed to accept connection"),
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown.cancelled() => {
                    info!("Sync server shutting down");
                    break;
                }
            }
        }

        drop(listener);
        drain(&mut connections, self.grace, self.deadline).await;
    }
}

/// Serve one connection until it closes or a shutdown is requested.
async fn serve_connection(stream: TcpStream, state: Arc<ServerState>, shutdown: CancellationToken) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { routes::handle(req, &state).await }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(error = %e, "Connection closed with error");
            }
        }
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.as_mut().await {
                debug!(error = %e, "Connection error during shutdown");
            }
        }
    }
}

/// Wait for connections: first the grace period, then up to the hard deadline.
async fn drain(connections: &mut JoinSet<()>, grace: Duration, deadline: Duration) {
    if connections.is_empty() {
        return;
    }
    if tokio::time::timeout(grace, join_all(connections)).await.is_ok() {
        return;
    }

    warn!(
        open = connections.len(),
        "Connections still open after grace period"
    );
    let remaining = deadline.saturating_sub(grace);
    if tokio::time::timeout(remaining, join_all(connections)).await.is_err() {
        warn!(open = connections.len(), "Forcing remaining connections closed");
        connections.abort_all();
        join_all(connections).await;
    }
}

async fn join_all(connections: &mut JoinSet<()>) {
    while connections.join_next().await.is_some() {}
}

// ============================================================================
// ServerHandle
// ============================================================================

/// Handle to a running server, held by the shell.
///
/// Dropping the handle requests shutdown without waiting for it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether `stop` has not completed yet.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the server and wait for it to wind down. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            debug!("Sync server already stopped");
            return;
        };

        self.shutdown.cancel();
        if let Err(e) = task.await {
            error!(error = %e, "Sync server task ended abnormally");
        }
        info!(addr = %self.local_addr, "Sync server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
