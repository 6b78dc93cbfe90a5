//! Listening socket, accept/dispatch loops and graceful shutdown.
//!
//! ```text
//!   accept loop ──(bounded queue)──▶ dispatch loop ──spawn──▶ Connection
//!        ▲                                 ▲                     (one task each)
//!        └────────── shutdown signal ──────┘
//! ```
//!
//! `Server::shutdown` flips the signal, which stops both loops (the accept
//! loop drops the listener on its way out), then waits for in-flight
//! connections up to a caller-supplied deadline.

pub mod listener;
pub mod watcher;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::http::connection::ConnectionContext;
use crate::http::keep_alive::{FixedKeepAlive, KeepAlivePolicy};
use crate::routing::Router;
use crate::server::watcher::ConnectionWatcher;

/// Capacity of the accept → dispatch queue.
const QUEUE_CAPACITY: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("address is not initialised")]
    MissingAddress,
    #[error("router is not initialised")]
    MissingRouter,
    #[error("server already listening on address {0}")]
    AlreadyListening(String),
    #[error("failed to listen on address {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Listening,
    ShuttingDown,
    Stopped,
}

/// How [`Server::shutdown`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every connection finished before the deadline.
    Completed,
    /// The deadline passed first; remaining connections were left running.
    TimedOut,
    /// The server was not listening.
    NotRunning,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
    connections: TaskTracker,
}

pub struct Server {
    addr: String,
    router: Option<Arc<dyn Router>>,
    keep_alive: Arc<dyn KeepAlivePolicy>,
    watcher: ConnectionWatcher,
    state: ServerState,
    running: Option<Running>,
}

impl Server {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            router: None,
            keep_alive: Arc::new(FixedKeepAlive::default()),
            watcher: ConnectionWatcher::new(),
            state: ServerState::Idle,
            running: None,
        }
    }

    pub fn with_router(mut self, router: impl Router) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    pub fn with_keep_alive(mut self, policy: impl KeepAlivePolicy) -> Self {
        self.keep_alive = Arc::new(policy);
        self
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// The bound address while listening. Useful when bound to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Number of accepted sockets not yet closed.
    pub fn connection_count(&self) -> u64 {
        self.watcher.count()
    }

    /// Binds the listener and starts the accept and dispatch loops.
    ///
    /// Returns as soon as the server is listening; the loops keep running
    /// in the background until [`Server::shutdown`].
    pub async fn listen_and_serve(&mut self) -> Result<SocketAddr, ServerError> {
        if self.addr.is_empty() {
            return Err(ServerError::MissingAddress);
        }
        let router = self.router.clone().ok_or(ServerError::MissingRouter)?;
        if self.running.is_some() {
            return Err(ServerError::AlreadyListening(self.addr.clone()));
        }

        let bind_err = |source| ServerError::Bind {
            addr: self.addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&self.addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let connections = TaskTracker::new();
        let ctx = ConnectionContext {
            router,
            keep_alive: Arc::clone(&self.keep_alive),
        };

        let accept = tokio::spawn(listener::accept_loop(
            listener,
            queue_tx,
            self.watcher.clone(),
            shutdown_rx.clone(),
        ));
        let dispatch = tokio::spawn(listener::dispatch_loop(
            queue_rx,
            ctx,
            connections.clone(),
            shutdown_rx,
        ));

        self.running = Some(Running {
            local_addr,
            shutdown: shutdown_tx,
            loops: vec![accept, dispatch],
            connections,
        });
        self.state = ServerState::Listening;

        info!(address = %local_addr, "Serving HTTP");
        Ok(local_addr)
    }

    /// Stops accepting, then waits up to `deadline` for open connections.
    ///
    /// Connections still running when the deadline passes are not
    /// interrupted; they are simply no longer waited for.
    pub async fn shutdown(&mut self, deadline: Duration) -> ShutdownOutcome {
        let Some(running) = self.running.take() else {
            return ShutdownOutcome::NotRunning;
        };
        self.state = ServerState::ShuttingDown;
        info!(address = %running.local_addr, live = self.watcher.count(), "Shutting down");

        // Fails only if both loops already exited on their own.
        let _ = running.shutdown.send(true);

        let Running { loops, connections, .. } = running;
        let drain = async move {
            for handle in loops {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Server loop panicked");
                }
            }
            connections.close();
            connections.wait().await;
        };

        let outcome = match tokio::time::timeout(deadline, drain).await {
            Ok(()) => {
                info!("Server exited successfully");
                ShutdownOutcome::Completed
            }
            Err(_) => {
                warn!(
                    live = self.watcher.count(),
                    ?deadline,
                    "Timed out waiting for connections to finish"
                );
                ShutdownOutcome::TimedOut
            }
        };

        self.state = ServerState::Stopped;
        outcome
    }
}
