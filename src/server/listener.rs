use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::http::connection::{Connection, ConnectionContext};
use crate::server::watcher::{ConnectionGuard, ConnectionWatcher};

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A socket handed from the accept loop to the dispatch loop.
pub(crate) struct Accepted {
    stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
}

/// Accepts sockets until shutdown and queues them for dispatch.
///
/// Owns the listener; it is closed when this loop returns.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    queue: mpsc::Sender<Accepted>,
    watcher: ConnectionWatcher,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    let guard = watcher.track();
                    debug!(%peer, live = guard.live_connections(), "Accepted connection");

                    let accepted = Accepted { stream, peer, guard };
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        sent = queue.send(accepted) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Unable to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    debug!("Accept loop stopped");
}

/// Starts one connection task per queued socket until shutdown.
///
/// Sockets still queued when shutdown fires are dropped unserved.
pub(crate) async fn dispatch_loop(
    mut queue: mpsc::Receiver<Accepted>,
    ctx: ConnectionContext,
    connections: TaskTracker,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = queue.recv() => match next {
                Some(Accepted { stream, peer, guard }) => {
                    let conn = Connection::new(stream, peer, guard, ctx.clone());
                    connections.spawn(async move {
                        if let Err(e) = conn.run().await {
                            warn!(%peer, error = %e, "Connection error");
                        }
                    });
                }
                None => break,
            },
        }
    }

    info!(in_flight = connections.len(), "Dispatch loop stopped");
}
