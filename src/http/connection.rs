use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use crate::handler::error_page::write_error_page;
use crate::handler::{ErrorHandler, Handler};
use crate::http::keep_alive::{KeepAlive, KeepAlivePolicy};
use crate::http::parser::{ParseError, read_request};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::StatusCode;
use crate::routing::Router;
use crate::server::watcher::ConnectionGuard;

/// Shared pieces every connection needs to answer requests.
#[derive(Clone)]
pub struct ConnectionContext {
    pub router: Arc<dyn Router>,
    pub keep_alive: Arc<dyn KeepAlivePolicy>,
}

/// One accepted socket and its request loop.
///
/// Dropping the connection closes the socket and releases its slot in the
/// live-connection count, so every exit path out of [`Connection::run`]
/// cleans up exactly once.
pub struct Connection {
    stream: BufReader<TcpStream>,
    peer: SocketAddr,
    ctx: ConnectionContext,
    guard: ConnectionGuard,
    state: ConnectionState,
    served: u32,
}

pub enum ConnectionState {
    Reading,
    Dispatching(Request),
    Writing(Response, Option<KeepAlive>),
    Idle(Duration),
    Closed,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        guard: ConnectionGuard,
        ctx: ConnectionContext,
    ) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer,
            ctx,
            guard,
            state: ConnectionState::Reading,
            served: 0,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
            self.state = match state {
                ConnectionState::Reading => self.read().await,
                ConnectionState::Dispatching(req) => self.dispatch(req).await,
                ConnectionState::Writing(res, keep_alive) => self.write(res, keep_alive).await?,
                ConnectionState::Idle(timeout) => self.idle(timeout).await,
                ConnectionState::Closed => break,
            };
        }

        tracing::debug!(peer = %self.peer, served = self.served, "Connection closed");
        Ok(())
    }

    async fn read(&mut self) -> ConnectionState {
        match read_request(&mut self.stream).await {
            Ok(req) => ConnectionState::Dispatching(req),
            Err(ParseError::ConnectionClosed) => {
                tracing::trace!(peer = %self.peer, "Peer closed connection");
                ConnectionState::Closed
            }
            Err(ParseError::Io(e)) => {
                tracing::debug!(peer = %self.peer, error = %e, "Read failed");
                ConnectionState::Closed
            }
            Err(e @ ParseError::Malformed(_)) => {
                tracing::warn!(peer = %self.peer, error = %e, "Failed to parse request");
                let mut res = Response::new();
                res.set_status(StatusCode::InternalServerError);
                write_error_page(&mut res);
                // The stream position is unknown after a bad request.
                ConnectionState::Writing(res, None)
            }
        }
    }

    async fn dispatch(&mut self, req: Request) -> ConnectionState {
        let mut res = Response::for_request(&req);
        self.served += 1;

        let keep_alive = if req.is_http11() {
            let keep_alive = self
                .ctx
                .keep_alive
                .keep_alive(self.guard.live_connections());
            self.enable_tcp_keepalive(keep_alive.timeout);
            res.headers.add("Keep-Alive", keep_alive.header_value());
            Some(keep_alive)
        } else {
            None
        };

        match self.ctx.router.get_route(req.path()) {
            Ok(handler) => {
                handler.handle(&req, &mut res).await;
                if !res.is_started() {
                    tracing::warn!(path = req.path(), "Handler returned without a response");
                    res.set_status(StatusCode::InternalServerError);
                    ErrorHandler.handle(&req, &mut res).await;
                }
            }
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "No route");
                res.set_status(StatusCode::NotFound);
                ErrorHandler.handle(&req, &mut res).await;
            }
        }

        ConnectionState::Writing(res, keep_alive)
    }

    async fn write(
        &mut self,
        mut res: Response,
        keep_alive: Option<KeepAlive>,
    ) -> anyhow::Result<ConnectionState> {
        res.flush(self.stream.get_mut()).await?;

        let next = match keep_alive {
            Some(ka) if self.served < ka.max => ConnectionState::Idle(ka.timeout),
            Some(ka) => {
                tracing::debug!(peer = %self.peer, max = ka.max, "Request limit reached");
                ConnectionState::Closed
            }
            None => ConnectionState::Closed,
        };
        Ok(next)
    }

    /// Waits for the next request to start arriving, for at most `timeout`.
    async fn idle(&mut self, timeout: Duration) -> ConnectionState {
        let next = tokio::time::timeout(timeout, async {
            self.stream.fill_buf().await.map(|buf| buf.is_empty())
        })
        .await;

        match next {
            Ok(Ok(false)) => ConnectionState::Reading,
            Ok(Ok(true)) => ConnectionState::Closed,
            Ok(Err(e)) => {
                tracing::debug!(peer = %self.peer, error = %e, "Read failed while idle");
                ConnectionState::Closed
            }
            Err(_) => {
                tracing::debug!(peer = %self.peer, ?timeout, "Idle timeout");
                ConnectionState::Closed
            }
        }
    }

    fn enable_tcp_keepalive(&self, idle: Duration) {
        let socket = socket2::SockRef::from(self.stream.get_ref());
        let params = socket2::TcpKeepalive::new().with_time(idle);
        if let Err(e) = socket.set_tcp_keepalive(&params) {
            tracing::debug!(peer = %self.peer, error = %e, "Failed to set TCP keep-alive");
        }
    }
}
