//! End-to-end tests over loopback sockets.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use ferrule::handler::{FileServer, Handler, handler_fn};
use ferrule::http::keep_alive::{FixedKeepAlive, KeepAlive};
use ferrule::http::request::Request;
use ferrule::http::response::Response;
use ferrule::http::status::StatusCode;
use ferrule::routing::{ExactRouter, PrefixRouter, Router};
use ferrule::server::{Server, ServerError, ServerState, ShutdownOutcome};

struct Reply {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

async fn read_reply(stream: &mut BufReader<TcpStream>) -> Reply {
    let mut status_line = String::new();
    stream.read_line(&mut status_line).await.unwrap();
    let status = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        stream.read_line(&mut line).await.unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (k, v) = line.split_once(": ").unwrap();
        headers.insert(k.to_string(), v.to_string());
    }

    let len: usize = headers
        .get("Content-Length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);
    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.unwrap();

    Reply { status, headers, body }
}

async fn connect(addr: SocketAddr) -> BufReader<TcpStream> {
    BufReader::new(TcpStream::connect(addr).await.unwrap())
}

/// Waits for the peer to close, failing after `limit`.
async fn expect_closed(stream: &mut BufReader<TcpStream>, limit: Duration) {
    let mut buf = [0u8; 64];
    let n = tokio::time::timeout(limit, stream.read(&mut buf))
        .await
        .expect("connection should have been closed")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

fn hello_router() -> ExactRouter {
    let mut router = ExactRouter::new();
    router
        .add_route(
            "/hello",
            Arc::new(handler_fn(|_req, res| {
                res.send(StatusCode::Ok, "text/plain", "hello").unwrap();
            })),
        )
        .unwrap();
    router
}

async fn start(server: Server) -> (Server, SocketAddr) {
    let mut server = server;
    let addr = server.listen_and_serve().await.unwrap();
    (server, addr)
}

#[tokio::test]
async fn test_serves_index_html() {
    let dir = tempfile::tempdir().unwrap();
    let page = b"<!DOCTYPE html><p>index</p>";
    std::fs::write(dir.path().join("index.html"), page).unwrap();

    let mut router = PrefixRouter::new();
    router
        .add_route("/", Arc::new(FileServer::new(dir.path()).unwrap()))
        .unwrap();
    let (mut server, addr) = start(Server::new("127.0.0.1:0").with_router(router)).await;

    let mut stream = connect(addr).await;
    stream
        .get_mut()
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let reply = read_reply(&mut stream).await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.headers["Content-Type"], "text/html");
    assert_eq!(reply.headers["Content-Length"], page.len().to_string());
    assert_eq!(reply.body, page);

    drop(stream);
    server.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_unknown_route_gets_html_error_page() {
    let (mut server, addr) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;

    let mut stream = connect(addr).await;
    stream
        .get_mut()
        .write_all(b"GET /missing HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let reply = read_reply(&mut stream).await;

    assert!((400..500).contains(&reply.status));
    assert_eq!(reply.headers["Content-Type"], "text/html");
    let body = String::from_utf8(reply.body).unwrap();
    assert!(body.contains("Not Found"));

    drop(stream);
    server.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_keep_alive_serves_second_request() {
    let (mut server, addr) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;

    let mut stream = connect(addr).await;
    for _ in 0..2 {
        stream
            .get_mut()
            .write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let reply = read_reply(&mut stream).await;

        assert_eq!(reply.status, 200);
        assert_eq!(reply.headers["Keep-Alive"], "timeout=5, max=100");
        assert_eq!(reply.body, b"hello");
    }

    drop(stream);
    server.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_idle_keep_alive_connection_is_closed_after_timeout() {
    let policy = FixedKeepAlive(KeepAlive {
        timeout: Duration::from_secs(1),
        max: 100,
    });
    let (mut server, addr) = start(
        Server::new("127.0.0.1:0")
            .with_router(hello_router())
            .with_keep_alive(policy),
    )
    .await;

    let mut stream = connect(addr).await;
    stream
        .get_mut()
        .write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let reply = read_reply(&mut stream).await;
    assert_eq!(reply.headers["Keep-Alive"], "timeout=1, max=100");

    let started = Instant::now();
    expect_closed(&mut stream, Duration::from_secs(3)).await;
    assert!(started.elapsed() >= Duration::from_millis(900));

    server.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_request_limit_closes_connection() {
    let policy = FixedKeepAlive(KeepAlive {
        timeout: Duration::from_secs(5),
        max: 2,
    });
    let (mut server, addr) = start(
        Server::new("127.0.0.1:0")
            .with_router(hello_router())
            .with_keep_alive(policy),
    )
    .await;

    let mut stream = connect(addr).await;
    for _ in 0..2 {
        stream
            .get_mut()
            .write_all(b"GET /hello HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut stream).await.status, 200);
    }
    expect_closed(&mut stream, Duration::from_secs(1)).await;

    server.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_http10_connection_closes_after_response() {
    let (mut server, addr) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;

    let mut stream = connect(addr).await;
    stream
        .get_mut()
        .write_all(b"GET /hello HTTP/1.0\r\n\r\n")
        .await
        .unwrap();
    let reply = read_reply(&mut stream).await;

    assert_eq!(reply.status, 200);
    assert!(!reply.headers.contains_key("Keep-Alive"));
    expect_closed(&mut stream, Duration::from_secs(1)).await;

    server.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_malformed_request_gets_500() {
    let (mut server, addr) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;

    let mut stream = connect(addr).await;
    stream
        .get_mut()
        .write_all(b"BREW /pot HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let reply = read_reply(&mut stream).await;

    assert_eq!(reply.status, 500);
    assert!(String::from_utf8(reply.body).unwrap().contains("Internal Server Error"));
    expect_closed(&mut stream, Duration::from_secs(1)).await;

    server.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_connection_count_tracks_open_sockets() {
    let (mut server, addr) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;

    let mut stream = connect(addr).await;
    stream
        .get_mut()
        .write_all(b"GET /hello HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    read_reply(&mut stream).await;
    assert_eq!(server.connection_count(), 1);

    drop(stream);
    let deadline = Instant::now() + Duration::from_secs(2);
    while server.connection_count() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.connection_count(), 0);

    server.shutdown(Duration::from_secs(1)).await;
}

struct Stall;

#[async_trait]
impl Handler for Stall {
    async fn handle(&self, _request: &Request, response: &mut Response) {
        tokio::time::sleep(Duration::from_secs(30)).await;
        let _ = response.send(StatusCode::Ok, "text/plain", "late");
    }
}

#[tokio::test]
async fn test_shutdown_gives_up_after_deadline() {
    let mut router = ExactRouter::new();
    router.add_route("/stall", Arc::new(Stall)).unwrap();
    let (mut server, addr) = start(Server::new("127.0.0.1:0").with_router(router)).await;

    let mut stream = connect(addr).await;
    stream
        .get_mut()
        .write_all(b"GET /stall HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while server.connection_count() == 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let outcome = server.shutdown(Duration::from_secs(1)).await;

    assert_eq!(outcome, ShutdownOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn test_shutdown_without_connections_completes() {
    let (mut server, addr) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;
    assert_eq!(server.state(), ServerState::Listening);
    assert_eq!(server.local_addr(), Some(addr));

    let outcome = server.shutdown(Duration::from_secs(1)).await;

    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert_eq!(server.local_addr(), None);
    assert!(TcpStream::connect(addr).await.is_err());
    assert_eq!(
        server.shutdown(Duration::from_secs(1)).await,
        ShutdownOutcome::NotRunning
    );
}

#[tokio::test]
async fn test_listen_requires_address_and_router() {
    let mut no_addr = Server::new("").with_router(hello_router());
    assert!(matches!(
        no_addr.listen_and_serve().await,
        Err(ServerError::MissingAddress)
    ));

    let mut no_router = Server::new("127.0.0.1:0");
    assert!(matches!(
        no_router.listen_and_serve().await,
        Err(ServerError::MissingRouter)
    ));
}

#[tokio::test]
async fn test_listen_twice_is_rejected() {
    let (mut server, _addr) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;

    assert!(matches!(
        server.listen_and_serve().await,
        Err(ServerError::AlreadyListening(_))
    ));

    server.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let mut server = Server::new("not-an-address").with_router(hello_router());

    assert!(matches!(
        server.listen_and_serve().await,
        Err(ServerError::Bind { .. })
    ));
}

#[tokio::test]
async fn test_independent_servers_have_separate_counts() {
    let (mut a, addr_a) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;
    let (mut b, _addr_b) = start(Server::new("127.0.0.1:0").with_router(hello_router())).await;

    let mut stream = connect(addr_a).await;
    stream
        .get_mut()
        .write_all(b"GET /hello HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    read_reply(&mut stream).await;

    assert_eq!(a.connection_count(), 1);
    assert_eq!(b.connection_count(), 0);

    drop(stream);
    a.shutdown(Duration::from_secs(1)).await;
    b.shutdown(Duration::from_secs(1)).await;
}
