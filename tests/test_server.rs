use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use pollhttpd::access_log::AccessLog;
use pollhttpd::config::ServerConfig;
use pollhttpd::server::{Flow, ManualClock, Server};

const TICK: Duration = Duration::from_millis(20);
const MAX_TICKS: usize = 250;

fn settings() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        ..ServerConfig::default()
    }
}

fn start() -> (Server<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let server = Server::bind_with_clock(&settings(), AccessLog::disabled(), clock.clone()).unwrap();
    (server, clock)
}

fn connect(server: &Server<ManualClock>) -> TcpStream {
    let client = TcpStream::connect(server.local_addr()).unwrap();
    client.set_read_timeout(Some(TICK)).unwrap();
    client
}

/// Polls until `done` holds or the tick budget runs out.
fn pump_until(server: &mut Server<ManualClock>, mut done: impl FnMut(&Server<ManualClock>) -> bool) {
    for _ in 0..MAX_TICKS {
        if done(server) {
            return;
        }
        assert_eq!(server.poll_once(Some(TICK)).unwrap(), Flow::Continue);
    }
    assert!(done(server), "condition not reached");
}

/// Splits complete responses off the front of `buf`.
fn take_responses(buf: &mut Vec<u8>, out: &mut Vec<String>) {
    loop {
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let length: usize = head
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let total = end + 4 + length;
        if buf.len() < total {
            return;
        }
        let response: Vec<u8> = buf.drain(..total).collect();
        out.push(String::from_utf8(response).unwrap());
    }
}

/// Serves the loop while collecting `count` responses from the client.
fn read_responses(server: &mut Server<ManualClock>, client: &mut TcpStream, count: usize) -> Vec<String> {
    let mut buf = Vec::new();
    let mut responses = Vec::new();
    let mut chunk = [0u8; 4096];

    for _ in 0..MAX_TICKS {
        server.poll_once(Some(TICK)).unwrap();
        match client.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => panic!("client read failed: {}", e),
        }
        take_responses(&mut buf, &mut responses);
        if responses.len() >= count {
            break;
        }
    }

    assert_eq!(responses.len(), count, "unexpected response count");
    responses
}

fn roundtrip(server: &mut Server<ManualClock>, client: &mut TcpStream, request: &[u8]) -> String {
    client.write_all(request).unwrap();
    read_responses(server, client, 1).remove(0)
}

/// True once the client observes end-of-stream.
fn sees_eof(client: &mut TcpStream) -> bool {
    let mut chunk = [0u8; 64];
    for _ in 0..MAX_TICKS {
        match client.read(&mut chunk) {
            Ok(0) => return true,
            Ok(_) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => return true,
            Err(e) => panic!("client read failed: {}", e),
        }
    }
    false
}

#[test]
fn test_accepts_every_queued_client_in_one_pass() {
    let (mut server, _clock) = start();
    let clients: Vec<TcpStream> = (0..5).map(|_| connect(&server)).collect();
    thread::sleep(Duration::from_millis(50));

    server.poll_once(Some(Duration::from_millis(200))).unwrap();

    assert_eq!(server.connection_count(), clients.len());
}

#[test]
fn test_accept_burst_cap_carries_over() {
    let clock = ManualClock::new();
    let cfg = ServerConfig {
        accept_burst: 2,
        ..settings()
    };
    let mut server = Server::bind_with_clock(&cfg, AccessLog::disabled(), clock).unwrap();
    let clients: Vec<TcpStream> = (0..5).map(|_| TcpStream::connect(server.local_addr()).unwrap()).collect();
    thread::sleep(Duration::from_millis(50));

    server.poll_once(Some(Duration::from_millis(200))).unwrap();
    assert_eq!(server.connection_count(), 2);

    pump_until(&mut server, |s| s.connection_count() == clients.len());
}

#[test]
fn test_keep_alive_serves_requests_then_expires() {
    let (mut server, clock) = start();
    let mut client = connect(&server);

    let first = roundtrip(&mut server, &mut client, b"GET /one HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(first.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(first.contains("\r\nConnection: keep-alive\r\n"));
    assert!(first.contains("\r\nKeep-Alive: timeout=30, max=100\r\n"));
    assert!(first.contains("http://localhost/one"));
    assert_eq!(server.connection_count(), 1);

    clock.advance(Duration::from_secs(20));
    let second = roundtrip(&mut server, &mut client, b"GET /two HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(second.contains("http://localhost/two"));
    assert_eq!(server.connection_count(), 1);

    // The second request reset the idle timer.
    clock.advance(Duration::from_secs(20));
    server.poll_once(Some(Duration::ZERO)).unwrap();
    assert_eq!(server.connection_count(), 1);

    clock.advance(Duration::from_secs(11));
    server.poll_once(Some(Duration::ZERO)).unwrap();
    assert_eq!(server.connection_count(), 0);
    assert!(sees_eof(&mut client));
}

#[test]
fn test_connection_close_is_honored() {
    let (mut server, _clock) = start();
    let mut client = connect(&server);

    let response = roundtrip(
        &mut server,
        &mut client,
        b"GET / HTTP/1.1\r\nHost: h\r\nConnection: close\r\n\r\n",
    );

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("\r\nConnection: close\r\n"));
    pump_until(&mut server, |s| s.connection_count() == 0);
    assert!(sees_eof(&mut client));
}

#[test]
fn test_http10_closes_after_response() {
    let (mut server, _clock) = start();
    let mut client = connect(&server);

    let response = roundtrip(&mut server, &mut client, b"GET / HTTP/1.0\r\nHost: h\r\n\r\n");

    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.contains("\r\nConnection: close\r\n"));
    assert!(sees_eof(&mut client));
}

#[test]
fn test_unsupported_version_answers_505_and_closes() {
    let (mut server, _clock) = start();
    let mut client = connect(&server);

    let response = roundtrip(&mut server, &mut client, b"GET / HTTP/2.0\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 505 HTTP Version Not Supported\r\n"));
    assert!(response.contains("\r\nContent-Length: 0\r\n"));
    assert!(response.ends_with("\r\n\r\n"));
    pump_until(&mut server, |s| s.connection_count() == 0);
}

#[test]
fn test_idle_connection_is_evicted_once() {
    let (mut server, clock) = start();
    let mut client = connect(&server);
    pump_until(&mut server, |s| s.connection_count() == 1);

    clock.advance(Duration::from_secs(29));
    server.poll_once(Some(Duration::ZERO)).unwrap();
    assert_eq!(server.connection_count(), 1);

    clock.advance(Duration::from_secs(1));
    server.poll_once(Some(Duration::ZERO)).unwrap();
    assert_eq!(server.connection_count(), 0);

    server.poll_once(Some(TICK)).unwrap();
    assert_eq!(server.connection_count(), 0);
    assert!(sees_eof(&mut client));
}

#[test]
fn test_peer_close_removes_connection() {
    let (mut server, _clock) = start();
    let client = connect(&server);
    pump_until(&mut server, |s| s.connection_count() == 1);

    drop(client);

    pump_until(&mut server, |s| s.connection_count() == 0);
}

#[test]
fn test_partial_request_waits_for_rest() {
    let (mut server, _clock) = start();
    let mut client = connect(&server);

    client.write_all(b"POST /form HTTP/1.1\r\nHost: h\r\nContent-Length: 9\r\n\r\nname").unwrap();
    client.flush().unwrap();
    for _ in 0..5 {
        server.poll_once(Some(TICK)).unwrap();
    }
    let mut chunk = [0u8; 64];
    assert!(client.read(&mut chunk).is_err());

    let response = roundtrip(&mut server, &mut client, b"=jane");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("name=jane"));
}

#[test]
fn test_pipelined_requests_are_answered_in_order() {
    let (mut server, _clock) = start();
    let mut client = connect(&server);

    client
        .write_all(b"GET /a HTTP/1.1\r\nHost: h\r\n\r\nHEAD /b HTTP/1.1\r\nHost: h\r\n\r\nGET /c HTTP/1.1\r\nHost: h\r\n\r\n")
        .unwrap();
    let responses = read_responses(&mut server, &mut client, 3);

    assert!(responses[0].contains("http://h/a"));
    assert!(responses[1].starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(responses[1].contains("\r\nContent-Length: 0\r\n"));
    assert!(responses[1].ends_with("\r\n\r\n"));
    assert!(responses[2].contains("http://h/c"));
    assert_eq!(server.connection_count(), 1);
}

#[test]
fn test_shutdown_handle_stops_run() {
    let server = Server::bind(&settings(), AccessLog::disabled()).unwrap();
    let addr = server.local_addr();
    let handle = server.shutdown_handle();
    let worker = thread::spawn(move || server.run());

    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    client.write_all(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
    let mut chunk = [0u8; 16];
    let n = client.read(&mut chunk).unwrap();
    assert!(n > 0);

    handle.shutdown().unwrap();

    worker.join().unwrap().unwrap();
    assert!(sees_eof(&mut client));
}
