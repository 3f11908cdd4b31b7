//! End-to-end tests over real TCP sockets

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::Path;
use std::thread;

use lockserve_server::{Server, ServerConfig};
use tempfile::TempDir;

fn start(workers: usize) -> (SocketAddr, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::new().port(0).num_workers(workers).root(dir.path());
    let server = Server::bind(config).unwrap();
    let port = server.local_addr().unwrap().port();
    thread::spawn(move || server.run());
    (SocketAddr::from(([127, 0, 0, 1], port)), dir)
}

/// Send raw bytes, half-close, read the full response
fn roundtrip(addr: SocketAddr, request: &[u8]) -> (u16, Vec<u8>) {
    let mut s = TcpStream::connect(addr).unwrap();
    s.write_all(request).unwrap();
    s.shutdown(Shutdown::Write).unwrap();

    let mut raw = Vec::new();
    s.read_to_end(&mut raw).unwrap();

    let end = raw.windows(4).position(|w| w == b"\r\n\r\n").expect("no response head") + 4;
    let head = std::str::from_utf8(&raw[..end]).unwrap();
    assert!(head.starts_with("HTTP/1.1 "), "{head}");
    let len: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .unwrap()
        .parse()
        .unwrap();
    let body = raw[end..].to_vec();
    assert_eq!(body.len(), len);
    (head[9..12].parse().unwrap(), body)
}

fn put(addr: SocketAddr, name: &str, body: &[u8]) -> (u16, Vec<u8>) {
    let mut req = format!("PUT /{} HTTP/1.1\r\nContent-Length: {}\r\n\r\n", name, body.len()).into_bytes();
    req.extend_from_slice(body);
    roundtrip(addr, &req)
}

fn get(addr: SocketAddr, name: &str) -> (u16, Vec<u8>) {
    roundtrip(addr, format!("GET /{} HTTP/1.1\r\nRequest-Id: 1\r\n\r\n", name).as_bytes())
}

fn leftover_stage_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().starts_with(".lockserve-stage"))
        .count()
}

#[test]
fn put_then_get() {
    let (addr, dir) = start(2);

    assert_eq!(put(addr, "hello.txt", b"hello"), (201, b"Created\n".to_vec()));
    assert_eq!(get(addr, "hello.txt"), (200, b"hello".to_vec()));
    assert_eq!(put(addr, "hello.txt", b"v2"), (200, b"OK\n".to_vec()));
    assert_eq!(get(addr, "hello.txt"), (200, b"v2".to_vec()));

    assert_eq!(std::fs::read(dir.path().join("hello.txt")).unwrap(), b"v2");
    assert_eq!(leftover_stage_files(dir.path()), 0);
}

#[test]
fn error_statuses() {
    let (addr, dir) = start(2);
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    assert_eq!(get(addr, "nope.txt").0, 404);
    assert_eq!(get(addr, "sub").0, 403);
    assert_eq!(roundtrip(addr, b"POST /x HTTP/1.1\r\n\r\n").0, 501);
    assert_eq!(roundtrip(addr, b"GET /x HTTP/2.0\r\n\r\n").0, 505);
    assert_eq!(roundtrip(addr, b"GET x HTTP/1.1\r\n\r\n").0, 400);
    assert_eq!(roundtrip(addr, b"PUT /x HTTP/1.1\r\n\r\n").0, 400);
}

#[test]
fn concurrent_clients_on_many_files() {
    let (addr, dir) = start(4);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let name = format!("file-{}.txt", i % 3);
                let body = format!("payload from client {}", i);
                let (code, _) = put(addr, &name, body.as_bytes());
                assert!(code == 200 || code == 201, "unexpected status {code}");
                let (code, got) = get(addr, &name);
                assert_eq!(code, 200);
                let got = String::from_utf8(got).unwrap();
                assert!(got.starts_with("payload from client "), "torn content: {got}");
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(leftover_stage_files(dir.path()), 0);
}

#[test]
fn more_clients_than_workers() {
    let (addr, _dir) = start(1);
    put(addr, "q.txt", b"queued");

    let handles: Vec<_> = (0..6).map(|_| thread::spawn(move || get(addr, "q.txt"))).collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), (200, b"queued".to_vec()));
    }
}
