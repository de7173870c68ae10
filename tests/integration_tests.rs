//! Integration tests for respkv
//!
//! Real TCP server, real client, real log file.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use respkv::network::{Client, Server, ShutdownHandle};
use respkv::{Config, Engine, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    addr: SocketAddr,
    engine: Arc<Engine>,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(temp_dir: &TempDir) -> Self {
        Self::start_with(temp_dir, |builder| builder)
    }

    fn start_with(
        temp_dir: &TempDir,
        customize: impl FnOnce(respkv::config::ConfigBuilder) -> respkv::config::ConfigBuilder,
    ) -> Self {
        let config = customize(
            Config::builder()
                .aof_path(temp_dir.path().join("database.aof"))
                .listen_addr("127.0.0.1:0")
                .fsync_interval(Duration::from_millis(50)),
        )
        .build();

        let engine = Arc::new(Engine::open(config.clone()).unwrap());
        let server = Server::bind(config, Arc::clone(&engine)).unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let thread = thread::spawn(move || server.run().unwrap());

        Self {
            addr,
            engine,
            shutdown,
            thread: Some(thread),
        }
    }

    fn client(&self) -> Client {
        Client::connect(self.addr).unwrap()
    }

    fn stop(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
        self.engine.close().unwrap();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown_inner();
        }
    }
}

fn raw_exchange(stream: &mut TcpStream, request: &[u8], expected_len: usize) -> Vec<u8> {
    stream.write_all(request).unwrap();
    let mut reply = vec![0u8; expected_len];
    stream.read_exact(&mut reply).unwrap();
    reply
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_set_get_over_the_wire() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let mut stream = TcpStream::connect(server.addr).unwrap();

    assert_eq!(
        raw_exchange(&mut stream, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n", 5),
        b"+OK\r\n"
    );
    assert_eq!(
        raw_exchange(&mut stream, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n", 9),
        b"$3\r\nbar\r\n"
    );
    assert_eq!(
        raw_exchange(&mut stream, b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n", 5),
        b"$-1\r\n"
    );
}

#[test]
fn test_hgetall_over_the_wire() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let mut client = server.client();

    assert_eq!(client.call(&["HSET", "h", "f1", "v1"]).unwrap(), Value::ok());
    assert_eq!(client.call(&["HSET", "h", "f2", "v2"]).unwrap(), Value::ok());

    let reply = client.call(&["HGETALL", "h"]).unwrap();
    let items = reply.as_array().unwrap();
    assert_eq!(items.len(), 4);
    assert!(items.iter().all(|item| matches!(item, Value::Bulk(_))));

    let pairs: HashSet<(Vec<u8>, Vec<u8>)> = items
        .chunks(2)
        .map(|pair| {
            (
                pair[0].as_bytes().unwrap().to_vec(),
                pair[1].as_bytes().unwrap().to_vec(),
            )
        })
        .collect();
    let expected: HashSet<(Vec<u8>, Vec<u8>)> = [
        (b"f1".to_vec(), b"v1".to_vec()),
        (b"f2".to_vec(), b"v2".to_vec()),
    ]
    .into_iter()
    .collect();
    assert_eq!(pairs, expected);
}

#[test]
fn test_ping_over_the_wire() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let mut stream = TcpStream::connect(server.addr).unwrap();

    assert_eq!(raw_exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", 7), b"+PONG\r\n");
    assert_eq!(
        raw_exchange(&mut stream, b"*2\r\n$4\r\nPING\r\n$5\r\nhello\r\n", 8),
        b"+hello\r\n"
    );
}

#[test]
fn test_restart_replays_log() {
    let temp_dir = TempDir::new().unwrap();
    {
        let server = TestServer::start(&temp_dir);
        let mut client = server.client();
        assert_eq!(client.call(&["SET", "a", "1"]).unwrap(), Value::ok());
        drop(client);
        server.stop();
    }

    let server = TestServer::start(&temp_dir);
    let mut stream = TcpStream::connect(server.addr).unwrap();
    assert_eq!(
        raw_exchange(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n", 7),
        b"$1\r\n1\r\n"
    );
}

#[test]
fn test_unknown_command_keeps_connection_open() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let mut stream = TcpStream::connect(server.addr).unwrap();

    assert_eq!(raw_exchange(&mut stream, b"*1\r\n$7\r\nUNKNOWN\r\n", 3), b"+\r\n");
    assert_eq!(raw_exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", 7), b"+PONG\r\n");
}

#[test]
fn test_non_string_command_name_gets_empty_reply() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    assert_eq!(raw_exchange(&mut stream, b"*1\r\n:5\r\n", 3), b"+\r\n");
    assert_eq!(raw_exchange(&mut stream, b"*2\r\n$-1\r\n$1\r\nk\r\n", 3), b"+\r\n");
    assert_eq!(raw_exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", 7), b"+PONG\r\n");
}

// =============================================================================
// Connection Behaviour Tests
// =============================================================================

#[test]
fn test_non_array_requests_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let mut stream = TcpStream::connect(server.addr).unwrap();

    // Neither of these gets a reply; the PING after them does
    stream.write_all(b"$4\r\nPING\r\n*0\r\n").unwrap();
    assert_eq!(raw_exchange(&mut stream, b"*1\r\n$4\r\nPING\r\n", 7), b"+PONG\r\n");
}

#[test]
fn test_arity_error_keeps_connection_open() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let mut client = server.client();

    assert_eq!(
        client.call(&["GET"]).unwrap(),
        Value::error("ERR wrong number of arguments for 'get' command")
    );
    assert_eq!(client.call(&["PING"]).unwrap(), Value::simple("PONG"));
}

#[test]
fn test_protocol_error_closes_only_that_connection() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);

    let mut bad = TcpStream::connect(server.addr).unwrap();
    bad.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    bad.write_all(b"!bogus\r\n").unwrap();

    let mut reply = Vec::new();
    bad.read_to_end(&mut reply).unwrap();
    assert!(reply.starts_with(b"-ERR"));

    let mut good = server.client();
    assert_eq!(good.call(&["PING"]).unwrap(), Value::simple("PONG"));
}

#[test]
fn test_pipelined_requests_answered_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let mut client = server.client();

    let mut batch = Vec::new();
    for i in 0..10 {
        batch.extend_from_slice(&Value::command(["SET".to_string(), format!("k{}", i), i.to_string()]).marshal());
        batch.extend_from_slice(&Value::command(["GET".to_string(), format!("k{}", i)]).marshal());
    }
    client.send_raw(&batch).unwrap();

    for i in 0..10 {
        assert_eq!(client.read_reply().unwrap(), Value::ok());
        assert_eq!(client.read_reply().unwrap(), Value::bulk(i.to_string()));
    }
}

#[test]
fn test_concurrent_clients_disjoint_keys() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start(&temp_dir);
    let addr = server.addr;

    let handles: Vec<_> = (0..8)
        .map(|t| {
            thread::spawn(move || {
                let mut client = Client::connect(addr).unwrap();
                for i in 0..50 {
                    let key = format!("c{}-{}", t, i);
                    assert_eq!(client.call(&["SET", key.as_str(), "x"]).unwrap(), Value::ok());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut client = server.client();
    for t in 0..8 {
        for i in 0..50 {
            let key = format!("c{}-{}", t, i);
            assert_eq!(client.call(&["GET", key.as_str()]).unwrap(), Value::bulk("x"));
        }
    }
}

#[test]
fn test_max_connections_rejects_extra_clients() {
    let temp_dir = TempDir::new().unwrap();
    let server = TestServer::start_with(&temp_dir, |builder| builder.max_connections(1));

    let mut first = server.client();
    assert_eq!(first.call(&["PING"]).unwrap(), Value::simple("PONG"));

    let mut second = server.client();
    assert_eq!(
        second.read_reply().unwrap(),
        Value::error("ERR max number of clients reached")
    );
}
