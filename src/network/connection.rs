//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{Dispatch, Request};
use crate::engine::Engine;
use crate::error::{KvError, Result};
use crate::protocol::{write_value, RespReader, Value};

/// Handles a single client connection
pub struct Connection {
    /// Decoder over the buffered TCP stream
    reader: RespReader<BufReader<TcpStream>>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the engine
    engine: Arc<Engine>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O; protocol limits come from the engine config
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;
        let limits = engine.config().limits;

        Ok(Self {
            reader: RespReader::with_limits(BufReader::new(read_stream), limits),
            writer: BufWriter::new(write_stream),
            engine,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves the stream blocking forever)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref().get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads one request at a time and writes its reply before reading the
    /// next. Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let value = match self.reader.read_value() {
                Ok(value) => value,
                Err(e) if e.is_clean_eof() => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(KvError::IncompleteInput { .. }) => {
                    tracing::debug!("Client {} disconnected mid-request", self.peer_addr);
                    return Ok(());
                }
                Err(KvError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Connection {} closed by client: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(KvError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    // Unix reports WouldBlock, Windows TimedOut
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) if e.is_protocol_error() => {
                    tracing::warn!("Protocol error from {}: {}", self.peer_addr, e);
                    let _ = self.send(&Value::error(format!("ERR {}", e)));
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            let request = match Request::from_value(value) {
                Ok(request) => request,
                Err(reason) => {
                    tracing::warn!("Invalid request from {}: {}", self.peer_addr, reason);
                    continue;
                }
            };

            tracing::trace!("Received {} from {}", request.name(), self.peer_addr);

            let reply = self.execute(&request);

            if let Err(e) = self.send(&reply) {
                if let KvError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before reply could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Execute a request and return the reply
    ///
    /// Unknown commands get an empty simple string.
    fn execute(&self, request: &Request) -> Value {
        match self.engine.execute(request) {
            Dispatch::Reply(reply) => reply,
            Dispatch::UnknownCommand(name) => {
                // redis-cli sends COMMAND on connect
                if name == "COMMAND" {
                    tracing::debug!("Ignoring COMMAND from {}", self.peer_addr);
                } else {
                    tracing::info!("Invalid command from {}: {}", self.peer_addr, name);
                }
                Value::simple("")
            }
        }
    }

    fn send(&mut self, reply: &Value) -> Result<()> {
        write_value(&mut self.writer, reply)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}
