//! Blocking client
//!
//! Sends commands as arrays of bulk strings and reads one reply per command.

use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{KvError, Result};
use crate::protocol::{write_value, RespReader, Value};

pub struct Client {
    reader: RespReader<BufReader<TcpStream>>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| KvError::Network(format!("failed to connect: {}", e)))?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: RespReader::new(BufReader::new(read_stream)),
            writer: BufWriter::new(stream),
        })
    }

    /// Send a command and wait for its reply
    pub fn call<A: AsRef<[u8]>>(&mut self, parts: &[A]) -> Result<Value> {
        self.send(&Value::command(parts))?;
        self.read_reply()
    }

    pub fn send(&mut self, value: &Value) -> Result<()> {
        write_value(&mut self.writer, value)
    }

    /// Write bytes as-is, for speaking the protocol by hand
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn read_reply(&mut self) -> Result<Value> {
        self.reader.read_value()
    }
}
