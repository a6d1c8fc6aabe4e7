//! Async TCP transport to a single cluster node.
//!
//! Wraps a `tokio::net::TcpStream` with an integrated read buffer and RESP
//! parser. This core only ever issues two commands over a transport: `AUTH`
//! and `CLUSTER NODES`; everything else is opaque bytes owned by the
//! embedding application.

use crate::error::{ClusterError, Result};
use crate::resp::parser::parse;
use crate::resp::types::RespValue;
use crate::resp::writer::encode_command_str;

use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, AsyncReadExt};
use tokio::net::TcpStream;

const DEFAULT_BUF_CAPACITY: usize = 64 * 1024;
/// Ceiling on how far a per-connection read buffer is allowed to grow.
pub const MAX_BUF_SIZE: usize = 512 * 1024 * 1024;

/// Interval used for TCP keepalive probes on node connections, matching the
/// cluster's own inter-node keepalive cadence.
pub const NODE_KEEPALIVE: Duration = Duration::from_secs(15);

/// A single async connection to a backend node.
pub struct Transport {
    stream: TcpStream,
    buf: BytesMut,
}

impl Transport {
    /// Connect to `addr` (e.g. "127.0.0.1:6379") and enable keepalive.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true).ok();
        let sock = socket2::SockRef::from(&stream);
        let _ = sock.set_tcp_keepalive(
            &socket2::TcpKeepalive::new()
                .with_time(NODE_KEEPALIVE)
                .with_interval(NODE_KEEPALIVE),
        );
        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
        })
    }

    /// Send a command built from string arguments and read back one reply.
    pub async fn execute_str(&mut self, args: &[&str]) -> Result<RespValue> {
        let cmd = encode_command_str(args);
        self.stream.write_all(&cmd).await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<RespValue> {
        loop {
            if !self.buf.is_empty() {
                let snapshot = self.buf.split().freeze();
                match parse(&snapshot) {
                    Ok((value, consumed)) => {
                        if consumed < snapshot.len() {
                            self.buf.extend_from_slice(&snapshot[consumed..]);
                        }
                        return Ok(value);
                    }
                    Err(ClusterError::Incomplete) => {
                        self.buf.extend_from_slice(&snapshot);
                    }
                    Err(e) => {
                        self.buf.extend_from_slice(&snapshot);
                        return Err(e);
                    }
                }
            }

            if self.buf.capacity() - self.buf.len() < 4096 {
                let new_cap = (self.buf.capacity() * 2).max(DEFAULT_BUF_CAPACITY);
                if new_cap > MAX_BUF_SIZE {
                    if self.buf.capacity() >= MAX_BUF_SIZE {
                        return Err(ClusterError::Protocol(
                            "reply exceeds maximum buffer size".into(),
                        ));
                    }
                    self.buf.reserve(MAX_BUF_SIZE - self.buf.capacity());
                } else {
                    self.buf.reserve(new_cap - self.buf.capacity());
                }
            }
            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(ClusterError::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by node",
                )));
            }
        }
    }

    /// Issue `AUTH` (with optional username) and expect `+OK`.
    pub async fn auth(&mut self, username: Option<&str>, password: &str) -> Result<()> {
        let response = match username {
            Some(user) => self.execute_str(&["AUTH", user, password]).await?,
            None => self.execute_str(&["AUTH", password]).await?,
        };
        match response {
            RespValue::SimpleString(ref s) if s == "OK" => Ok(()),
            RespValue::Error(msg) => Err(ClusterError::Auth(msg)),
            other => Err(ClusterError::Protocol(format!(
                "unexpected AUTH response: {:?}",
                other.type_name()
            ))),
        }
    }

    /// Issue `CLUSTER NODES` and return the raw text blob.
    pub async fn cluster_nodes(&mut self) -> Result<String> {
        let response = self.execute_str(&["CLUSTER", "NODES"]).await?;
        match response {
            RespValue::BulkString(b) => String::from_utf8(b.to_vec())
                .map_err(|e| ClusterError::Protocol(format!("CLUSTER NODES not UTF-8: {e}"))),
            RespValue::Error(msg) => Err(ClusterError::Protocol(msg)),
            other => Err(ClusterError::Protocol(format!(
                "unexpected CLUSTER NODES response: {:?}",
                other.type_name()
            ))),
        }
    }
}
