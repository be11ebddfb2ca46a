//! TCP transport: socket ownership and line-based primitives.
//!
//! `Transport` is the leaf of the networking stack. It connects with a
//! bounded timeout, writes newline-terminated lines, and hands a cloned
//! read half to the dispatcher thread. It performs no retries; retry
//! policy belongs to callers.

use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;

use log::debug;

use crate::error::ClientError;

/// An established connection to the game server.
#[derive(Debug)]
pub struct Transport {
    /// Write half; the read half is cloned out via [`Transport::reader`].
    stream: Mutex<TcpStream>,
    peer: SocketAddr,
}

impl Transport {
    /// Connect to `host:port`, failing if no address is reachable within
    /// `timeout`. Idempotence across reconnects is the session's concern;
    /// each `Transport` represents exactly one established connection.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(ClientError::Connection)?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!("connected to {}", addr);
                    let _ = stream.set_nodelay(true);
                    return Ok(Self {
                        stream: Mutex::new(stream),
                        peer: addr,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(ClientError::Connection(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved")
        })))
    }

    /// The server address this transport is connected to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Append the line terminator, write, and flush.
    pub fn send_line(&self, line: &str) -> Result<(), ClientError> {
        debug!("send: {}", line);
        let mut stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        stream
            .write_all(line.as_bytes())
            .and_then(|_| stream.write_all(b"\n"))
            .and_then(|_| stream.flush())
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// A buffered read half for the dispatcher thread. Reads on the clone
    /// block until a full line arrives or the stream closes.
    pub fn reader(&self) -> Result<BufReader<TcpStream>, ClientError> {
        let stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        stream
            .try_clone()
            .map(BufReader::new)
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// Shut the socket down both ways. Safe to call more than once; any
    /// blocked read on the cloned half fails, which ends the dispatcher.
    pub fn disconnect(&self) {
        let stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        let _ = stream.shutdown(Shutdown::Both);
    }
}
