//! Pluggable byte transport under the host session.
//!
//! The session logic is transport-agnostic so tests can drive it with
//! scripted doubles. Production uses [`TcpTransport`], which talks to the
//! audio host over a local TCP socket with a reader thread feeding a
//! channel; `poll_line` never blocks the caller.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::{HostError, Result};

/// Line-oriented connection to the audio host.
///
/// `send_line` and `poll_line` deal in frames without trailing newlines;
/// implementations own the framing. `poll_line` must never block: it returns
/// `Ok(None)` when nothing is pending and an error once the connection is
/// gone.
pub trait Transport: Send {
    /// Send one frame. The implementation appends the newline.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Fetch one pending inbound frame, if any, without blocking.
    fn poll_line(&mut self) -> Result<Option<String>>;

    /// Tear the connection down. Safe to call more than once.
    fn close(&mut self);
}

/// TCP transport with a background reader thread.
///
/// The reader thread owns the receive half and pushes complete lines into a
/// channel; it exits when the peer closes or the socket is shut down via
/// [`close`](Transport::close).
pub struct TcpTransport {
    stream: TcpStream,
    lines: Receiver<io::Result<String>>,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Connect to `addr` within `timeout`.
    ///
    /// Resolves the address, connects with the given timeout, disables
    /// Nagle's algorithm, and spawns the reader thread.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let peer = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                HostError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("no address for {addr}"),
                ))
            })?;
        let stream = TcpStream::connect_timeout(&peer, timeout)?;
        stream.set_nodelay(true)?;

        let reader = stream.try_clone()?;
        let (tx, lines) = mpsc::channel();
        thread::Builder::new()
            .name("host-reader".to_string())
            .spawn(move || read_loop(reader, &tx))?;

        tracing::debug!("transport: connected to {peer}");
        Ok(Self { stream, lines, peer })
    }

    /// Address of the connected host.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

fn read_loop(stream: TcpStream, tx: &mpsc::Sender<io::Result<String>>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            // EOF, peer closed. Dropping the sender wakes the poller.
            Ok(0) => break,
            Ok(_) => {
                let frame = line.trim_end_matches(['\r', '\n']).to_string();
                if tx.send(Ok(frame)).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(Err(err));
                break;
            }
        }
    }
}

impl Transport for TcpTransport {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()?;
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>> {
        match self.lines.try_recv() {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(err)) => Err(HostError::Io(err)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HostError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "host closed the connection",
            ))),
        }
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
