//! Transport factory between the controller and the network.
//!
//! The controller never opens sockets itself. It asks a [`HostDialer`] for a
//! fresh transport each time it (re)connects, so tests can hand it scripted
//! wires and production gets [`TcpDialer`].

use std::time::Duration;

use pedalera_host::{HostError, TcpTransport, Transport};

/// Opens transports to the audio host on demand.
pub trait HostDialer: Send {
    /// Open a fresh transport to the host.
    fn dial(&mut self) -> Result<Box<dyn Transport>, HostError>;
}

/// Dials the audio host over TCP.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
    timeout: Duration,
}

impl TcpDialer {
    /// Dialer for `addr` with a per-attempt connect timeout.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// The address this dialer connects to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl HostDialer for TcpDialer {
    fn dial(&mut self) -> Result<Box<dyn Transport>, HostError> {
        let transport = TcpTransport::connect(&self.addr, self.timeout)?;
        Ok(Box::new(transport))
    }
}
