//! Link to the external real-time audio host.
//!
//! The audio host is a separate process that owns the sound card and runs
//! the plugins; this crate owns the socket to it. It provides:
//!
//! - **Wire codec**: the line protocol, correlation ids, and event parsing
//! - **Handle mapping**: board [`InstanceId`]s to host-assigned handles
//! - **Transport**: a [`Transport`] trait with a TCP implementation and
//!   room for test doubles
//! - **Session state machine**: [`HostSession`] with the
//!   `Disconnected → Connecting → Synchronizing → Ready` lifecycle,
//!   single-in-flight command issue, reply timeouts, and resynchronization
//!
//! The session never blocks: callers submit commands, then call
//! [`HostSession::pump`] from their own loop and react to the returned
//! [`SessionNotice`]s.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::{Duration, Instant};
//! use pedalera_host::{HostSession, TcpTransport};
//!
//! let transport = TcpTransport::connect("127.0.0.1:5555", Duration::from_secs(2))?;
//! let mut session = HostSession::new(Duration::from_secs(1));
//! session.connect(Box::new(transport), Instant::now())?;
//!
//! loop {
//!     for notice in session.pump(Instant::now()) {
//!         println!("{notice:?}");
//!     }
//! }
//! ```
//!
//! [`InstanceId`]: pedalera_board::InstanceId

mod command;
mod session;
mod transport;
mod wire;

pub use command::{HandleMap, HostCommand, HostHandle};
pub use session::{
    HostSession, HostUpdate, OutstandingRequest, SessionNotice, SessionState,
};
pub use transport::{TcpTransport, Transport};
pub use wire::{HostEvent, Inbound, PROTOCOL_VERSION, encode_request, parse_inbound};

use pedalera_board::InstanceId;

/// Error types for the host link.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Socket-level failure. The session treats these as connection loss.
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host answered `err` to a command. Never retried.
    #[error("host rejected the command: {reason}")]
    Rejected {
        /// The host's reason, surfaced verbatim.
        reason: String,
    },

    /// The host did not answer an outstanding request within the deadline.
    #[error("host did not answer within the deadline")]
    Timeout,

    /// An inbound line did not match the wire contract.
    #[error("malformed host line: {line:?}")]
    Protocol {
        /// The offending line.
        line: String,
    },

    /// The session has no live transport.
    #[error("not connected to a host")]
    NotConnected,

    /// Version negotiation failed at `hello`.
    #[error("host offered protocol {offered}, this build speaks {requested}")]
    UnsupportedProtocol {
        /// Version this build requested.
        requested: u32,
        /// Version the host offered instead.
        offered: u32,
    },

    /// A command referenced an instance the host never acknowledged.
    ///
    /// Happens when an `add` was rejected and later commands still name the
    /// instance; the next resynchronization squares the two sides again.
    #[error("no host handle for instance {0}")]
    UnmappedInstance(InstanceId),
}

impl HostError {
    /// Rejection with the host's verbatim reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Malformed line error.
    pub fn protocol(line: impl Into<String>) -> Self {
        Self::Protocol { line: line.into() }
    }
}

/// Convenience result type for host-link operations.
pub type Result<T> = std::result::Result<T, HostError>;
