//! Audio edges between instance ports.

use std::fmt;

use pedalera_catalog::PortSymbol;
use serde::{Deserialize, Serialize};

use crate::board::InstanceId;

/// One endpoint of a connection: an instance and one of its ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    /// The instance the port belongs to.
    pub instance: InstanceId,
    /// The port's symbol within that instance's plugin.
    pub port: PortSymbol,
}

impl PortRef {
    /// Reference to `port` on `instance`.
    pub fn new(instance: InstanceId, port: impl Into<PortSymbol>) -> Self {
        Self {
            instance,
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.instance, self.port)
    }
}

/// A directed audio edge from an output port to an input port.
///
/// Both endpoints are validated when the edge is added; a stored connection
/// always names an existing audio output and audio input on two different
/// instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Source endpoint, an audio output.
    pub src: PortRef,
    /// Destination endpoint, an audio input.
    pub dst: PortRef,
}

impl Connection {
    /// Edge from `src` to `dst`.
    pub fn new(src: PortRef, dst: PortRef) -> Self {
        Self { src, dst }
    }

    /// Whether either endpoint sits on `instance`.
    pub fn touches(&self, instance: InstanceId) -> bool {
        self.src.instance == instance || self.dst.instance == instance
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}
