//! Error types for board mutations and control addressing.

use pedalera_catalog::{PluginUri, PortSymbol};
use thiserror::Error;

use crate::addressing::ControlId;
use crate::board::InstanceId;

/// Errors from binding hardware controls to plugin ports.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressError {
    /// The addressed range is unusable for the chosen transform or falls
    /// outside the port's declared range.
    #[error("addressing range [{min}, {max}] for '{control}' is invalid: {reason}")]
    RangeOutOfBounds {
        /// The control whose addressing was rejected.
        control: ControlId,
        /// Requested lower bound.
        min: f32,
        /// Requested upper bound.
        max: f32,
        /// What made the range unusable.
        reason: String,
    },

    /// The target port cannot carry an addressing at all.
    #[error("port '{port}' is not addressable: {reason}")]
    PortNotAddressable {
        /// The rejected port.
        port: PortSymbol,
        /// Why the port cannot be addressed.
        reason: String,
    },

    /// The control already drives another port. Unaddress it first.
    #[error("control '{0}' is already bound")]
    ControlAlreadyBound(ControlId),

    /// No addressing exists for this control.
    #[error("control '{0}' is not addressed")]
    Unaddressed(ControlId),
}

impl AddressError {
    /// Rejected range on an otherwise addressable port.
    pub fn range_out_of_bounds(
        control: ControlId,
        min: f32,
        max: f32,
        reason: impl Into<String>,
    ) -> Self {
        Self::RangeOutOfBounds {
            control,
            min,
            max,
            reason: reason.into(),
        }
    }

    /// Port refused for addressing.
    pub fn port_not_addressable(port: PortSymbol, reason: impl Into<String>) -> Self {
        Self::PortNotAddressable {
            port,
            reason: reason.into(),
        }
    }
}

/// Errors from mutating a [`Pedalboard`](crate::Pedalboard).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The plugin URI is not in the catalog.
    #[error("unknown plugin: {0}")]
    UnknownPlugin(PluginUri),

    /// No instance with this id on the board.
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    /// An instance with this id is already on the board.
    #[error("instance {0} already exists")]
    DuplicateInstance(InstanceId),

    /// The port is missing, has the wrong direction, or the wrong kind for
    /// the attempted operation.
    #[error("invalid port '{port}' on instance {instance}: {reason}")]
    InvalidPort {
        /// Instance the port was looked up on.
        instance: InstanceId,
        /// The offending port symbol.
        port: PortSymbol,
        /// What was wrong with it.
        reason: String,
    },

    /// The connection would wire an instance straight into itself.
    #[error("connection would feed instance {0} back into itself")]
    SelfLoop(InstanceId),

    /// No snapshot with this name on the board.
    #[error("unknown snapshot '{0}'")]
    UnknownSnapshot(String),

    /// A snapshot with the target name already exists.
    #[error("snapshot '{0}' already exists")]
    SnapshotExists(String),

    /// An addressing operation failed.
    #[error(transparent)]
    Address(#[from] AddressError),
}

impl GraphError {
    /// Port lookup or kind/direction check failed.
    pub fn invalid_port(
        instance: InstanceId,
        port: impl Into<PortSymbol>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidPort {
            instance,
            port: port.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_error_display() {
        let err = AddressError::range_out_of_bounds(
            ControlId::new("knob:1"),
            5.0,
            1.0,
            "min exceeds max",
        );
        assert_eq!(
            err.to_string(),
            "addressing range [5, 1] for 'knob:1' is invalid: min exceeds max"
        );

        let err = AddressError::ControlAlreadyBound(ControlId::new("exp:0"));
        assert_eq!(err.to_string(), "control 'exp:0' is already bound");
    }

    #[test]
    fn test_graph_error_display() {
        let err = GraphError::invalid_port(InstanceId(3), "gane", "no such port");
        assert_eq!(
            err.to_string(),
            "invalid port 'gane' on instance 3: no such port"
        );

        let err = GraphError::SelfLoop(InstanceId(1));
        assert_eq!(
            err.to_string(),
            "connection would feed instance 1 back into itself"
        );
    }

    #[test]
    fn test_address_error_converts_to_graph_error() {
        let err: GraphError =
            AddressError::ControlAlreadyBound(ControlId::new("knob:2")).into();
        assert_eq!(err.to_string(), "control 'knob:2' is already bound");
    }
}
