//! Change log entries consumed by the host session.

use pedalera_catalog::{PluginUri, PortSymbol};

use crate::board::{Connection, InstanceId, PortRef};

/// One recorded board mutation, in the order it happened.
///
/// Every user-originated mutation appends an intent; the session drains the
/// log with [`Pedalboard::take_intents`](crate::Pedalboard::take_intents) and
/// forwards each entry to the audio host in order. Host-originated updates go
/// through the `apply_host_*` methods instead, which skip the log so echoes
/// never loop back to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphIntent {
    /// An instance was created.
    AddInstance {
        /// Id assigned to the new instance.
        id: InstanceId,
        /// Plugin loaded into it.
        uri: PluginUri,
    },
    /// An instance was removed. The host drops its connections itself.
    RemoveInstance {
        /// Id of the removed instance.
        id: InstanceId,
    },
    /// An audio edge was added.
    Connect {
        /// Source output port.
        src: PortRef,
        /// Destination input port.
        dst: PortRef,
    },
    /// An audio edge was removed.
    Disconnect {
        /// Source output port.
        src: PortRef,
        /// Destination input port.
        dst: PortRef,
    },
    /// A control value was stored.
    SetParam {
        /// Instance that owns the port.
        instance: InstanceId,
        /// The control input port.
        port: PortSymbol,
        /// Stored value, already clamped to the port's range.
        value: f32,
    },
    /// Bypass was toggled.
    SetBypass {
        /// The affected instance.
        instance: InstanceId,
        /// New bypass state.
        bypassed: bool,
    },
}

impl GraphIntent {
    /// Intent for adding `connection` as it appears on the board.
    pub(crate) fn connect(connection: &Connection) -> Self {
        Self::Connect {
            src: connection.src.clone(),
            dst: connection.dst.clone(),
        }
    }
}
