//! Logical host commands and the instance/handle mapping.

use std::collections::BTreeMap;
use std::fmt;

use pedalera_board::{GraphIntent, InstanceId, PortRef};
use pedalera_catalog::{PluginUri, PortSymbol};

/// Host-assigned identifier for a loaded plugin instance.
///
/// Handles belong to one connection. After a reconnect the host assigns
/// fresh ones, which is why they are never persisted and never shown to the
/// board layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u32);

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidirectional map between board instance ids and host handles.
///
/// Bindings are created when the host acknowledges an `add` and dropped on
/// `remove`, resynchronization, and reconnect.
#[derive(Debug, Clone, Default)]
pub struct HandleMap {
    by_instance: BTreeMap<InstanceId, HostHandle>,
    by_handle: BTreeMap<HostHandle, InstanceId>,
}

impl HandleMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `instance` to `handle`, displacing any stale pairing of either.
    pub fn bind(&mut self, instance: InstanceId, handle: HostHandle) {
        if let Some(old_handle) = self.by_instance.insert(instance, handle) {
            self.by_handle.remove(&old_handle);
        }
        if let Some(old_instance) = self.by_handle.insert(handle, instance) {
            if old_instance != instance {
                self.by_instance.remove(&old_instance);
            }
        }
    }

    /// Drop the binding for `instance`, returning its handle.
    pub fn unbind(&mut self, instance: InstanceId) -> Option<HostHandle> {
        let handle = self.by_instance.remove(&instance)?;
        self.by_handle.remove(&handle);
        Some(handle)
    }

    /// Handle bound to `instance`, if the host has acknowledged it.
    pub fn handle(&self, instance: InstanceId) -> Option<HostHandle> {
        self.by_instance.get(&instance).copied()
    }

    /// Instance bound to `handle`, if the binding is still live.
    pub fn instance(&self, handle: HostHandle) -> Option<InstanceId> {
        self.by_handle.get(&handle).copied()
    }

    /// Drop every binding.
    pub fn clear(&mut self) {
        self.by_instance.clear();
        self.by_handle.clear();
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.by_instance.len()
    }

    /// Whether no binding exists.
    pub fn is_empty(&self) -> bool {
        self.by_instance.is_empty()
    }
}

/// One logical command to the host, referencing board instance ids.
///
/// Handles are resolved at encode time, after the host has acknowledged the
/// `add` that created them. Everything except `Hello` and `Reset` comes
/// straight out of the board's intent log via [`from_intent`](Self::from_intent).
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Protocol version negotiation, sent once per connection.
    Hello {
        /// Protocol version this build speaks.
        version: u32,
    },
    /// Drop every instance and connection on the host.
    ///
    /// Issued at the start of every resynchronization pass so replay works
    /// against any prior host state.
    Reset,
    /// Load a plugin.
    Add {
        /// Board id the new handle will be bound to.
        instance: InstanceId,
        /// Plugin to load.
        uri: PluginUri,
    },
    /// Unload an instance. The host drops its connections itself.
    Remove {
        /// Instance to unload.
        instance: InstanceId,
    },
    /// Connect two audio ports.
    Connect {
        /// Source output port.
        src: PortRef,
        /// Destination input port.
        dst: PortRef,
    },
    /// Disconnect two audio ports.
    Disconnect {
        /// Source output port.
        src: PortRef,
        /// Destination input port.
        dst: PortRef,
    },
    /// Set a control value.
    ParamSet {
        /// Instance that owns the port.
        instance: InstanceId,
        /// The control input port.
        port: PortSymbol,
        /// Value to set, already clamped by the board.
        value: f32,
    },
    /// Bypass or engage an instance.
    Bypass {
        /// The affected instance.
        instance: InstanceId,
        /// New bypass state.
        bypassed: bool,
    },
}

impl HostCommand {
    /// Translate one board intent into its host command.
    pub fn from_intent(intent: GraphIntent) -> Self {
        match intent {
            GraphIntent::AddInstance { id, uri } => Self::Add { instance: id, uri },
            GraphIntent::RemoveInstance { id } => Self::Remove { instance: id },
            GraphIntent::Connect { src, dst } => Self::Connect { src, dst },
            GraphIntent::Disconnect { src, dst } => Self::Disconnect { src, dst },
            GraphIntent::SetParam {
                instance,
                port,
                value,
            } => Self::ParamSet {
                instance,
                port,
                value,
            },
            GraphIntent::SetBypass { instance, bypassed } => Self::Bypass { instance, bypassed },
        }
    }

    /// Short verb for logs.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Reset => "reset",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::ParamSet { .. } => "param_set",
            Self::Bypass { .. } => "bypass",
        }
    }
}
