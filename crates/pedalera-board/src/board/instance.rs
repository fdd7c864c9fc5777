//! Plugin instances placed on a board.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use pedalera_catalog::{PluginDescriptor, PluginUri, PortSymbol};
use serde::{Deserialize, Serialize};

/// Unique identifier for an instance on one board.
///
/// Ids are assigned sequentially and never reused within a board, so a stale
/// id held for a removed instance can never alias a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u32);

impl InstanceId {
    /// The raw numeric id.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an instance sits on the board canvas. Layout only; the audio host
/// never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Position {
    /// Position at the given coordinates.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One plugin placed on the board.
///
/// Holds the current value of every control input, initialized to the
/// declared defaults when the instance is created. The descriptor is shared
/// with the catalog; instances never mutate it.
#[derive(Debug, Clone)]
pub struct PluginInstance {
    id: InstanceId,
    descriptor: Arc<PluginDescriptor>,
    values: BTreeMap<PortSymbol, f32>,
    bypassed: bool,
    position: Position,
}

impl PluginInstance {
    pub(crate) fn new(id: InstanceId, descriptor: Arc<PluginDescriptor>, position: Position) -> Self {
        let values = descriptor
            .control_inputs()
            .filter_map(|port| port.range.map(|range| (port.symbol.clone(), range.default)))
            .collect();
        Self {
            id,
            descriptor,
            values,
            bypassed: false,
            position,
        }
    }

    /// The instance's id on its board.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// URI of the loaded plugin.
    pub fn uri(&self) -> &PluginUri {
        &self.descriptor.uri
    }

    /// The plugin's descriptor.
    pub fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    /// Current value of a control input, if the port exists.
    pub fn value(&self, port: &str) -> Option<f32> {
        self.values.get(port).copied()
    }

    /// All current control values, keyed by port symbol.
    pub fn values(&self) -> &BTreeMap<PortSymbol, f32> {
        &self.values
    }

    /// Whether the instance is bypassed.
    pub fn bypassed(&self) -> bool {
        self.bypassed
    }

    /// Canvas position.
    pub fn position(&self) -> Position {
        self.position
    }

    pub(crate) fn set_value(&mut self, port: PortSymbol, value: f32) {
        self.values.insert(port, value);
    }

    pub(crate) fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}
