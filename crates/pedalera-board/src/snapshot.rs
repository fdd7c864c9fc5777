//! Named captures of a board's control values.

use std::collections::BTreeMap;

use pedalera_catalog::PortSymbol;

use crate::board::InstanceId;

/// Captured control values and bypass state for one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceState {
    /// Control values keyed by port symbol.
    pub values: BTreeMap<PortSymbol, f32>,
    /// Whether the instance was bypassed when captured.
    pub bypassed: bool,
}

/// A named capture of every instance's control values and bypass flags.
///
/// Snapshots capture values only. Topology (instances, connections,
/// addressings) belongs to the board and does not vary between snapshots;
/// recalling one re-applies the captured values to whatever instances still
/// exist and skips the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Name, unique within the board.
    pub name: String,
    /// Captured state keyed by instance id.
    pub instances: BTreeMap<InstanceId, InstanceState>,
}

impl Snapshot {
    /// Empty snapshot with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: BTreeMap::new(),
        }
    }

    /// Captured state for one instance, if present.
    pub fn instance(&self, id: InstanceId) -> Option<&InstanceState> {
        self.instances.get(&id)
    }
}
