//! The pedalboard graph: instances, connections, values, snapshots.

mod connection;
mod instance;

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use pedalera_catalog::{
    Catalog, PluginDescriptor, PluginUri, PortDirection, PortKind, PortSymbol,
};

use crate::addressing::{AddressingEntry, AddressingTable, ResolvedUpdate};
use crate::error::{AddressError, GraphError};
use crate::intent::GraphIntent;
use crate::snapshot::{InstanceState, Snapshot};

pub use connection::{Connection, PortRef};
pub use instance::{InstanceId, PluginInstance, Position};

/// Everything that was detached when an instance was removed.
///
/// Surfaced so callers can release hardware controls and update displays
/// without diffing the board before and after.
#[derive(Debug)]
pub struct RemovedInstance {
    /// The removed instance itself.
    pub instance: PluginInstance,
    /// Connections that touched it, in their original order.
    pub connections: Vec<Connection>,
    /// Addressings that drove it, in control order.
    pub addressings: Vec<AddressingEntry>,
}

/// An editable pedalboard.
///
/// The board is the model the whole engine works against: plugin instances
/// with their current control values, the audio edges between them, the
/// hardware-control addressings, and named snapshots of values. Mutations
/// validate against the plugin descriptors up front and append
/// [`GraphIntent`] entries that the host session drains and forwards, so the
/// board never blocks on the audio host and stays usable when the host is
/// gone.
///
/// Instance ids come from a per-board counter and are never reused.
#[derive(Debug, Clone, Default)]
pub struct Pedalboard {
    name: String,
    instances: BTreeMap<InstanceId, PluginInstance>,
    connections: Vec<Connection>,
    addressings: AddressingTable,
    snapshots: Vec<Snapshot>,
    intents: Vec<GraphIntent>,
    next_instance: u32,
}

impl Pedalboard {
    /// Empty board with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The board's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the board.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // --- Instance mutations ---

    /// Place a plugin on the board.
    ///
    /// Resolves `uri` in the catalog, assigns the next instance id, and
    /// initializes every control input to its declared default.
    pub fn add_instance(
        &mut self,
        catalog: &Catalog,
        uri: &PluginUri,
        position: Position,
    ) -> Result<InstanceId, GraphError> {
        let descriptor = catalog
            .resolve(uri)
            .map_err(|_| GraphError::UnknownPlugin(uri.clone()))?;
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        tracing::debug!("board_add: {uri} as instance {id}");
        self.instances
            .insert(id, PluginInstance::new(id, descriptor, position));
        self.intents.push(GraphIntent::AddInstance {
            id,
            uri: uri.clone(),
        });
        Ok(id)
    }

    /// Re-create an instance under a fixed id, without logging an intent.
    ///
    /// This is the rebuild path used when a board is loaded from disk:
    /// stored ids must survive so connections, addressings, and snapshots
    /// keep pointing at the right instances. Bumps the id counter past `id`.
    pub fn restore_instance(
        &mut self,
        id: InstanceId,
        descriptor: Arc<PluginDescriptor>,
        position: Position,
    ) -> Result<(), GraphError> {
        if self.instances.contains_key(&id) {
            return Err(GraphError::DuplicateInstance(id));
        }
        self.next_instance = self.next_instance.max(id.0 + 1);
        self.instances
            .insert(id, PluginInstance::new(id, descriptor, position));
        Ok(())
    }

    /// Remove an instance, cascading everything attached to it.
    ///
    /// Connections touching the instance, addressings driving it, and its
    /// entries in every snapshot are dropped. Only a `RemoveInstance` intent
    /// is logged; the host detaches the instance's edges on its own when it
    /// unloads the plugin.
    pub fn remove_instance(&mut self, id: InstanceId) -> Result<RemovedInstance, GraphError> {
        let instance = self
            .instances
            .remove(&id)
            .ok_or(GraphError::UnknownInstance(id))?;
        let (dropped, kept): (Vec<_>, Vec<_>) = self
            .connections
            .drain(..)
            .partition(|connection| connection.touches(id));
        self.connections = kept;
        let addressings = self.addressings.prune_for_instance(id);
        for snapshot in &mut self.snapshots {
            snapshot.instances.remove(&id);
        }
        tracing::debug!(
            "board_remove: instance {id} ({} connections, {} addressings dropped)",
            dropped.len(),
            addressings.len()
        );
        self.intents.push(GraphIntent::RemoveInstance { id });
        Ok(RemovedInstance {
            instance,
            connections: dropped,
            addressings,
        })
    }

    /// Move an instance on the canvas. Layout only, no intent.
    pub fn set_position(&mut self, id: InstanceId, position: Position) -> Result<(), GraphError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(GraphError::UnknownInstance(id))?;
        instance.set_position(position);
        Ok(())
    }

    // --- Connections ---

    /// Add an audio edge from `src` to `dst`.
    ///
    /// Returns `Ok(false)` without logging anything when the edge already
    /// exists, so repeated connect calls are harmless. Both endpoints must
    /// be audio ports with the right direction, on two different instances.
    pub fn connect(&mut self, src: PortRef, dst: PortRef) -> Result<bool, GraphError> {
        self.require_instance(src.instance)?;
        self.require_instance(dst.instance)?;
        if src.instance == dst.instance {
            return Err(GraphError::SelfLoop(src.instance));
        }
        self.check_endpoint(&src, PortDirection::Output)?;
        self.check_endpoint(&dst, PortDirection::Input)?;
        let connection = Connection::new(src, dst);
        if self.connections.contains(&connection) {
            return Ok(false);
        }
        tracing::debug!("board_connect: {connection}");
        self.intents.push(GraphIntent::connect(&connection));
        self.connections.push(connection);
        Ok(true)
    }

    /// Remove the edge from `src` to `dst`.
    ///
    /// Returns `Ok(false)` when no such edge exists. Unknown instances are
    /// still an error to catch callers holding stale ids.
    pub fn disconnect(&mut self, src: PortRef, dst: PortRef) -> Result<bool, GraphError> {
        self.require_instance(src.instance)?;
        self.require_instance(dst.instance)?;
        let Some(index) = self
            .connections
            .iter()
            .position(|c| c.src == src && c.dst == dst)
        else {
            return Ok(false);
        };
        let connection = self.connections.remove(index);
        tracing::debug!("board_disconnect: {connection}");
        self.intents.push(GraphIntent::Disconnect {
            src: connection.src,
            dst: connection.dst,
        });
        Ok(true)
    }

    /// All edges, in the order they were added.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    // --- Parameters and bypass ---

    /// Set a control input, clamping to the declared range.
    ///
    /// Logs a `SetParam` intent carrying the clamped value and returns it.
    pub fn set_param(
        &mut self,
        id: InstanceId,
        port: impl Into<PortSymbol>,
        value: f32,
    ) -> Result<f32, GraphError> {
        let port = port.into();
        let clamped = self.store_param(id, &port, value)?;
        tracing::debug!("board_param: {id}:{port} = {clamped}");
        self.intents.push(GraphIntent::SetParam {
            instance: id,
            port,
            value: clamped,
        });
        Ok(clamped)
    }

    /// Store a host-reported control value without logging an intent.
    ///
    /// Used for `param_changed` events so the echo never loops back to the
    /// host on the next drain.
    pub fn apply_host_param(
        &mut self,
        id: InstanceId,
        port: impl Into<PortSymbol>,
        value: f32,
    ) -> Result<f32, GraphError> {
        let port = port.into();
        let clamped = self.store_param(id, &port, value)?;
        tracing::debug!("board_param (host): {id}:{port} = {clamped}");
        Ok(clamped)
    }

    /// Bypass or engage an instance. A no-op when the state already matches.
    pub fn set_bypass(&mut self, id: InstanceId, bypassed: bool) -> Result<(), GraphError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(GraphError::UnknownInstance(id))?;
        if instance.bypassed() == bypassed {
            return Ok(());
        }
        instance.set_bypassed(bypassed);
        tracing::debug!("board_bypass: {id} = {bypassed}");
        self.intents
            .push(GraphIntent::SetBypass { instance: id, bypassed });
        Ok(())
    }

    /// Store a host-reported bypass state without logging an intent.
    pub fn apply_host_bypass(&mut self, id: InstanceId, bypassed: bool) -> Result<(), GraphError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(GraphError::UnknownInstance(id))?;
        instance.set_bypassed(bypassed);
        Ok(())
    }

    // --- Addressings ---

    /// Bind a hardware control to a port of an instance on this board.
    ///
    /// Validates the target against the instance's descriptor before the
    /// table's own range and transform checks run.
    pub fn address(&mut self, entry: AddressingEntry) -> Result<(), GraphError> {
        let instance = self.require_instance(entry.instance)?;
        let Some(port) = instance.descriptor().port_by_symbol(&entry.port) else {
            return Err(GraphError::invalid_port(
                entry.instance,
                entry.port,
                "no such port",
            ));
        };
        let port = port.clone();
        self.addressings.address(entry, &port)?;
        Ok(())
    }

    /// Unbind a hardware control. Returns the removed entry, if any.
    pub fn unaddress(&mut self, control: &str) -> Option<AddressingEntry> {
        self.addressings.unaddress(control)
    }

    /// Resolve a hardware control event to a parameter update.
    ///
    /// Read-only; callers decide whether to apply the update with
    /// [`set_param`](Self::set_param).
    pub fn resolve_control(
        &self,
        control: &str,
        travel: f32,
    ) -> Result<ResolvedUpdate, AddressError> {
        self.addressings.resolve(control, travel)
    }

    /// The board's addressing table.
    pub fn addressings(&self) -> &AddressingTable {
        &self.addressings
    }

    // --- Snapshots ---

    /// Capture every instance's values and bypass state under `name`.
    ///
    /// Saving onto an existing name replaces that snapshot.
    pub fn save_snapshot(&mut self, name: impl Into<String>) {
        let name = name.into();
        let instances = self
            .instances
            .iter()
            .map(|(id, instance)| {
                (
                    *id,
                    InstanceState {
                        values: instance.values().clone(),
                        bypassed: instance.bypassed(),
                    },
                )
            })
            .collect();
        tracing::debug!("snapshot_save: '{name}'");
        self.insert_snapshot(Snapshot { name, instances });
    }

    /// Insert a pre-built snapshot, replacing any one with the same name.
    ///
    /// Rebuild path for boards loaded from disk.
    pub fn insert_snapshot(&mut self, snapshot: Snapshot) {
        match self
            .snapshots
            .iter_mut()
            .find(|existing| existing.name == snapshot.name)
        {
            Some(existing) => *existing = snapshot,
            None => self.snapshots.push(snapshot),
        }
    }

    /// Look up a snapshot by name.
    pub fn snapshot(&self, name: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.name == name)
    }

    /// Rename a snapshot. Fails if `to` is already taken.
    pub fn rename_snapshot(&mut self, from: &str, to: impl Into<String>) -> Result<(), GraphError> {
        let to = to.into();
        if self.snapshots.iter().any(|s| s.name == to) {
            return Err(GraphError::SnapshotExists(to));
        }
        let snapshot = self
            .snapshots
            .iter_mut()
            .find(|s| s.name == from)
            .ok_or_else(|| GraphError::UnknownSnapshot(from.to_string()))?;
        snapshot.name = to;
        Ok(())
    }

    /// Delete a snapshot, returning it.
    pub fn remove_snapshot(&mut self, name: &str) -> Result<Snapshot, GraphError> {
        let index = self
            .snapshots
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| GraphError::UnknownSnapshot(name.to_string()))?;
        Ok(self.snapshots.remove(index))
    }

    /// Snapshot names in creation order.
    pub fn snapshot_names(&self) -> Vec<&str> {
        self.snapshots.iter().map(|s| s.name.as_str()).collect()
    }

    /// All snapshots in creation order.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    // --- Intent log and replay ---

    /// Drain the pending change log.
    ///
    /// The session calls this after every batch of edits and forwards the
    /// entries to the host in order.
    pub fn take_intents(&mut self) -> Vec<GraphIntent> {
        mem::take(&mut self.intents)
    }

    /// Enumerate the full board state as intents, for host resynchronization.
    ///
    /// Order matters: instances in creation order first, then connections,
    /// then every control value, then bypass flags for bypassed instances.
    /// Replaying the plan against a freshly connected host reproduces the
    /// board exactly.
    pub fn replay_plan(&self) -> Vec<GraphIntent> {
        let mut plan = Vec::new();
        for instance in self.instances.values() {
            plan.push(GraphIntent::AddInstance {
                id: instance.id(),
                uri: instance.uri().clone(),
            });
        }
        for connection in &self.connections {
            plan.push(GraphIntent::connect(connection));
        }
        for instance in self.instances.values() {
            for (port, value) in instance.values() {
                plan.push(GraphIntent::SetParam {
                    instance: instance.id(),
                    port: port.clone(),
                    value: *value,
                });
            }
        }
        for instance in self.instances.values() {
            if instance.bypassed() {
                plan.push(GraphIntent::SetBypass {
                    instance: instance.id(),
                    bypassed: true,
                });
            }
        }
        plan
    }

    // --- Accessors ---

    /// Look up an instance by id.
    pub fn instance(&self, id: InstanceId) -> Option<&PluginInstance> {
        self.instances.get(&id)
    }

    /// All instances in creation order.
    pub fn instances(&self) -> impl Iterator<Item = &PluginInstance> {
        self.instances.values()
    }

    /// Number of instances on the board.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Whether the board holds no instances.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    // --- Internal helpers ---

    fn require_instance(&self, id: InstanceId) -> Result<&PluginInstance, GraphError> {
        self.instances.get(&id).ok_or(GraphError::UnknownInstance(id))
    }

    fn check_endpoint(&self, at: &PortRef, direction: PortDirection) -> Result<(), GraphError> {
        let instance = self.require_instance(at.instance)?;
        let Some(port) = instance.descriptor().port_by_symbol(&at.port) else {
            return Err(GraphError::invalid_port(
                at.instance,
                at.port.clone(),
                "no such port",
            ));
        };
        if port.kind != PortKind::Audio {
            return Err(GraphError::invalid_port(
                at.instance,
                at.port.clone(),
                "not an audio port",
            ));
        }
        if port.direction != direction {
            let reason = match direction {
                PortDirection::Output => "not an output",
                PortDirection::Input => "not an input",
            };
            return Err(GraphError::invalid_port(at.instance, at.port.clone(), reason));
        }
        Ok(())
    }

    fn store_param(
        &mut self,
        id: InstanceId,
        port: &PortSymbol,
        value: f32,
    ) -> Result<f32, GraphError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(GraphError::UnknownInstance(id))?;
        let range = {
            let Some(descriptor_port) = instance.descriptor().port_by_symbol(port) else {
                return Err(GraphError::invalid_port(id, port.clone(), "no such port"));
            };
            if !descriptor_port.is_control_input() {
                return Err(GraphError::invalid_port(
                    id,
                    port.clone(),
                    "not a control input",
                ));
            }
            match descriptor_port.range {
                Some(range) => range,
                None => {
                    return Err(GraphError::invalid_port(
                        id,
                        port.clone(),
                        "port declares no range",
                    ));
                }
            }
        };
        let clamped = range.clamp(value);
        instance.set_value(port.clone(), clamped);
        Ok(clamped)
    }
}
