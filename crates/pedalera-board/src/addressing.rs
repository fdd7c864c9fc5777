//! Binding hardware controls to plugin ports.
//!
//! An *addressing* ties one physical control (a knob, an expression pedal, a
//! footswitch) to one control input port of one instance. The table owns all
//! addressings of a board and resolves incoming hardware events to parameter
//! updates. It never talks to the graph itself; the board applies resolved
//! updates and the session forwards them to the host.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use pedalera_catalog::{PortDescriptor, PortKind, PortSymbol};
use serde::{Deserialize, Serialize};

use crate::board::InstanceId;
use crate::error::AddressError;
use crate::transform::Transform;

/// Identifier of a physical control on an attached surface.
///
/// The engine treats these as opaque names (`"knob:1"`, `"exp:0"`,
/// `"foot:2"`); whatever the surface firmware calls a control works here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(String);

impl ControlId {
    /// Create a control id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControlId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ControlId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ControlId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One control bound to one port of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressingEntry {
    /// The physical control.
    pub control: ControlId,
    /// Instance whose port the control drives.
    pub instance: InstanceId,
    /// The driven port.
    pub port: PortSymbol,
    /// Lower bound of the addressed range.
    pub min: f32,
    /// Upper bound of the addressed range.
    pub max: f32,
    /// How travel maps onto the range.
    pub transform: Transform,
    /// Label shown next to the control on the surface.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

impl AddressingEntry {
    /// Entry with a linear transform and no label.
    pub fn new(
        control: impl Into<ControlId>,
        instance: InstanceId,
        port: impl Into<PortSymbol>,
        min: f32,
        max: f32,
    ) -> Self {
        Self {
            control: control.into(),
            instance,
            port: port.into(),
            min,
            max,
            transform: Transform::Linear,
            label: String::new(),
        }
    }

    /// Replace the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Attach a surface label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// A parameter update resolved from a hardware control event.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUpdate {
    /// Instance to update.
    pub instance: InstanceId,
    /// Port to update.
    pub port: PortSymbol,
    /// Value after applying the addressing's transform and range.
    pub value: f32,
}

/// All addressings of one board, keyed by control.
///
/// A control drives at most one port. Binding an already-bound control fails
/// with [`AddressError::ControlAlreadyBound`]; callers unbind explicitly
/// first. Several controls may drive the same port, which mirrors what the
/// hardware allows.
#[derive(Debug, Clone, Default)]
pub struct AddressingTable {
    entries: BTreeMap<ControlId, AddressingEntry>,
}

impl AddressingTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a control, validating the entry against the port's descriptor.
    ///
    /// The caller resolves `port` from the instance's plugin; it must be the
    /// descriptor of `entry.port`.
    pub fn address(
        &mut self,
        entry: AddressingEntry,
        port: &PortDescriptor,
    ) -> Result<(), AddressError> {
        if let Some(reason) = not_addressable_reason(port) {
            return Err(AddressError::port_not_addressable(entry.port, reason));
        }
        let declared = match port.range {
            Some(range) => range,
            None => {
                return Err(AddressError::port_not_addressable(
                    entry.port,
                    "port declares no range",
                ));
            }
        };
        if entry.min > entry.max {
            return Err(AddressError::range_out_of_bounds(
                entry.control,
                entry.min,
                entry.max,
                "min exceeds max",
            ));
        }
        if entry.min < declared.min || entry.max > declared.max {
            return Err(AddressError::range_out_of_bounds(
                entry.control,
                entry.min,
                entry.max,
                format!(
                    "outside the port's declared range [{}, {}]",
                    declared.min, declared.max
                ),
            ));
        }
        match &entry.transform {
            Transform::Logarithmic if entry.min <= 0.0 => {
                return Err(AddressError::range_out_of_bounds(
                    entry.control,
                    entry.min,
                    entry.max,
                    "logarithmic range must be strictly positive",
                ));
            }
            Transform::Enumerated { points } if points.len() < 2 => {
                return Err(AddressError::range_out_of_bounds(
                    entry.control,
                    entry.min,
                    entry.max,
                    "enumerated transform needs at least two points",
                ));
            }
            _ => {}
        }
        if self.entries.contains_key(&entry.control) {
            return Err(AddressError::ControlAlreadyBound(entry.control));
        }
        tracing::debug!(
            "address: {} -> {}:{} over [{}, {}]",
            entry.control,
            entry.instance,
            entry.port,
            entry.min,
            entry.max
        );
        self.entries.insert(entry.control.clone(), entry);
        Ok(())
    }

    /// Unbind a control. Returns the removed entry, if any.
    pub fn unaddress(&mut self, control: &str) -> Option<AddressingEntry> {
        let removed = self.entries.remove(control);
        if let Some(entry) = &removed {
            tracing::debug!("unaddress: {} (was {}:{})", control, entry.instance, entry.port);
        }
        removed
    }

    /// Resolve a hardware event to a parameter update.
    ///
    /// `travel` is the control's normalized position; values outside
    /// `[0.0, 1.0]` are clamped before the transform runs.
    pub fn resolve(&self, control: &str, travel: f32) -> Result<ResolvedUpdate, AddressError> {
        let entry = self
            .entries
            .get(control)
            .ok_or_else(|| AddressError::Unaddressed(ControlId::new(control)))?;
        let value = entry.transform.apply(entry.min, entry.max, travel);
        Ok(ResolvedUpdate {
            instance: entry.instance,
            port: entry.port.clone(),
            value,
        })
    }

    /// Look up a binding by control.
    pub fn get(&self, control: &str) -> Option<&AddressingEntry> {
        self.entries.get(control)
    }

    /// Drop every addressing pointing at `instance`, returning the removed
    /// entries in control order.
    pub fn prune_for_instance(&mut self, instance: InstanceId) -> Vec<AddressingEntry> {
        let doomed: Vec<ControlId> = self
            .entries
            .values()
            .filter(|entry| entry.instance == instance)
            .map(|entry| entry.control.clone())
            .collect();
        doomed
            .into_iter()
            .filter_map(|control| self.entries.remove(&control))
            .collect()
    }

    /// Addressings pointing at `instance`, in control order.
    pub fn entries_for_instance(
        &self,
        instance: InstanceId,
    ) -> impl Iterator<Item = &AddressingEntry> {
        self.entries
            .values()
            .filter(move |entry| entry.instance == instance)
    }

    /// All addressings in control order.
    pub fn iter(&self) -> impl Iterator<Item = &AddressingEntry> {
        self.entries.values()
    }

    /// Number of bound controls.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no control is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why a port refuses addressings, or `None` if it accepts them.
fn not_addressable_reason(port: &PortDescriptor) -> Option<&'static str> {
    use pedalera_catalog::PortDirection;

    match (port.kind, port.direction) {
        (PortKind::Audio, _) => Some("audio ports carry signal, not values"),
        (PortKind::Atom, _) => Some("atom ports are not addressable"),
        (PortKind::Control, PortDirection::Output) => Some("port is an output"),
        (PortKind::Control, PortDirection::Input) => {
            if !port.is_addressable() {
                Some("port is hidden from control surfaces")
            } else {
                None
            }
        }
    }
}
