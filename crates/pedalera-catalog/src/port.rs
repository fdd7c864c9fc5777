//! Port descriptors for plugin inputs and outputs.
//!
//! Every port the control plane can see is described here: audio and control
//! ports, their declared ranges, display units, behaviour flags, and the
//! labeled scale points of enumerated controls. Descriptors are loaded once
//! into a [`Catalog`](crate::Catalog) and never mutated afterwards, so the
//! rest of the engine can validate against them without locking.
//!
//! # Example
//!
//! ```rust
//! use pedalera_catalog::{PortDescriptor, PortFlags, PortUnit};
//!
//! let level = PortDescriptor::control_in("level", "Level", -60.0, 12.0, 0.0)
//!     .with_unit(PortUnit::Decibels);
//!
//! assert!(level.is_addressable());
//! assert_eq!(level.range.unwrap().clamp(40.0), 12.0);
//!
//! let trim = PortDescriptor::control_in("trim", "Trim", -6.0, 6.0, 0.0)
//!     .with_flags(PortFlags::NOT_ON_SURFACE);
//! assert!(!trim.is_addressable());
//! ```

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Port identifier, unique within a single plugin.
///
/// Symbols are short machine names (`"gain"`, `"in_l"`), distinct from the
/// human-readable port name shown on displays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortSymbol(String);

impl PortSymbol {
    /// Create a symbol from anything string-like.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// The symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortSymbol {
    fn from(symbol: &str) -> Self {
        Self(symbol.to_string())
    }
}

impl From<String> for PortSymbol {
    fn from(symbol: String) -> Self {
        Self(symbol)
    }
}

impl Borrow<str> for PortSymbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Direction of a port from the plugin's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// The plugin reads from this port.
    Input,
    /// The plugin writes to this port.
    Output,
}

/// What flows through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Sample stream. Only audio ports participate in graph connections.
    Audio,
    /// Single scalar value, set by `param_set` commands rather than edges.
    Control,
    /// Event/message port (MIDI and the like). Carried for completeness;
    /// not connectable and not addressable.
    Atom,
}

/// Declared value range of a control port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlRange {
    /// Minimum allowed value.
    pub min: f32,
    /// Maximum allowed value.
    pub max: f32,
    /// Value a fresh instance starts at.
    pub default: f32,
}

impl ControlRange {
    /// Create a range. `min`/`max` ordering is checked at catalog load, not here.
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Clamps a value to this range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Returns `true` when `value` lies within the range (inclusive).
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Behaviour flags a plugin declares on a control port.
///
/// Bitflag type in the same shape descriptor files use: a list of flag
/// names (`["logarithmic", "integer"]`). Use [`union`](Self::union) to
/// combine.
///
/// # Example
///
/// ```rust
/// use pedalera_catalog::PortFlags;
///
/// let flags = PortFlags::LOGARITHMIC.union(PortFlags::INTEGER);
/// assert!(flags.contains(PortFlags::LOGARITHMIC));
/// assert!(!flags.contains(PortFlags::TOGGLED));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PortFlags(u8);

impl PortFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Values are perceived on a ratio scale; controls map logarithmically.
    pub const LOGARITHMIC: Self = Self(1 << 0);
    /// Port only takes one of its scale-point values.
    pub const ENUMERATED: Self = Self(1 << 1);
    /// Values are whole numbers.
    pub const INTEGER: Self = Self(1 << 2);
    /// Two-state switch; 0.0 is off, anything else is on.
    pub const TOGGLED: Self = Self(1 << 3);
    /// Hidden from hardware control surfaces; never addressable.
    pub const NOT_ON_SURFACE: Self = Self(1 << 4);

    /// Flag bits with the names descriptor files spell them as.
    const NAMED: [(Self, &'static str); 5] = [
        (Self::LOGARITHMIC, "logarithmic"),
        (Self::ENUMERATED, "enumerated"),
        (Self::INTEGER, "integer"),
        (Self::TOGGLED, "toggled"),
        (Self::NOT_ON_SURFACE, "not_on_surface"),
    ];

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` when no flags are set.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for PortFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<PortFlags> for Vec<String> {
    fn from(flags: PortFlags) -> Self {
        PortFlags::NAMED
            .iter()
            .filter(|(bit, _)| flags.contains(*bit))
            .map(|(_, name)| (*name).to_string())
            .collect()
    }
}

impl TryFrom<Vec<String>> for PortFlags {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut flags = Self::NONE;
        for name in &names {
            match Self::NAMED.iter().find(|(_, n)| *n == name.as_str()) {
                Some((bit, _)) => flags = flags.union(*bit),
                None => return Err(format!("unknown port flag '{name}'")),
            }
        }
        Ok(flags)
    }
}

/// A labeled discrete value on an enumerated control port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalePoint {
    /// Label shown on displays (e.g. `"Tape"`, `"Digital"`).
    pub label: String,
    /// The port value this point selects.
    pub value: f32,
}

impl ScalePoint {
    /// Create a scale point.
    pub fn new(label: impl Into<String>, value: f32) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Unit type for formatting a control port's value on displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortUnit {
    /// Decibels (dB) - gain, threshold, and level ports.
    Decibels,
    /// Hertz (Hz) - frequency ports like filter cutoff or LFO rate.
    Hertz,
    /// Milliseconds (ms) - delay times, attack, release.
    Milliseconds,
    /// Percentage (%) - mix, depth, feedback.
    Percent,
    /// Semitones (st) - pitch shift amounts.
    Semitones,
    /// No unit.
    #[default]
    None,
}

impl PortUnit {
    /// Returns the unit suffix string for display.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pedalera_catalog::PortUnit;
    ///
    /// assert_eq!(PortUnit::Decibels.suffix(), " dB");
    /// assert_eq!(PortUnit::None.suffix(), "");
    /// ```
    pub const fn suffix(&self) -> &'static str {
        match self {
            PortUnit::Decibels => " dB",
            PortUnit::Hertz => " Hz",
            PortUnit::Milliseconds => " ms",
            PortUnit::Percent => "%",
            PortUnit::Semitones => " st",
            PortUnit::None => "",
        }
    }

    /// Returns `true` for the unitless case.
    pub const fn is_none(&self) -> bool {
        matches!(self, PortUnit::None)
    }
}

/// Describes a single plugin port.
///
/// Audio and atom ports carry only identity, direction, and kind. Control
/// ports additionally declare the range the engine clamps against, plus
/// display unit, behaviour flags, and scale points where relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Machine symbol, unique within the plugin.
    pub symbol: PortSymbol,

    /// Human-readable name for displays.
    pub name: String,

    /// Input or output.
    pub direction: PortDirection,

    /// Audio, control, or atom.
    pub kind: PortKind,

    /// Declared value range. Present on every control port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ControlRange>,

    /// Display unit.
    #[serde(default, skip_serializing_if = "PortUnit::is_none")]
    pub unit: PortUnit,

    /// Behaviour flags.
    #[serde(default, skip_serializing_if = "PortFlags::is_empty")]
    pub flags: PortFlags,

    /// Labeled values for enumerated ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scale_points: Vec<ScalePoint>,
}

impl PortDescriptor {
    /// Audio input port.
    pub fn audio_in(symbol: impl Into<PortSymbol>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            direction: PortDirection::Input,
            kind: PortKind::Audio,
            range: None,
            unit: PortUnit::None,
            flags: PortFlags::NONE,
            scale_points: Vec::new(),
        }
    }

    /// Audio output port.
    pub fn audio_out(symbol: impl Into<PortSymbol>, name: impl Into<String>) -> Self {
        Self {
            direction: PortDirection::Output,
            ..Self::audio_in(symbol, name)
        }
    }

    /// Control input port with its declared range.
    pub fn control_in(
        symbol: impl Into<PortSymbol>,
        name: impl Into<String>,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            direction: PortDirection::Input,
            kind: PortKind::Control,
            range: Some(ControlRange::new(min, max, default)),
            unit: PortUnit::None,
            flags: PortFlags::NONE,
            scale_points: Vec::new(),
        }
    }

    /// Control output port (meters and other read-only values).
    pub fn control_out(
        symbol: impl Into<PortSymbol>,
        name: impl Into<String>,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            direction: PortDirection::Output,
            ..Self::control_in(symbol, name, min, max, default)
        }
    }

    /// Sets the display unit.
    ///
    /// Builder pattern — call after a constructor.
    pub fn with_unit(mut self, unit: PortUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Sets behaviour flags.
    ///
    /// Builder pattern — call after a constructor.
    pub fn with_flags(mut self, flags: PortFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets scale points and marks the port enumerated.
    ///
    /// Builder pattern — call after a constructor.
    pub fn with_scale_points(mut self, points: Vec<ScalePoint>) -> Self {
        self.flags = self.flags.union(PortFlags::ENUMERATED);
        self.scale_points = points;
        self
    }

    /// Returns `true` for control-kind input ports.
    pub fn is_control_input(&self) -> bool {
        self.kind == PortKind::Control && self.direction == PortDirection::Input
    }

    /// Returns `true` when a hardware control may be bound to this port.
    ///
    /// Only control inputs not hidden from surfaces qualify. Audio ports,
    /// atom ports, and outputs are never addressable.
    pub fn is_addressable(&self) -> bool {
        self.is_control_input() && !self.flags.contains(PortFlags::NOT_ON_SURFACE)
    }

    /// Checks internal consistency; returns the first problem found.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.symbol.as_str().is_empty() {
            return Err("port symbol is empty".to_string());
        }
        match self.kind {
            PortKind::Control => {
                let Some(range) = self.range else {
                    return Err(format!("control port '{}' has no range", self.symbol));
                };
                if range.min > range.max {
                    return Err(format!(
                        "control port '{}' has min {} > max {}",
                        self.symbol, range.min, range.max
                    ));
                }
                if !range.contains(range.default) {
                    return Err(format!(
                        "control port '{}' default {} outside [{}, {}]",
                        self.symbol, range.default, range.min, range.max
                    ));
                }
                if self.flags.contains(PortFlags::ENUMERATED) {
                    if self.scale_points.len() < 2 {
                        return Err(format!(
                            "enumerated port '{}' needs at least two scale points",
                            self.symbol
                        ));
                    }
                    for point in &self.scale_points {
                        if !range.contains(point.value) {
                            return Err(format!(
                                "scale point '{}' on port '{}' outside [{}, {}]",
                                point.label, self.symbol, range.min, range.max
                            ));
                        }
                    }
                }
            }
            PortKind::Audio | PortKind::Atom => {
                if self.range.is_some() {
                    return Err(format!(
                        "non-control port '{}' declares a range",
                        self.symbol
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_clamp() {
        let range = ControlRange::new(-60.0, 12.0, 0.0);
        assert_eq!(range.clamp(0.0), 0.0);
        assert_eq!(range.clamp(-100.0), -60.0);
        assert_eq!(range.clamp(100.0), 12.0);
        assert_eq!(range.clamp(-60.0), -60.0);
        assert_eq!(range.clamp(12.0), 12.0);
    }

    #[test]
    fn test_range_contains() {
        let range = ControlRange::new(0.0, 10.0, 5.0);
        assert!(range.contains(0.0));
        assert!(range.contains(10.0));
        assert!(range.contains(5.0));
        assert!(!range.contains(-0.1));
        assert!(!range.contains(10.1));
    }

    #[test]
    fn test_port_flags() {
        assert!(PortFlags::LOGARITHMIC.contains(PortFlags::LOGARITHMIC));
        assert!(!PortFlags::LOGARITHMIC.contains(PortFlags::TOGGLED));
        assert!(!PortFlags::NONE.contains(PortFlags::INTEGER));

        let combined = PortFlags::INTEGER.union(PortFlags::ENUMERATED);
        assert!(combined.contains(PortFlags::INTEGER));
        assert!(combined.contains(PortFlags::ENUMERATED));
        assert!(!combined.contains(PortFlags::NOT_ON_SURFACE));
    }

    #[test]
    fn test_port_flags_serde() {
        let flags = PortFlags::LOGARITHMIC.union(PortFlags::NOT_ON_SURFACE);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"["logarithmic","not_on_surface"]"#);

        let parsed: PortFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, flags);

        let empty: PortFlags = serde_json::from_str("[]").unwrap();
        assert_eq!(empty, PortFlags::NONE);
    }

    #[test]
    fn test_port_flags_unknown_name_rejected() {
        let result: Result<PortFlags, _> = serde_json::from_str(r#"["sidechain"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_audio_builders() {
        let input = PortDescriptor::audio_in("in_l", "In L");
        assert_eq!(input.symbol.as_str(), "in_l");
        assert_eq!(input.direction, PortDirection::Input);
        assert_eq!(input.kind, PortKind::Audio);
        assert!(input.range.is_none());

        let output = PortDescriptor::audio_out("out_l", "Out L");
        assert_eq!(output.direction, PortDirection::Output);
    }

    #[test]
    fn test_control_builder() {
        let port = PortDescriptor::control_in("gain", "Gain", -60.0, 12.0, 0.0)
            .with_unit(PortUnit::Decibels);
        assert!(port.is_control_input());
        assert!(port.is_addressable());
        assert_eq!(port.unit, PortUnit::Decibels);
        assert_eq!(port.range.unwrap().default, 0.0);
    }

    #[test]
    fn test_addressable() {
        assert!(!PortDescriptor::audio_in("in", "In").is_addressable());
        assert!(!PortDescriptor::control_out("level", "Level", 0.0, 1.0, 0.0).is_addressable());

        let hidden = PortDescriptor::control_in("trim", "Trim", 0.0, 1.0, 0.5)
            .with_flags(PortFlags::NOT_ON_SURFACE);
        assert!(!hidden.is_addressable());
    }

    #[test]
    fn test_scale_points_imply_enumerated() {
        let port = PortDescriptor::control_in("model", "Model", 0.0, 1.0, 0.0).with_scale_points(
            vec![ScalePoint::new("Tape", 0.0), ScalePoint::new("Digital", 1.0)],
        );
        assert!(port.flags.contains(PortFlags::ENUMERATED));
        assert_eq!(port.scale_points.len(), 2);
    }

    #[test]
    fn test_validate_control_without_range() {
        let mut port = PortDescriptor::control_in("x", "X", 0.0, 1.0, 0.0);
        port.range = None;
        assert!(port.validate().is_err());
    }

    #[test]
    fn test_validate_inverted_range() {
        let port = PortDescriptor::control_in("x", "X", 1.0, 0.0, 0.5);
        assert!(port.validate().is_err());
    }

    #[test]
    fn test_validate_default_outside_range() {
        let port = PortDescriptor::control_in("x", "X", 0.0, 1.0, 2.0);
        assert!(port.validate().is_err());
    }

    #[test]
    fn test_validate_enumerated_needs_points() {
        let port = PortDescriptor::control_in("x", "X", 0.0, 1.0, 0.0)
            .with_flags(PortFlags::ENUMERATED);
        assert!(port.validate().is_err());

        let one_point = PortDescriptor::control_in("x", "X", 0.0, 1.0, 0.0)
            .with_scale_points(vec![ScalePoint::new("Only", 0.0)]);
        assert!(one_point.validate().is_err());
    }

    #[test]
    fn test_validate_scale_point_outside_range() {
        let port = PortDescriptor::control_in("x", "X", 0.0, 1.0, 0.0).with_scale_points(vec![
            ScalePoint::new("Ok", 0.0),
            ScalePoint::new("Bad", 5.0),
        ]);
        assert!(port.validate().is_err());
    }

    #[test]
    fn test_validate_audio_with_range() {
        let mut port = PortDescriptor::audio_in("in", "In");
        port.range = Some(ControlRange::new(0.0, 1.0, 0.0));
        assert!(port.validate().is_err());
    }

    #[test]
    fn test_descriptor_serde_roundtrip() {
        let port = PortDescriptor::control_in("rate", "Rate", 0.05, 5.0, 0.5)
            .with_unit(PortUnit::Hertz)
            .with_flags(PortFlags::LOGARITHMIC);
        let json = serde_json::to_string(&port).unwrap();
        let parsed: PortDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, port);
    }

    #[test]
    fn test_unit_suffix() {
        assert_eq!(PortUnit::Decibels.suffix(), " dB");
        assert_eq!(PortUnit::Hertz.suffix(), " Hz");
        assert_eq!(PortUnit::Milliseconds.suffix(), " ms");
        assert_eq!(PortUnit::Percent.suffix(), "%");
        assert_eq!(PortUnit::Semitones.suffix(), " st");
        assert_eq!(PortUnit::None.suffix(), "");
    }
}
