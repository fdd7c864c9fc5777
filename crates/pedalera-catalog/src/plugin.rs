//! Plugin descriptors and categories.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::port::{PortDescriptor, PortDirection, PortKind, PortSymbol};

/// Stable plugin identifier.
///
/// URI-shaped in practice (`"urn:pedalera:overdrive"`,
/// `"http://example.org/plugins/fuzz"`) but treated as an opaque key. The
/// same URI always names the same plugin across boards and host sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginUri(String);

impl PluginUri {
    /// Create a URI from anything string-like.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginUri {
    fn from(uri: &str) -> Self {
        Self(uri.to_string())
    }
}

impl From<String> for PluginUri {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

/// Category of plugin for browsing and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginCategory {
    /// Delays and echoes
    Delay,
    /// Distortion, overdrive, fuzz
    Distortion,
    /// Compressors, limiters, gates
    Dynamics,
    /// Filters, wahs, equalizers
    Filter,
    /// Chorus, flanger, phaser, tremolo
    Modulation,
    /// Reverbs
    Reverb,
    /// Amp and cabinet simulators
    Simulator,
    /// Panners and other stereo-field tools
    Spatial,
    /// Gain stages, switches, meters
    Utility,
}

impl PluginCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            PluginCategory::Delay => "Delay",
            PluginCategory::Distortion => "Distortion",
            PluginCategory::Dynamics => "Dynamics",
            PluginCategory::Filter => "Filter",
            PluginCategory::Modulation => "Modulation",
            PluginCategory::Reverb => "Reverb",
            PluginCategory::Simulator => "Simulator",
            PluginCategory::Spatial => "Spatial",
            PluginCategory::Utility => "Utility",
        }
    }
}

/// Describes a plugin the host can instantiate.
///
/// A descriptor is pure metadata: identity, category, and the full port
/// list in declaration order. It never changes after catalog load, which is
/// what lets instances hold shared references to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Stable identifier the host instantiates by.
    pub uri: PluginUri,

    /// Human-readable name.
    pub name: String,

    /// Category for browsing.
    pub category: PluginCategory,

    /// All ports, in declaration order.
    #[serde(default)]
    pub ports: Vec<PortDescriptor>,
}

impl PluginDescriptor {
    /// Create a descriptor with no ports.
    pub fn new(
        uri: impl Into<PluginUri>,
        name: impl Into<String>,
        category: PluginCategory,
    ) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            category,
            ports: Vec::new(),
        }
    }

    /// Adds a port.
    ///
    /// Builder pattern — call after [`new`](Self::new).
    pub fn with_port(mut self, port: PortDescriptor) -> Self {
        self.ports.push(port);
        self
    }

    /// Looks up a port by symbol.
    pub fn port(&self, symbol: &str) -> Option<&PortDescriptor> {
        self.ports.iter().find(|p| p.symbol.as_str() == symbol)
    }

    /// Control input ports, in declaration order.
    pub fn control_inputs(&self) -> impl Iterator<Item = &PortDescriptor> {
        self.ports.iter().filter(|p| p.is_control_input())
    }

    /// Audio input ports, in declaration order.
    pub fn audio_inputs(&self) -> impl Iterator<Item = &PortDescriptor> {
        self.ports
            .iter()
            .filter(|p| p.kind == PortKind::Audio && p.direction == PortDirection::Input)
    }

    /// Audio output ports, in declaration order.
    pub fn audio_outputs(&self) -> impl Iterator<Item = &PortDescriptor> {
        self.ports
            .iter()
            .filter(|p| p.kind == PortKind::Audio && p.direction == PortDirection::Output)
    }

    /// Checks internal consistency; returns the first problem found.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.uri.as_str().is_empty() {
            return Err("plugin uri is empty".to_string());
        }
        for (i, port) in self.ports.iter().enumerate() {
            port.validate()?;
            let duplicate = self.ports[..i]
                .iter()
                .any(|other| other.symbol == port.symbol);
            if duplicate {
                return Err(format!("duplicate port symbol '{}'", port.symbol));
            }
        }
        Ok(())
    }

    /// Convenience for tests and callers holding a [`PortSymbol`].
    pub fn port_by_symbol(&self, symbol: &PortSymbol) -> Option<&PortDescriptor> {
        self.port(symbol.as_str())
    }
}
