//! The plugin catalog: every descriptor the engine may instantiate.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::CatalogError;
use crate::plugin::{PluginCategory, PluginDescriptor, PluginUri};
use crate::port::{PortDescriptor, PortFlags, PortUnit, ScalePoint};

/// Immutable set of plugin descriptors keyed by URI.
///
/// Built once at startup, from a descriptor directory or the built-in
/// [`demo`](Self::demo) set, then shared read-only across the engine,
/// typically behind an [`Arc`]. Iteration order is stable (sorted by URI).
///
/// # Example
///
/// ```rust
/// use pedalera_catalog::{Catalog, PluginUri};
///
/// let catalog = Catalog::demo();
/// let uri = PluginUri::new("urn:pedalera:overdrive");
/// let plugin = catalog.resolve(&uri).unwrap();
/// assert_eq!(plugin.name, "Overdrive");
/// ```
#[derive(Debug)]
pub struct Catalog {
    plugins: BTreeMap<PluginUri, Arc<PluginDescriptor>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    /// Load every `*.json` descriptor in a directory.
    ///
    /// One JSON document per plugin. Files with other extensions are
    /// skipped. Any unreadable, malformed, inconsistent, or duplicate
    /// descriptor fails the whole load with a per-file error.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let mut catalog = Self::new();

        let entries = fs::read_dir(dir).map_err(|e| CatalogError::read_file(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::read_file(dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text =
                fs::read_to_string(&path).map_err(|e| CatalogError::read_file(&path, e))?;
            let descriptor: PluginDescriptor =
                serde_json::from_str(&text).map_err(|e| CatalogError::malformed(&path, e))?;
            catalog.insert(descriptor)?;
        }
        Ok(catalog)
    }

    /// Insert a descriptor, validating it first.
    pub fn insert(&mut self, descriptor: PluginDescriptor) -> Result<(), CatalogError> {
        descriptor
            .validate()
            .map_err(|reason| CatalogError::Descriptor {
                uri: descriptor.uri.clone(),
                reason,
            })?;
        if self.plugins.contains_key(&descriptor.uri) {
            return Err(CatalogError::DuplicateUri(descriptor.uri));
        }
        self.register(descriptor);
        Ok(())
    }

    /// Insert without validation. Used for the built-in set, which tests
    /// verify separately.
    fn register(&mut self, descriptor: PluginDescriptor) {
        self.plugins
            .insert(descriptor.uri.clone(), Arc::new(descriptor));
    }

    /// Get a descriptor by URI.
    pub fn get(&self, uri: &PluginUri) -> Option<&Arc<PluginDescriptor>> {
        self.plugins.get(uri)
    }

    /// Get a shared handle to a descriptor, or fail with `UnknownPlugin`.
    pub fn resolve(&self, uri: &PluginUri) -> Result<Arc<PluginDescriptor>, CatalogError> {
        self.plugins
            .get(uri)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownPlugin(uri.clone()))
    }

    /// Returns `true` if the catalog holds this URI.
    pub fn contains(&self, uri: &PluginUri) -> bool {
        self.plugins.contains_key(uri)
    }

    /// Iterate all descriptors, sorted by URI.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PluginDescriptor>> {
        self.plugins.values()
    }

    /// Descriptors in a specific category, sorted by URI.
    pub fn in_category(&self, category: PluginCategory) -> Vec<&Arc<PluginDescriptor>> {
        self.plugins
            .values()
            .filter(|p| p.category == category)
            .collect()
    }

    /// Returns the number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns `true` if no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Built-in descriptor set for tests, examples, and empty-host bring-up.
    ///
    /// Five classic pedals covering every port shape the engine handles:
    /// mono and stereo audio, linear and logarithmic controls, enumerated
    /// voicings, toggles, meters, and a surface-hidden trim.
    pub fn demo() -> Self {
        let mut catalog = Self::new();

        // Overdrive
        catalog.register(
            PluginDescriptor::new(
                "urn:pedalera:overdrive",
                "Overdrive",
                PluginCategory::Distortion,
            )
            .with_port(PortDescriptor::audio_in("in", "In"))
            .with_port(PortDescriptor::audio_out("out", "Out"))
            .with_port(PortDescriptor::control_in("drive", "Drive", 0.0, 10.0, 3.0))
            .with_port(PortDescriptor::control_in("tone", "Tone", 0.0, 10.0, 5.0))
            .with_port(
                PortDescriptor::control_in("level", "Level", -60.0, 12.0, 0.0)
                    .with_unit(PortUnit::Decibels),
            )
            .with_port(
                PortDescriptor::control_in("voicing", "Voicing", 0.0, 2.0, 0.0)
                    .with_scale_points(vec![
                        ScalePoint::new("Classic", 0.0),
                        ScalePoint::new("Modern", 1.0),
                        ScalePoint::new("Fuzz", 2.0),
                    ]),
            ),
        );

        // Delay
        catalog.register(
            PluginDescriptor::new("urn:pedalera:delay", "Tape Delay", PluginCategory::Delay)
                .with_port(PortDescriptor::audio_in("in", "In"))
                .with_port(PortDescriptor::audio_out("out", "Out"))
                .with_port(
                    PortDescriptor::control_in("time", "Time", 1.0, 2000.0, 250.0)
                        .with_unit(PortUnit::Milliseconds)
                        .with_flags(PortFlags::LOGARITHMIC),
                )
                .with_port(
                    PortDescriptor::control_in("feedback", "Feedback", 0.0, 95.0, 40.0)
                        .with_unit(PortUnit::Percent),
                )
                .with_port(
                    PortDescriptor::control_in("mix", "Mix", 0.0, 100.0, 35.0)
                        .with_unit(PortUnit::Percent),
                ),
        );

        // Chorus
        catalog.register(
            PluginDescriptor::new("urn:pedalera:chorus", "Chorus", PluginCategory::Modulation)
                .with_port(PortDescriptor::audio_in("in", "In"))
                .with_port(PortDescriptor::audio_out("out", "Out"))
                .with_port(
                    PortDescriptor::control_in("rate", "Rate", 0.05, 5.0, 0.8)
                        .with_unit(PortUnit::Hertz)
                        .with_flags(PortFlags::LOGARITHMIC),
                )
                .with_port(
                    PortDescriptor::control_in("depth", "Depth", 0.0, 100.0, 50.0)
                        .with_unit(PortUnit::Percent),
                )
                .with_port(
                    PortDescriptor::control_in("mix", "Mix", 0.0, 100.0, 50.0)
                        .with_unit(PortUnit::Percent),
                ),
        );

        // Reverb, stereo
        catalog.register(
            PluginDescriptor::new("urn:pedalera:reverb", "Hall Reverb", PluginCategory::Reverb)
                .with_port(PortDescriptor::audio_in("in_l", "In L"))
                .with_port(PortDescriptor::audio_in("in_r", "In R"))
                .with_port(PortDescriptor::audio_out("out_l", "Out L"))
                .with_port(PortDescriptor::audio_out("out_r", "Out R"))
                .with_port(PortDescriptor::control_in("decay", "Decay", 0.1, 10.0, 2.5))
                .with_port(
                    PortDescriptor::control_in("damping", "Damping", 0.0, 100.0, 50.0)
                        .with_unit(PortUnit::Percent),
                )
                .with_port(
                    PortDescriptor::control_in("mix", "Mix", 0.0, 100.0, 25.0)
                        .with_unit(PortUnit::Percent),
                ),
        );

        // Gain utility: toggle, hidden trim, and a meter output
        catalog.register(
            PluginDescriptor::new("urn:pedalera:gain", "Gain", PluginCategory::Utility)
                .with_port(PortDescriptor::audio_in("in", "In"))
                .with_port(PortDescriptor::audio_out("out", "Out"))
                .with_port(
                    PortDescriptor::control_in("gain", "Gain", -60.0, 12.0, 0.0)
                        .with_unit(PortUnit::Decibels),
                )
                .with_port(
                    PortDescriptor::control_in("mute", "Mute", 0.0, 1.0, 0.0)
                        .with_flags(PortFlags::TOGGLED),
                )
                .with_port(
                    PortDescriptor::control_in("trim", "Trim", -6.0, 6.0, 0.0)
                        .with_unit(PortUnit::Decibels)
                        .with_flags(PortFlags::NOT_ON_SURFACE),
                )
                .with_port(
                    PortDescriptor::control_out("level_out", "Level", -90.0, 6.0, -90.0)
                        .with_unit(PortUnit::Decibels),
                ),
        );

        catalog
    }
}
