//! Plugin catalog for the pedalera pedalboard engine.
//!
//! This crate holds the static vocabulary the rest of the engine validates
//! against: which plugins exist, what ports they expose, and what values
//! those ports accept. Descriptors are loaded once (from a directory of
//! JSON files or the built-in demo set) and shared read-only from then on.
//!
//! # Core Types
//!
//! - [`Catalog`] - immutable descriptor set keyed by [`PluginUri`]
//! - [`PluginDescriptor`] - one plugin: identity, category, ports
//! - [`PortDescriptor`] - one port: direction, kind, range, flags
//! - [`ControlRange`] - declared min/max/default with clamping
//! - [`PortFlags`] - logarithmic, enumerated, integer, toggled, hidden
//! - [`ScalePoint`] - labeled value on an enumerated port
//!
//! # Example
//!
//! ```rust
//! use pedalera_catalog::{Catalog, PluginUri};
//!
//! let catalog = Catalog::demo();
//! let delay = catalog.resolve(&PluginUri::new("urn:pedalera:delay")).unwrap();
//!
//! for port in delay.control_inputs() {
//!     let range = port.range.unwrap();
//!     println!("{}: {} to {}{}", port.name, range.min, range.max, port.unit.suffix());
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod plugin;
pub mod port;

pub use catalog::Catalog;
pub use error::CatalogError;
pub use plugin::{PluginCategory, PluginDescriptor, PluginUri};
pub use port::{
    ControlRange, PortDescriptor, PortDirection, PortFlags, PortKind, PortSymbol, PortUnit,
    ScalePoint,
};
