//! Pedalboard model: the plugin graph, control addressings, and snapshots.
//!
//! A [`Pedalboard`] holds plugin instances, the audio connections between
//! them, the hardware-control addressings, and named value snapshots. Every
//! mutation validates against the plugin descriptors from
//! [`pedalera_catalog`] and appends a [`GraphIntent`] to a change log; the
//! host session drains that log and forwards it to the audio host, so edits
//! never wait on the host and keep working while it is down.
//!
//! # Example
//!
//! ```rust
//! use pedalera_board::{AddressingEntry, Pedalboard, PortRef, Position};
//! use pedalera_catalog::{Catalog, PluginUri};
//!
//! let catalog = Catalog::demo();
//! let mut board = Pedalboard::new("demo");
//!
//! let od = board
//!     .add_instance(&catalog, &PluginUri::new("urn:pedalera:overdrive"), Position::default())
//!     .unwrap();
//! let dly = board
//!     .add_instance(&catalog, &PluginUri::new("urn:pedalera:delay"), Position::default())
//!     .unwrap();
//!
//! board
//!     .connect(PortRef::new(od, "out"), PortRef::new(dly, "in"))
//!     .unwrap();
//!
//! board
//!     .address(AddressingEntry::new("knob:1", od, "drive", 0.0, 10.0))
//!     .unwrap();
//! let update = board.resolve_control("knob:1", 0.5).unwrap();
//! assert_eq!(update.value, 5.0);
//!
//! // Edits so far, ready for the host session to forward.
//! assert_eq!(board.take_intents().len(), 3);
//! ```

pub mod addressing;
pub mod board;
pub mod error;
pub mod intent;
pub mod snapshot;
pub mod transform;

pub use addressing::{AddressingEntry, AddressingTable, ControlId, ResolvedUpdate};
pub use board::{
    Connection, InstanceId, Pedalboard, PluginInstance, PortRef, Position, RemovedInstance,
};
pub use error::{AddressError, GraphError};
pub use intent::GraphIntent;
pub use snapshot::{InstanceState, Snapshot};
pub use transform::Transform;
