//! Board persistence for the pedalera engine.
//!
//! Boards are stored as versioned JSON documents and collected into a
//! library directory, one file per board.
//!
//! # Features
//!
//! - **Documents**: [`BoardDoc`] captures a complete board (instances,
//!   values, connections, addressings, snapshots) and rebuilds it with full
//!   validation against a catalog
//! - **Library**: a directory of `<id>.json` boards with atomic saves
//! - **Paths**: platform-specific board and config directories
//!
//! # Example
//!
//! ```rust,no_run
//! use pedalera_catalog::Catalog;
//! use pedalera_store::{BoardId, Library};
//!
//! let catalog = Catalog::demo();
//! let library = Library::user().unwrap();
//!
//! for id in library.list() {
//!     let board = library.load_board(&id, &catalog).unwrap();
//!     println!("{id}: {} instances", board.instance_count());
//! }
//! ```
//!
//! Loading never touches a live board: [`BoardDoc::into_board`] builds a
//! fresh one and fails as a whole, so callers swap only on success.

mod document;
mod error;
mod library;

/// Platform-specific paths for stored boards.
pub mod paths;

pub use document::{
    BoardDoc, ConnectionDoc, FORMAT_VERSION, InstanceDoc, SnapshotDoc, SnapshotEntryDoc,
};
pub use error::StoreError;
pub use library::{BoardId, Library};
