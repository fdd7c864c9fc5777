//! Session layer: one controller that ties the whole rig together.
//!
//! [`SessionController`] owns the active board, the plugin catalog, the
//! board library, and the link to the audio host, and keeps them in step.
//! Board edits apply locally first and stream to the host while one is
//! attached; host-side changes stream back; a dropped link is redialed and
//! the host rebuilt from the board without the frontend doing anything.
//!
//! # Features
//!
//! - **Controller** — [`SessionController`] with board edits, snapshots,
//!   library switching, and hardware control events
//! - **Configuration** — [`SessionConfig`], TOML-backed with sane defaults
//! - **Dialing** — [`HostDialer`] seam over the transport, [`TcpDialer`]
//!   for production
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::{Duration, Instant};
//!
//! use pedalera_board::Position;
//! use pedalera_catalog::Catalog;
//! use pedalera_session::{SessionConfig, SessionController};
//!
//! let config = SessionConfig::default();
//! let mut session = SessionController::new(Catalog::demo(), config).unwrap();
//!
//! // Build the rig; edits work before the host is up.
//! let od = session
//!     .add_plugin(&"urn:pedalera:overdrive".into(), Position::default())
//!     .unwrap();
//! session.set_param(od, "drive", 6.5).unwrap();
//!
//! // Go live and let the controller replay the board into the host.
//! session.connect_host(Instant::now()).unwrap();
//! let events = session.pump_until_ready(Duration::from_secs(5)).unwrap();
//! println!("host ready after {} events", events.len());
//! ```

mod config;
mod controller;
mod dialer;
mod error;

pub use config::SessionConfig;
pub use controller::{ControlEventOutcome, ParamOutcome, SessionController, SessionEvent};
pub use dialer::{HostDialer, TcpDialer};
pub use error::SessionError;
