//! Error type for session-level operations.

use std::path::PathBuf;

use thiserror::Error;

use pedalera_board::{AddressError, GraphError};
use pedalera_host::HostError;
use pedalera_store::StoreError;

/// Everything a [`SessionController`](crate::SessionController) call can fail
/// with.
///
/// Board, addressing, library, and host errors pass through transparently;
/// their messages already name the offending object. The remaining variants
/// are the session's own.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A board edit was invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A control addressing or lookup failed.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The board library failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The host link failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Every connection attempt failed.
    #[error("host unreachable after {attempts} attempts")]
    HostUnavailable {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The active board has no library id yet.
    #[error("the active board has never been saved; save it under an id first")]
    NeverSaved,

    /// Failed to read the configuration file.
    #[error("failed to read config '{path}': {source}")]
    ReadConfig {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the configuration file.
    #[error("failed to write config '{path}': {source}")]
    WriteConfig {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("failed to parse config: {0}")]
    ParseConfig(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    SerializeConfig(#[from] toml::ser::Error),
}

impl SessionError {
    /// Create a config read error.
    pub fn read_config(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::ReadConfig {
            path: path.into(),
            source,
        }
    }

    /// Create a config write error.
    pub fn write_config(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::WriteConfig {
            path: path.into(),
            source,
        }
    }
}
