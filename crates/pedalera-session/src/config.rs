//! Session configuration.
//!
//! [`SessionConfig`] collects the settings a
//! [`SessionController`](crate::SessionController) needs: where the audio
//! host listens, how patient to be with it, and where boards live on disk.
//! It loads from TOML, and every field has a default so a partial file (or
//! none at all) works.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Settings for a session controller.
///
/// # TOML format
///
/// ```toml
/// host_addr = "127.0.0.1:5555"
/// command_timeout_ms = 1000
/// connect_timeout_ms = 2000
/// resync_attempts = 3
/// control_queue_depth = 32
/// # boards_dir = "/var/lib/pedalera/boards"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Address the audio host listens on.
    pub host_addr: String,
    /// Milliseconds to wait for a reply before declaring the link dead.
    pub command_timeout_ms: u64,
    /// Milliseconds to wait for the TCP connect itself.
    pub connect_timeout_ms: u64,
    /// Connection attempts before reporting the host unavailable.
    pub resync_attempts: u32,
    /// Control events buffered while the host is catching up. Zero disables
    /// buffering; events during a resync are then dropped.
    pub control_queue_depth: usize,
    /// Board library directory. `None` selects the per-user default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boards_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host_addr: "127.0.0.1:5555".to_string(),
            command_timeout_ms: 1_000,
            connect_timeout_ms: 2_000,
            resync_attempts: 3,
            control_queue_depth: 32,
            boards_dir: None,
        }
    }
}

impl SessionConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| SessionError::read_config(path, e))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SessionError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::write_config(path, e))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| SessionError::write_config(path, e))?;
        Ok(())
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, SessionError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reply deadline as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Connect deadline as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
