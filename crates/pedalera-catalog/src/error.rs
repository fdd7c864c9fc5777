//! Error types for catalog operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::plugin::PluginUri;

/// Errors that can occur while building or querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read a descriptor file or directory
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Descriptor file is not valid JSON
    #[error("malformed descriptor '{path}': {source}")]
    Malformed {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Descriptor parsed but is internally inconsistent
    #[error("invalid descriptor for '{uri}': {reason}")]
    Descriptor {
        /// URI of the offending plugin.
        uri: PluginUri,
        /// What was wrong with it.
        reason: String,
    },

    /// Two descriptors claim the same URI
    #[error("duplicate plugin uri: {0}")]
    DuplicateUri(PluginUri),

    /// Lookup for a URI the catalog does not hold
    #[error("unknown plugin: {0}")]
    UnknownPlugin(PluginUri),
}

impl CatalogError {
    /// Create a read error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed-descriptor error.
    pub fn malformed(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CatalogError::Malformed {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    #[test]
    fn read_file_display() {
        let err = CatalogError::read_file("/plugins/drive.json", mock_io_err());
        let msg = err.to_string();
        assert!(msg.contains("failed to read"), "got: {msg}");
        assert!(msg.contains("/plugins/drive.json"), "got: {msg}");
    }

    #[test]
    fn read_file_source_is_some() {
        let err = CatalogError::read_file("/x", mock_io_err());
        assert!(err.source().is_some());
    }

    #[test]
    fn malformed_source_is_some() {
        let parse_err = serde_json::from_str::<crate::PluginDescriptor>("{")
            .expect_err("must not parse");
        let err = CatalogError::malformed("/x.json", parse_err);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("malformed descriptor"));
    }

    #[test]
    fn unknown_plugin_display() {
        let err = CatalogError::UnknownPlugin(PluginUri::new("urn:test:ghost"));
        assert_eq!(err.to_string(), "unknown plugin: urn:test:ghost");
        assert!(err.source().is_none());
    }

    #[test]
    fn duplicate_uri_display() {
        let err = CatalogError::DuplicateUri(PluginUri::new("urn:test:twice"));
        assert_eq!(err.to_string(), "duplicate plugin uri: urn:test:twice");
    }
}
