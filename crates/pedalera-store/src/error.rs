//! Error types for board persistence.

use std::path::PathBuf;
use thiserror::Error;

use crate::library::BoardId;

/// Errors that can occur while loading, saving, or rebuilding boards.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove a file
    #[error("failed to remove file '{path}': {source}")]
    RemoveFile {
        /// Path of the file that could not be removed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A board file exists but does not parse
    #[error("board file '{path}' is corrupt: {source}")]
    Corrupt {
        /// Path of the unparseable file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// JSON conversion outside a file context
    #[error("board document JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document's format version is newer than this build understands
    #[error("board document version {found} is not supported (expected {expected})")]
    UnsupportedVersion {
        /// Version the document declares.
        found: u32,
        /// Version this build writes and reads.
        expected: u32,
    },

    /// No stored board under that id
    #[error("no stored board named '{0}'")]
    UnknownBoard(BoardId),

    /// The document parsed but does not describe a loadable board
    #[error("board document failed validation: {reason}")]
    Validation {
        /// What made the document unloadable.
        reason: String,
    },
}

impl StoreError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a remove file error.
    pub fn remove_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::RemoveFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create a corrupt file error.
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            source,
        }
    }

    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        StoreError::Validation {
            reason: reason.into(),
        }
    }
}
