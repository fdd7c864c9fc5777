//! A directory of stored boards.

use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

use pedalera_board::Pedalboard;
use pedalera_catalog::Catalog;
use serde::{Deserialize, Serialize};

use crate::document::BoardDoc;
use crate::error::StoreError;

/// File-stem identifier of a stored board.
///
/// `BoardId::from("stage-a")` names the file `stage-a.json` inside the
/// library directory. Ids are opaque; display names live in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(String);

impl BoardId {
    /// Create a board id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BoardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for BoardId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A directory of `<id>.json` board documents.
///
/// Saves go through a temporary file and an atomic rename, so a crash
/// mid-write never leaves a half-written board behind.
#[derive(Debug, Clone)]
pub struct Library {
    dir: PathBuf,
}

impl Library {
    /// Open a library at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::create_dir(&dir, e))?;
        }
        Ok(Self { dir })
    }

    /// Open the per-user library under the platform config directory.
    pub fn user() -> Result<Self, StoreError> {
        Self::open(crate::paths::user_boards_dir())
    }

    /// The directory this library reads and writes.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `id`.
    pub fn board_path(&self, id: &BoardId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Ids of every stored board, sorted.
    ///
    /// Unreadable directories list as empty; unreadable entries are skipped.
    pub fn list(&self) -> Vec<BoardId> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut ids: Vec<BoardId> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().map(|ext| ext == "json").unwrap_or(false)
            })
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(BoardId::from)
            })
            .collect();
        ids.sort();
        ids
    }

    /// Whether a board is stored under `id`.
    pub fn contains(&self, id: &BoardId) -> bool {
        self.board_path(id).is_file()
    }

    /// Load the document stored under `id`.
    pub fn load(&self, id: &BoardId) -> Result<BoardDoc, StoreError> {
        let path = self.board_path(id);
        if !path.is_file() {
            return Err(StoreError::UnknownBoard(id.clone()));
        }
        let json =
            std::fs::read_to_string(&path).map_err(|e| StoreError::read_file(&path, e))?;
        serde_json::from_str(&json).map_err(|e| StoreError::corrupt(&path, e))
    }

    /// Load and rebuild the board stored under `id`.
    pub fn load_board(&self, id: &BoardId, catalog: &Catalog) -> Result<Pedalboard, StoreError> {
        self.load(id)?.into_board(catalog)
    }

    /// Store `doc` under `id`, replacing any previous version.
    pub fn save(&self, id: &BoardId, doc: &BoardDoc) -> Result<(), StoreError> {
        let json = doc.to_json()?;
        let tmp = self.dir.join(format!(".{id}.json.tmp"));
        std::fs::write(&tmp, json).map_err(|e| StoreError::write_file(&tmp, e))?;
        let path = self.board_path(id);
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::write_file(&path, e))?;
        tracing::debug!("library: saved board '{id}'");
        Ok(())
    }

    /// Capture and store a live board under `id`.
    pub fn save_board(&self, id: &BoardId, board: &Pedalboard) -> Result<(), StoreError> {
        self.save(id, &BoardDoc::from_board(board))
    }

    /// Delete the board stored under `id`.
    pub fn remove(&self, id: &BoardId) -> Result<(), StoreError> {
        let path = self.board_path(id);
        if !path.is_file() {
            return Err(StoreError::UnknownBoard(id.clone()));
        }
        std::fs::remove_file(&path).map_err(|e| StoreError::remove_file(&path, e))?;
        tracing::debug!("library: removed board '{id}'");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_id_display_and_borrow() {
        let id = BoardId::from("stage-a");
        assert_eq!(id.to_string(), "stage-a");
        assert_eq!(id.as_str(), "stage-a");
    }

    #[test]
    fn test_board_path_shape() {
        let library = Library {
            dir: PathBuf::from("/tmp/boards"),
        };
        assert_eq!(
            library.board_path(&BoardId::from("live")),
            PathBuf::from("/tmp/boards/live.json")
        );
    }
}
