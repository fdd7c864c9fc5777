//! Platform-specific paths for stored boards.
//!
//! # Directory Structure
//!
//! - **User boards**: `~/.config/pedalera/boards/` (Linux), `~/Library/Application Support/pedalera/boards/` (macOS), `%APPDATA%\pedalera\boards\` (Windows)
//! - **User config**: `~/.config/pedalera/` (Linux), `~/Library/Application Support/pedalera/` (macOS), `%APPDATA%\pedalera\` (Windows)

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "pedalera";

/// Subdirectory name for stored boards.
const BOARDS_SUBDIR: &str = "boards";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user-specific boards directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_boards_dir() -> PathBuf {
    user_config_dir().join(BOARDS_SUBDIR)
}

/// Ensure the user boards directory exists.
///
/// Creates the directory and any parent directories if they don't exist.
pub fn ensure_user_boards_dir() -> Result<PathBuf, crate::StoreError> {
    let dir = user_boards_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::StoreError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

/// Get the board id from a file path.
///
/// Extracts the file stem (filename without extension).
pub fn board_id_from_path(path: &std::path::Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_boards_dir_nests_under_app() {
        let dir = user_boards_dir();
        let dir_str = dir.to_string_lossy();
        assert!(dir_str.contains("pedalera"));
        assert!(dir_str.contains("boards"));
    }

    #[test]
    fn test_board_id_from_path() {
        let path = std::path::Path::new("/somewhere/boards/stage-a.json");
        assert_eq!(board_id_from_path(path), Some("stage-a".to_string()));
    }
}
