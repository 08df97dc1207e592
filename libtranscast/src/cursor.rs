//! Persistence of the forwarding cursor
//!
//! The cursor is the id of the last post that was confirmed published on
//! the target account. It is stored as a decimal string in a single file
//! and rewritten after every successful forward.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::CursorError;
use crate::types::PostId;

pub trait CursorStore: Send + Sync {
    /// Last saved cursor, or `None` when there is no usable prior value
    fn load(&self) -> Option<PostId>;

    /// Durably replace the stored cursor. Returns only once the value is
    /// on disk.
    fn save(&self, cursor: PostId) -> Result<(), CursorError>;
}

/// Cursor kept in a text file
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_err(&self, source: std::io::Error) -> CursorError {
        CursorError::Write {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Option<PostId> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cursor file, starting fresh");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cursor file unreadable, treating as absent");
                return None;
            }
        };

        match content.parse::<PostId>() {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cursor file corrupt, treating as absent");
                None
            }
        }
    }

    fn save(&self, cursor: PostId) -> Result<(), CursorError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }

        // Write-then-rename so a crash never leaves a half-written cursor
        let temp = self.temp_path();
        let mut file = File::create(&temp).map_err(|e| self.write_err(e))?;
        file.write_all(cursor.to_string().as_bytes())
            .map_err(|e| self.write_err(e))?;
        file.sync_all().map_err(|e| self.write_err(e))?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|e| self.write_err(e))?;
        debug!(path = %self.path.display(), cursor = %cursor, "Cursor saved");
        Ok(())
    }
}

/// In-memory cursor store for tests and dry runs
#[derive(Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<Option<PostId>>,
    history: Mutex<Vec<PostId>>,
    fail_saves: bool,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: impl Into<PostId>) -> Self {
        Self {
            cursor: Mutex::new(Some(cursor.into())),
            ..Default::default()
        }
    }

    /// A store whose writes always fail
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Default::default()
        }
    }

    pub fn current(&self) -> Option<PostId> {
        *self.cursor.lock().unwrap()
    }

    /// Every value passed to `save`, in order
    pub fn history(&self) -> Vec<PostId> {
        self.history.lock().unwrap().clone()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Option<PostId> {
        self.current()
    }

    fn save(&self, cursor: PostId) -> Result<(), CursorError> {
        if self.fail_saves {
            return Err(CursorError::Write {
                path: "<memory>".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            });
        }
        *self.cursor.lock().unwrap() = Some(cursor);
        self.history.lock().unwrap().push(cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCursorStore::new(temp_dir.path().join("lastTweetId.txt"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCursorStore::new(temp_dir.path().join("lastTweetId.txt"));

        store.save(PostId::new(1849302219)).unwrap();
        assert_eq!(store.load(), Some(PostId::new(1849302219)));
    }

    #[test]
    fn test_save_overwrites_fully() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lastTweetId.txt");
        let store = FileCursorStore::new(&path);

        store.save(PostId::new(123456789)).unwrap();
        store.save(PostId::new(987654321000)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "987654321000");
        assert!(!temp_dir.path().join("lastTweetId.txt.tmp").exists());
    }

    #[test]
    fn test_load_tolerates_trailing_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lastTweetId.txt");
        fs::write(&path, "100\n").unwrap();

        assert_eq!(FileCursorStore::new(&path).load(), Some(PostId::new(100)));
    }

    #[test]
    fn test_load_corrupt_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lastTweetId.txt");
        fs::write(&path, "not-a-number").unwrap();

        assert_eq!(FileCursorStore::new(&path).load(), None);
    }

    #[test]
    fn test_load_directory_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCursorStore::new(temp_dir.path());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("cursor");
        let store = FileCursorStore::new(&path);

        store.save(PostId::new(7)).unwrap();
        assert_eq!(store.load(), Some(PostId::new(7)));
    }

    #[test]
    fn test_save_failure_is_loud() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = FileCursorStore::new(blocker.join("lastTweetId.txt"));
        let err = store.save(PostId::new(1)).unwrap_err();
        assert!(err.to_string().contains("Failed to write cursor file"));
    }

    #[test]
    fn test_memory_store_records_history() {
        let store = MemoryCursorStore::with_cursor(5);
        store.save(PostId::new(6)).unwrap();
        store.save(PostId::new(9)).unwrap();

        assert_eq!(store.load(), Some(PostId::new(9)));
        assert_eq!(store.history(), vec![PostId::new(6), PostId::new(9)]);
    }

    #[test]
    fn test_failing_memory_store() {
        let store = MemoryCursorStore::failing();
        assert!(store.save(PostId::new(1)).is_err());
        assert_eq!(store.load(), None);
    }
}
