//! Filesystem-backed cache store

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PlatformError;

/// Byte sink and source for intermediate object state.
///
/// The engine hands encoded payloads to whatever implementation is
/// injected; it never touches the filesystem itself.
pub trait CacheStore: Send + Sync {
    /// Write `bytes` under `dir/name`, creating `dir` if needed.
    fn write(&self, dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, PlatformError>;

    /// Read the bytes previously written under `dir/name`.
    fn read(&self, dir: &Path, name: &str) -> Result<Vec<u8>, PlatformError>;
}

/// Cache store writing one file per entry.
#[derive(Debug, Default, Clone)]
pub struct FsCacheStore;

impl CacheStore for FsCacheStore {
    fn write(&self, dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, PlatformError> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let path = dir.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    fn read(&self, dir: &Path, name: &str) -> Result<Vec<u8>, PlatformError> {
        let path = dir.join(name);
        if !path.exists() {
            return Err(PlatformError::CacheMiss(path.display().to_string()));
        }
        Ok(fs::read(&path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("objects");

        let store = FsCacheStore;
        let path = store.write(&dir, "entry.cache", b"payload").unwrap();
        assert!(path.exists());

        let bytes = store.read(&dir, "entry.cache").unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[test]
    fn test_read_missing_entry() {
        let temp_dir = TempDir::new().unwrap();

        let store = FsCacheStore;
        let result = store.read(temp_dir.path(), "absent.cache");
        assert!(matches!(result, Err(PlatformError::CacheMiss(_))));
    }

    #[test]
    fn test_write_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("a/b/c");

        let store = FsCacheStore;
        store.write(&dir, "deep.cache", b"x").unwrap();
        assert!(dir.join("deep.cache").exists());
    }
}
