//! Project path discovery and cache path expansion

use crate::error::PlatformError;
use std::path::{Path, PathBuf};

/// Supplies the base directory consumed by cache operations.
///
/// Injected into the engine's registry; the default implementation uses the
/// process working directory, mirroring a script-launched run.
pub trait PathProvider: Send + Sync {
    /// Absolute path to the project directory.
    fn project_dir(&self) -> Result<PathBuf, PlatformError>;
}

/// Uses the process working directory as the project directory.
#[derive(Debug, Default, Clone)]
pub struct WorkingDirProvider;

impl PathProvider for WorkingDirProvider {
    fn project_dir(&self) -> Result<PathBuf, PlatformError> {
        std::env::current_dir().map_err(|e| PlatformError::NoWorkingDirectory(e.to_string()))
    }
}

/// Expand a path, resolving `~` to the user's home directory
pub fn expand_path<P: AsRef<Path>>(path: P) -> Result<PathBuf, PlatformError> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    if path_str.starts_with("~/") {
        let home = dirs::home_dir().ok_or(PlatformError::NoHomeDirectory)?;
        Ok(home.join(&path_str[2..]))
    } else if path_str == "~" {
        dirs::home_dir().ok_or(PlatformError::NoHomeDirectory)
    } else {
        Ok(path.to_path_buf())
    }
}

/// Resolve a cache directory argument against a project directory
///
/// - `~`-prefixed paths expand to the home directory
/// - Absolute paths are returned as-is
/// - `./`-prefixed and bare relative paths are resolved against `project`
pub fn resolve_cache_dir(raw: &str, project: &Path) -> Result<PathBuf, PlatformError> {
    if raw.starts_with('~') {
        return expand_path(raw);
    }

    let path = Path::new(raw);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let relative = raw.strip_prefix("./").unwrap_or(raw);
    Ok(project.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().expect("No home directory");

        let expanded = expand_path("~/.cache").unwrap();
        assert_eq!(expanded, home.join(".cache"));

        let expanded = expand_path("~").unwrap();
        assert_eq!(expanded, home);
    }

    #[test]
    fn test_expand_absolute() {
        let path = expand_path("/etc/hosts").unwrap();
        assert_eq!(path, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_resolve_cache_dir_relative() {
        let dir = resolve_cache_dir("./objects", Path::new("/work/project")).unwrap();
        assert_eq!(dir, PathBuf::from("/work/project/objects"));

        let dir = resolve_cache_dir("objects", Path::new("/work/project")).unwrap();
        assert_eq!(dir, PathBuf::from("/work/project/objects"));
    }

    #[test]
    fn test_resolve_cache_dir_absolute() {
        let dir = resolve_cache_dir("/var/cache/objects", Path::new("/work/project")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/cache/objects"));
    }

    #[test]
    fn test_resolve_cache_dir_tilde() {
        let home = dirs::home_dir().expect("No home directory");
        let dir = resolve_cache_dir("~/cache", Path::new("/work/project")).unwrap();
        assert_eq!(dir, home.join("cache"));
    }

    #[test]
    fn test_working_dir_provider() {
        let dir = WorkingDirProvider.project_dir().unwrap();
        assert!(dir.is_absolute());
    }
}
