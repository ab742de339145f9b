//! confect-loader: configuration trees from JSON and YAML files
//!
//! The engine consumes plain in-memory value trees; this crate supplies
//! them from disk. The format is picked by file extension.

use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

/// Errors raised while loading a tree file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported tree format '{extension}' for {path}")]
    UnsupportedFormat { path: String, extension: String },
}

/// Errors raised by [`run_file`].
#[derive(Debug, Error)]
pub enum RunFileError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("run error: {0}")]
    Run(#[from] confect_core::RunError),
}

/// Load a raw configuration tree from a `.json`, `.yaml`, or `.yml` file.
pub fn load_tree(path: &Path) -> Result<Value, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text).map_err(|e| LoadError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text).map_err(|e| LoadError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        other => Err(LoadError::UnsupportedFormat {
            path: path.display().to_string(),
            extension: other.unwrap_or("<none>").to_string(),
        }),
    }
}

/// Load a tree file and run it in one call.
///
/// Convenience wrapper for callers whose configuration lives on disk.
pub fn run_file(
    path: &Path,
    options: confect_core::RunOptions,
    registry: &confect_core::Registry,
) -> Result<confect_core::ObjectsStore, RunFileError> {
    let tree = load_tree(path)?;
    Ok(confect_core::run(&tree, options, registry)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_json_tree() {
        let file = temp_file(
            ".json",
            r#"{"s": {"c": {"init": {"a": 7}, "priority": 1}}}"#,
        );
        let tree = load_tree(file.path()).unwrap();
        assert_eq!(tree["s"]["c"]["init"], json!({"a": 7}));
    }

    #[test]
    fn test_load_yaml_tree() {
        let file = temp_file(
            ".yaml",
            "s:\n  c:\n    init:\n      a: 7\n    priority: 1\n",
        );
        let tree = load_tree(file.path()).unwrap();
        assert_eq!(tree["s"]["c"]["init"]["a"], json!(7));
        assert_eq!(tree["s"]["c"]["priority"], json!(1));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = temp_file(".toml", "a = 1");
        let result = load_tree(file.path());
        assert!(matches!(result, Err(LoadError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let file = temp_file(".json", "{not json");
        let result = load_tree(file.path());
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = load_tree(Path::new("/nonexistent/tree.json"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_run_file_builds_the_store() {
        let file = temp_file(".json", r#"{"s": {"c": {"init": {"a": 1}}}}"#);

        let options = confect_core::RunOptions {
            default_tree: Some(json!({})),
            ..Default::default()
        };
        let objects =
            run_file(file.path(), options, &confect_core::Registry::default()).unwrap();
        assert_eq!(
            objects.get("s__c").unwrap().as_value(),
            Some(&json!({"a": 1}))
        );
    }
}
