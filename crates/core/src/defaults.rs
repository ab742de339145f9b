//! Built-in default configuration tree

use serde_json::{Value, json};

/// Default tree contributing a project path and a logger object.
///
/// Merged beneath every run that does not supply its own default tree:
/// `path__default` ends up holding the project directory string and
/// `logger__default` an injectable logger handle, both available to other
/// sub-configurations through `path_id` / `logger_id` constructor kwargs.
/// The backing seed factories are registered by `Registry::default()`.
pub fn default_tree() -> Value {
  json!({
    "path": {
      "default": {
        "init": { "$factory": "path.project" },
        "producer": "base",
        "patch": {},
        "steps": [],
        "global": {},
        "priority": 1,
      },
    },
    "logger": {
      "default": {
        "init": { "$factory": "logger.tracing" },
        "producer": "base",
        "patch": {},
        "steps": [],
        "global": {},
        "priority": 1,
      },
    },
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::Registry;
  use crate::tree::{ConfigTree, Seed};

  #[test]
  fn default_tree_shapes_cleanly() {
    let tree = ConfigTree::from_value(&default_tree(), &Registry::default()).unwrap();
    assert_eq!(
      tree.sections["path"].configs["default"].init,
      Seed::Factory("path.project".to_string())
    );
    assert_eq!(
      tree.sections["logger"].configs["default"].init,
      Seed::Factory("logger.tracing".to_string())
    );
  }
}
