//! Default merging and tree normalization
//!
//! Normalization merges a default tree beneath the raw tree at the value
//! level, then shapes the result into the typed model, filling built-in
//! structural defaults so every sub-configuration carries all six keys.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ResolveError;
use crate::registry::Registry;
use crate::tree::{ConfigTree, GLOBAL_KEY};

/// Merge defaults into a raw tree and shape it into the typed model.
pub fn normalize(
  raw: &Value,
  default: &Value,
  registry: &Registry,
) -> Result<ConfigTree, ResolveError> {
  let merged = merge_defaults(raw, default)?;
  ConfigTree::from_value(&merged, registry)
}

/// Merge a default tree beneath a raw tree.
///
/// Sections present only in the default tree are copied wholesale.
/// Tree-level and section-level `global` objects are unioned, working
/// entries winning. For a sub-configuration present in both trees, every
/// key it lacks is copied from the default sub-configuration with the same
/// id, falling back to the first sub-configuration of the default section.
pub fn merge_defaults(raw: &Value, default: &Value) -> Result<Value, ResolveError> {
  let mut work = as_object(raw, "<tree>", "configuration tree")?.clone();
  let defaults = as_object(default, "<tree>", "default tree")?;

  for (section_id, default_section) in defaults {
    match work.get_mut(section_id) {
      None => {
        debug!(section = %section_id, "copying default section");
        work.insert(section_id.clone(), default_section.clone());
      }
      Some(section) if section_id == GLOBAL_KEY => {
        fill_missing_keys(section_id, section, default_section)?;
      }
      Some(section) => merge_section(section_id, section, default_section)?,
    }
  }
  Ok(Value::Object(work))
}

fn merge_section(
  section_id: &str,
  section: &mut Value,
  default_section: &Value,
) -> Result<(), ResolveError> {
  let default_map = as_object(default_section, section_id, "default section")?;
  let section_map = match section {
    Value::Object(map) => map,
    _ => return Err(ResolveError::structure(section_id, "section must be an object")),
  };

  // Fallback for configuration ids the default section does not know:
  // its first real sub-configuration, skipping the override map.
  let fallback = default_map
    .iter()
    .find(|(id, _)| id.as_str() != GLOBAL_KEY)
    .map(|(_, value)| value);

  for (config_id, config) in section_map.iter_mut() {
    if config_id == GLOBAL_KEY {
      if let Some(default_global) = default_map.get(GLOBAL_KEY) {
        fill_missing_keys(section_id, config, default_global)?;
      }
      continue;
    }
    let source = default_map.get(config_id).or(fallback);
    if let Some(source) = source {
      let at = format!("{section_id}__{config_id}");
      fill_missing_keys(&at, config, source)?;
    }
  }

  // A section-level override map only present in the default is copied in.
  if !section_map.contains_key(GLOBAL_KEY)
    && let Some(default_global) = default_map.get(GLOBAL_KEY)
  {
    section_map.insert(GLOBAL_KEY.to_string(), default_global.clone());
  }
  Ok(())
}

/// Copy every key of `source` that `target` lacks.
fn fill_missing_keys(at: &str, target: &mut Value, source: &Value) -> Result<(), ResolveError> {
  let source_map = as_object(source, at, "default entry")?;
  let target_map = match target {
    Value::Object(map) => map,
    _ => return Err(ResolveError::structure(at, "entry must be an object")),
  };
  for (key, value) in source_map {
    if !target_map.contains_key(key) {
      target_map.insert(key.clone(), value.clone());
    }
  }
  Ok(())
}

fn as_object<'a>(
  raw: &'a Value,
  at: &str,
  what: &str,
) -> Result<&'a Map<String, Value>, ResolveError> {
  match raw {
    Value::Object(map) => Ok(map),
    _ => Err(ResolveError::structure(at, format!("{what} must be an object"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn missing_sections_are_copied_wholesale() {
    let raw = json!({});
    let default = json!({"path": {"default": {"init": "/work", "priority": 1}}});
    let merged = merge_defaults(&raw, &default).unwrap();
    assert_eq!(merged["path"]["default"]["init"], json!("/work"));
  }

  #[test]
  fn working_entries_win_over_defaults() {
    let raw = json!({"s": {"c": {"init": 1}}});
    let default = json!({"s": {"c": {"init": 2, "priority": 3}}});
    let merged = merge_defaults(&raw, &default).unwrap();
    assert_eq!(merged["s"]["c"]["init"], json!(1));
    assert_eq!(merged["s"]["c"]["priority"], json!(3));
  }

  #[test]
  fn unknown_config_ids_fall_back_to_first_default() {
    let raw = json!({"s": {"mine": {}}});
    let default = json!({"s": {
      "first": {"init": "from-first"},
      "second": {"init": "from-second"},
    }});
    let merged = merge_defaults(&raw, &default).unwrap();
    assert_eq!(merged["s"]["mine"]["init"], json!("from-first"));
  }

  #[test]
  fn fallback_skips_the_section_override_map() {
    let raw = json!({"s": {"mine": {}}});
    let default = json!({"s": {
      "global": {"key": 1},
      "real": {"init": "from-real"},
    }});
    let merged = merge_defaults(&raw, &default).unwrap();
    assert_eq!(merged["s"]["mine"]["init"], json!("from-real"));
    assert_eq!(merged["s"]["global"], json!({"key": 1}));
  }

  #[test]
  fn tree_globals_are_unioned() {
    let raw = json!({"global": {"a": 1}});
    let default = json!({"global": {"a": 2, "b": 3}});
    let merged = merge_defaults(&raw, &default).unwrap();
    assert_eq!(merged["global"], json!({"a": 1, "b": 3}));
  }

  #[test]
  fn section_globals_are_unioned() {
    let raw = json!({"s": {"global": {"a": 1}, "c": {}}});
    let default = json!({"s": {"global": {"a": 2, "b": 3}, "c": {}}});
    let merged = merge_defaults(&raw, &default).unwrap();
    assert_eq!(merged["s"]["global"], json!({"a": 1, "b": 3}));
  }

  #[test]
  fn merge_is_idempotent_once_applied() {
    let raw = json!({"s": {"c": {"steps": [["m"]]}}, "extra": {"e": {"init": 5}}});
    let default = json!({"s": {"c": {"priority": 2}}, "d": {"d1": {"init": []}}});
    let once = merge_defaults(&raw, &default).unwrap();
    let twice = merge_defaults(&once, &json!({})).unwrap();
    assert_eq!(once, twice);
  }

  #[test]
  fn non_object_tree_is_an_error() {
    assert!(merge_defaults(&json!([]), &json!({})).is_err());
    assert!(merge_defaults(&json!({}), &json!(42)).is_err());
  }
}
