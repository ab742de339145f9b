//! Global-override cascade and unset-reference resolution
//!
//! Three nested levels own an override map: tree, section, and
//! sub-configuration. Resolution moves ownership strictly downward, then
//! applies the final per-sub-configuration map to matching step arguments.
//! Unset-reference resolution is opt-in and fills unset arguments from
//! globals or from sibling section names.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ResolveError;
use crate::tree::{ConfigTree, SubConfig, compose_id};

/// Apply the override cascade and, optionally, unset-reference resolution.
pub fn resolve(tree: &mut ConfigTree, resolve_unset: bool) -> Result<(), ResolveError> {
  absorb_extra_keys(tree);
  distribute_globals(tree);

  // Section name -> config ids, read by the unset resolver while the
  // sub-configurations themselves are being mutated.
  let candidates: BTreeMap<String, Vec<String>> = tree
    .sections
    .iter()
    .map(|(name, section)| (name.clone(), section.configs.keys().cloned().collect()))
    .collect();

  for (section_id, section) in tree.sections.iter_mut() {
    for (config_id, config) in section.configs.iter_mut() {
      apply_globals(config);
      if resolve_unset {
        resolve_unset_arguments(section_id, config_id, config, &candidates)?;
      }
    }
  }
  Ok(())
}

/// Move unknown sub-configuration keys into its override map.
///
/// Supports the flat shorthand where arbitrary kwargs sit directly on the
/// sub-configuration; they overwrite same-name entries already present.
fn absorb_extra_keys(tree: &mut ConfigTree) {
  for section in tree.sections.values_mut() {
    for config in section.configs.values_mut() {
      let extra = std::mem::take(&mut config.extra);
      for (key, value) in extra {
        config.global.insert(key, value);
      }
    }
  }
}

/// Push the tree-level map into sections, then each section-level map into
/// its sub-configurations.
///
/// Entries whose first path segment names a child are routed into that
/// child with the segment stripped; everything else is broadcast to every
/// child. Broadcast entries land first so a routed (more specific) entry
/// wins when both produce the same residual key. The source map is cleared:
/// ownership transfers downward.
fn distribute_globals(tree: &mut ConfigTree) {
  let tree_global = std::mem::take(&mut tree.global);
  let section_names: Vec<String> = tree.sections.keys().cloned().collect();
  let (broadcast, routed) = split_routes(tree_global, &section_names);
  for section in tree.sections.values_mut() {
    for (key, value) in &broadcast {
      section.global.insert(key.clone(), value.clone());
    }
  }
  for (child, key, value) in routed {
    if let Some(section) = tree.sections.get_mut(&child) {
      section.global.insert(key, value);
    }
  }

  for section in tree.sections.values_mut() {
    let section_global = std::mem::take(&mut section.global);
    let config_names: Vec<String> = section.configs.keys().cloned().collect();
    let (broadcast, routed) = split_routes(section_global, &config_names);
    for config in section.configs.values_mut() {
      for (key, value) in &broadcast {
        config.global.insert(key.clone(), value.clone());
      }
    }
    for (child, key, value) in routed {
      if let Some(config) = section.configs.get_mut(&child) {
        config.global.insert(key, value);
      }
    }
  }
}

/// Split an override map into broadcast entries and routed
/// `(child, residual key, value)` entries.
fn split_routes(
  global: BTreeMap<String, Value>,
  children: &[String],
) -> (Vec<(String, Value)>, Vec<(String, String, Value)>) {
  let mut broadcast = Vec::new();
  let mut routed = Vec::new();
  for (key, value) in global {
    match key.split_once("__") {
      Some((head, rest)) if !rest.is_empty() && children.iter().any(|c| c == head) => {
        routed.push((head.to_string(), rest.to_string(), value));
      }
      _ => broadcast.push((key, value)),
    }
  }
  (broadcast, routed)
}

/// Overwrite matching step arguments with the final override entries.
///
/// A global entry `key` matches an argument named `key` in any step, or via
/// the qualified form `stepMethod__key`. Matching arguments are overwritten
/// unconditionally, explicit step-supplied values included. Plain keys are
/// applied before qualified keys so the more specific form wins.
fn apply_globals(config: &mut SubConfig) {
  let (qualified, plain): (Vec<_>, Vec<_>) = config
    .global
    .iter()
    .map(|(k, v)| (k.clone(), v.clone()))
    .partition(|(key, _)| key.contains("__"));

  for (key, value) in plain.iter().chain(qualified.iter()) {
    for step in config.steps.iter_mut() {
      for (name, current) in step.kwargs.iter_mut() {
        if key == name || qualified_key_matches(key, &step.method, name) {
          *current = value.clone();
        }
      }
    }
  }
}

fn qualified_key_matches(key: &str, method: &str, name: &str) -> bool {
  key
    .strip_prefix(method)
    .and_then(|rest| rest.strip_prefix("__"))
    .is_some_and(|rest| rest == name)
}

/// Truthiness test for "unset" arguments: null, false, zero, empty string,
/// empty array, empty object.
pub(crate) fn is_unset(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::Bool(b) => !b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
    Value::String(s) => s.is_empty(),
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
  }
}

/// Fill unset step arguments from globals and section names.
///
/// Globals with no section counterpart fill unset arguments of the same
/// name directly. Arguments named after a section (plain or `_id`-suffixed)
/// resolve to an explicit global entry when one exists, otherwise to the
/// composite id of the section's only sub-configuration; several candidates
/// without an explicit choice is an error.
fn resolve_unset_arguments(
  section_id: &str,
  config_id: &str,
  config: &mut SubConfig,
  candidates: &BTreeMap<String, Vec<String>>,
) -> Result<(), ResolveError> {
  let primitive: Vec<(String, Value)> = config
    .global
    .iter()
    .filter(|(key, _)| {
      let stem = key.strip_suffix("_id").unwrap_or(key);
      !candidates.contains_key(stem)
    })
    .map(|(k, v)| (k.clone(), v.clone()))
    .collect();

  for (key, glob_val) in &primitive {
    for step in config.steps.iter_mut() {
      if let Some(current) = step.kwargs.get_mut(key)
        && is_unset(current)
      {
        *current = glob_val.clone();
      }
    }
  }

  for (section, config_ids) in candidates {
    let id_key = format!("{section}_id");
    let glob_val = config
      .global
      .get(section)
      .or_else(|| config.global.get(&id_key))
      .filter(|v| !v.is_null())
      .cloned();

    for step in config.steps.iter_mut() {
      // The plain form shadows the `_id` form within one step.
      let arg_name = if step.kwargs.contains_key(section) {
        section.clone()
      } else if step.kwargs.contains_key(&id_key) {
        id_key.clone()
      } else {
        continue;
      };
      let Some(current) = step.kwargs.get_mut(&arg_name) else {
        continue;
      };
      if !is_unset(current) {
        continue;
      }
      let resolved = match &glob_val {
        Some(value) => value.clone(),
        None => match config_ids.as_slice() {
          [] => continue,
          [only] => Value::String(compose_id(section, only)),
          _ => {
            return Err(ResolveError::AmbiguousReference {
              section: section.clone(),
              argument: arg_name.clone(),
              hint: format!("{section_id}__{config_id}__{}__{arg_name}", step.method),
            });
          }
        },
      };
      *current = resolved;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::Registry;
  use crate::tree::ConfigTree;
  use serde_json::json;

  fn shaped(raw: Value) -> ConfigTree {
    ConfigTree::from_value(&raw, &Registry::default()).unwrap()
  }

  fn kwarg<'a>(tree: &'a ConfigTree, section: &str, config: &str, step: usize, name: &str) -> &'a Value {
    &tree.sections[section].configs[config].steps[step].kwargs[name]
  }

  mod globals {
    use super::*;

    #[test]
    fn unknown_keys_are_absorbed() {
      let mut tree = shaped(json!({"s": {"c": {"val": 42}}}));
      resolve(&mut tree, false).unwrap();
      assert_eq!(tree.sections["s"].configs["c"].global["val"], json!(42));
    }

    #[test]
    fn tree_global_reaches_every_step_argument() {
      let mut tree = shaped(json!({
        "global": {"key": "b"},
        "s1": {"c": {"steps": [["set", {"key": "explicit"}]]}},
        "s2": {"c": {"steps": [["other", {"key": null}]]}},
      }));
      resolve(&mut tree, false).unwrap();
      assert_eq!(kwarg(&tree, "s1", "c", 0, "key"), &json!("b"));
      assert_eq!(kwarg(&tree, "s2", "c", 0, "key"), &json!("b"));
    }

    #[test]
    fn routed_entries_strip_their_segment() {
      let mut tree = shaped(json!({
        "global": {"s1__key": "routed"},
        "s1": {"c": {"steps": [["set", {"key": null}]]}},
        "s2": {"c": {"steps": [["set", {"key": null}]]}},
      }));
      resolve(&mut tree, false).unwrap();
      assert_eq!(kwarg(&tree, "s1", "c", 0, "key"), &json!("routed"));
      assert_eq!(kwarg(&tree, "s2", "c", 0, "key"), &json!(null));
    }

    #[test]
    fn routed_beats_broadcast() {
      let mut tree = shaped(json!({
        "global": {"key": "broadcast", "s1__key": "routed"},
        "s1": {"c": {"steps": [["set", {"key": null}]]}},
      }));
      resolve(&mut tree, false).unwrap();
      assert_eq!(kwarg(&tree, "s1", "c", 0, "key"), &json!("routed"));
    }

    #[test]
    fn step_qualified_key_beats_plain_key() {
      let mut tree = shaped(json!({
        "s": {"c": {
          "global": {"key": "plain", "set__key": "qualified"},
          "steps": [["set", {"key": null}], ["other", {"key": null}]],
        }},
      }));
      resolve(&mut tree, false).unwrap();
      assert_eq!(kwarg(&tree, "s", "c", 0, "key"), &json!("qualified"));
      assert_eq!(kwarg(&tree, "s", "c", 1, "key"), &json!("plain"));
    }

    #[test]
    fn upper_levels_win_over_lower_levels() {
      let mut tree = shaped(json!({
        "global": {"key": "tree"},
        "s": {
          "global": {"key": "section"},
          "c": {"global": {"key": "config"}, "steps": [["set", {"key": null}]]},
        },
      }));
      resolve(&mut tree, false).unwrap();
      assert_eq!(kwarg(&tree, "s", "c", 0, "key"), &json!("tree"));
    }

    #[test]
    fn ownership_transfers_downward() {
      let mut tree = shaped(json!({
        "global": {"key": 1},
        "s": {"global": {"other": 2}, "c": {}},
      }));
      resolve(&mut tree, false).unwrap();
      assert!(tree.global.is_empty());
      assert!(tree.sections["s"].global.is_empty());
      let global = &tree.sections["s"].configs["c"].global;
      assert_eq!(global["key"], json!(1));
      assert_eq!(global["other"], json!(2));
    }
  }

  mod unset {
    use super::*;

    #[test]
    fn primitive_global_fills_unset_argument() {
      let mut tree = shaped(json!({
        "s": {"c": {
          "val": 42,
          "steps": [["set", {"val": null}]],
        }},
      }));
      resolve(&mut tree, true).unwrap();
      assert_eq!(kwarg(&tree, "s", "c", 0, "val"), &json!(42));
    }

    #[test]
    fn primitive_global_does_not_create_arguments() {
      let mut tree = shaped(json!({
        "s": {"c": {
          "val": 42,
          "steps": [["set", {"key": "x"}]],
        }},
      }));
      resolve(&mut tree, true).unwrap();
      let step = &tree.sections["s"].configs["c"].steps[0];
      assert!(!step.kwargs.contains_key("val"));
      assert_eq!(step.kwargs["key"], json!("x"));
    }

    #[test]
    fn single_candidate_section_synthesizes_composite_id() {
      let mut tree = shaped(json!({
        "s": {"c": {"steps": [["set", {"key": null}]]}},
        "key": {"conf": {"init": "b"}},
      }));
      resolve(&mut tree, true).unwrap();
      assert_eq!(kwarg(&tree, "s", "c", 0, "key"), &json!("key__conf"));
    }

    #[test]
    fn id_suffixed_argument_receives_the_same_id() {
      let mut tree = shaped(json!({
        "s": {"c": {"steps": [["set", {"key_id": null}]]}},
        "key": {"conf": {"init": "b"}},
      }));
      resolve(&mut tree, true).unwrap();
      assert_eq!(kwarg(&tree, "s", "c", 0, "key_id"), &json!("key__conf"));
    }

    #[test]
    fn two_candidates_without_explicit_choice_is_ambiguous() {
      let mut tree = shaped(json!({
        "s": {"c": {"steps": [["set", {"key": null}]]}},
        "key": {"one": {"init": 1}, "two": {"init": 2}},
      }));
      let err = resolve(&mut tree, true).unwrap_err();
      assert!(matches!(err, ResolveError::AmbiguousReference { section, .. } if section == "key"));
    }

    #[test]
    fn explicit_global_disambiguates() {
      let mut tree = shaped(json!({
        "s": {"c": {
          "global": {"key_id": "key__two"},
          "steps": [["set", {"key_id": null}]],
        }},
        "key": {"one": {"init": 1}, "two": {"init": 2}},
      }));
      resolve(&mut tree, true).unwrap();
      assert_eq!(kwarg(&tree, "s", "c", 0, "key_id"), &json!("key__two"));
    }

    #[test]
    fn set_arguments_are_not_resolved() {
      let mut tree = shaped(json!({
        "s": {"c": {"steps": [["set", {"key": "explicit"}]]}},
        "key": {"one": {"init": 1}, "two": {"init": 2}},
      }));
      resolve(&mut tree, true).unwrap();
      assert_eq!(kwarg(&tree, "s", "c", 0, "key"), &json!("explicit"));
    }

    #[test]
    fn disabled_resolution_leaves_unset_values() {
      let mut tree = shaped(json!({
        "s": {"c": {"steps": [["set", {"key": null}]]}},
        "key": {"conf": {"init": "b"}},
      }));
      resolve(&mut tree, false).unwrap();
      assert_eq!(kwarg(&tree, "s", "c", 0, "key"), &json!(null));
    }
  }

  #[test]
  fn is_unset_follows_truthiness() {
    assert!(is_unset(&json!(null)));
    assert!(is_unset(&json!(false)));
    assert!(is_unset(&json!(0)));
    assert!(is_unset(&json!("")));
    assert!(is_unset(&json!([])));
    assert!(is_unset(&json!({})));
    assert!(!is_unset(&json!(true)));
    assert!(!is_unset(&json!(1)));
    assert!(!is_unset(&json!("x")));
  }
}
