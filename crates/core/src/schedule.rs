//! Priority scheduling
//!
//! Flattens a resolved tree into the totally ordered execution plan:
//! ascending by priority, ties broken by composite id, so the plan is
//! deterministic for any tree.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::ResolveError;
use crate::tree::{ConfigTree, SubConfig, compose_id};

/// One entry of the execution plan.
#[derive(Debug, Clone)]
pub struct Scheduled {
  /// Composite id the built object will be stored under.
  pub oid: String,
  /// Effective execution priority (always >= 1).
  pub priority: u64,
  /// The sub-configuration to execute.
  pub config: SubConfig,
}

/// Flatten the tree into execution order.
///
/// Lower priority numbers execute earlier. `priority == 0` entries are
/// validated but excluded from the plan; they may still be referenced
/// structurally.
pub fn schedule(tree: &ConfigTree) -> Result<Vec<Scheduled>, ResolveError> {
  let mut entries = Vec::new();
  let mut seen = BTreeSet::new();

  for (section_id, section) in &tree.sections {
    for (config_id, config) in &section.configs {
      let oid = compose_id(section_id, config_id);
      let priority = parse_priority(&oid, &config.priority)?;
      if priority == 0 {
        continue;
      }
      if !seen.insert(oid.clone()) {
        return Err(ResolveError::DuplicateId { oid });
      }
      entries.push(Scheduled {
        oid,
        priority,
        config: config.clone(),
      });
    }
  }

  entries.sort_by(|a, b| (a.priority, a.oid.as_str()).cmp(&(b.priority, b.oid.as_str())));
  Ok(entries)
}

fn parse_priority(oid: &str, value: &Value) -> Result<u64, ResolveError> {
  value.as_u64().ok_or_else(|| ResolveError::Priority {
    oid: oid.to_string(),
    value: value.clone(),
  })
}
