//! One-call pipeline: normalize, resolve, schedule, execute

use serde_json::Value;
use tracing::info;

use crate::defaults;
use crate::error::RunError;
use crate::execute::execute;
use crate::normalize::normalize;
use crate::registry::Registry;
use crate::resolve::resolve;
use crate::schedule::schedule;
use crate::store::ObjectsStore;

/// Options for [`run`].
#[derive(Debug, Default)]
pub struct RunOptions {
  /// Default tree merged beneath the raw tree. `None` uses the built-in
  /// defaults; pass an empty tree to disable defaulting.
  pub default_tree: Option<Value>,
  /// Objects pre-accommodated in the store before execution.
  pub seed_objects: Option<ObjectsStore>,
  /// Enable unset-reference resolution.
  pub resolve_unset: bool,
}

/// Resolve a raw configuration tree and execute it.
///
/// The store handed back contains every built object keyed by composite
/// id, plus whatever the caller pre-seeded.
pub fn run(raw: &Value, options: RunOptions, registry: &Registry) -> Result<ObjectsStore, RunError> {
  let default_tree = options
    .default_tree
    .unwrap_or_else(defaults::default_tree);
  let mut tree = normalize(raw, &default_tree, registry)?;
  resolve(&mut tree, options.resolve_unset)?;
  let plan = schedule(&tree)?;
  info!(configurations = plan.len(), "executing plan");
  let objects = options.seed_objects.unwrap_or_default();
  Ok(execute(plan, objects, registry)?)
}
