//! Typed configuration model
//!
//! A configuration tree maps section ids to sub-configurations; each
//! sub-configuration describes how to build one object: a seed, a producer,
//! optional method patches, ordered build steps, a global override map, and
//! an execution priority.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::error::ResolveError;
use crate::registry::Registry;

/// The six keys every sub-configuration owns after shaping.
pub const STRUCTURAL_KEYS: [&str; 6] = ["init", "producer", "patch", "steps", "global", "priority"];

/// Reserved id for the override map at tree and section level.
pub const GLOBAL_KEY: &str = "global";

/// Marker key denoting a seed-factory reference in a raw tree.
pub const FACTORY_KEY: &str = "$factory";

/// Name of the pseudo-step that supplies producer constructor arguments.
pub const INIT_STEP: &str = "__init__";

/// Compose the store key for a section/configuration pair.
pub fn compose_id(section: &str, config: &str) -> String {
  format!("{section}__{config}")
}

/// Initial state for a build: a literal value or a registered factory.
#[derive(Debug, Clone, PartialEq)]
pub enum Seed {
  /// Use the value itself as the seed object.
  Literal(Value),
  /// Invoke the named zero-argument factory from the registry.
  Factory(String),
}

/// One ordered build operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
  /// Producer method to invoke.
  pub method: String,
  /// Arguments for the method, before override application and object
  /// substitution.
  pub kwargs: BTreeMap<String, Value>,
  /// Registered decorator names, first entry wrapping the raw call.
  pub decorators: Vec<String>,
}

/// Recipe for building one object.
#[derive(Debug, Clone, PartialEq)]
pub struct SubConfig {
  pub init: Seed,
  pub producer: String,
  pub patch: BTreeMap<String, String>,
  pub steps: Vec<Step>,
  pub global: BTreeMap<String, Value>,
  /// Raw priority value; validated by the scheduler.
  pub priority: Value,
  /// Unknown keys, absorbed into `global` during resolution.
  pub extra: BTreeMap<String, Value>,
}

impl Default for SubConfig {
  fn default() -> Self {
    Self {
      init: Seed::Literal(json!({})),
      producer: "base".to_string(),
      patch: BTreeMap::new(),
      steps: Vec::new(),
      global: BTreeMap::new(),
      priority: json!(1),
      extra: BTreeMap::new(),
    }
  }
}

/// A named group of sub-configurations plus its own override map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
  pub global: BTreeMap<String, Value>,
  pub configs: IndexMap<String, SubConfig>,
}

/// Fully shaped configuration tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigTree {
  pub global: BTreeMap<String, Value>,
  pub sections: IndexMap<String, Section>,
}

impl ConfigTree {
  /// Shape a raw value tree into the typed model.
  ///
  /// Missing structural keys get their built-in defaults, steps are
  /// normalized to the full three-element shape, and producer, factory,
  /// and decorator names are checked against the registry.
  pub fn from_value(raw: &Value, registry: &Registry) -> Result<Self, ResolveError> {
    let map = as_object(raw, "<tree>", "configuration tree")?;
    let mut tree = ConfigTree::default();
    for (section_id, section_raw) in map {
      if section_id == GLOBAL_KEY {
        tree.global = shape_global("<tree>", section_raw)?;
        continue;
      }
      let section = Section::from_value(section_id, section_raw, registry)?;
      tree.sections.insert(section_id.clone(), section);
    }
    Ok(tree)
  }

  /// Serialize back to the raw-tree shape.
  pub fn to_value(&self) -> Value {
    let mut map = Map::new();
    if !self.global.is_empty() {
      map.insert(GLOBAL_KEY.to_string(), to_object(&self.global));
    }
    for (section_id, section) in &self.sections {
      map.insert(section_id.clone(), section.to_value());
    }
    Value::Object(map)
  }
}

impl Section {
  fn from_value(section_id: &str, raw: &Value, registry: &Registry) -> Result<Self, ResolveError> {
    let map = as_object(raw, section_id, "section")?;
    let mut section = Section::default();
    for (config_id, config_raw) in map {
      if config_id == GLOBAL_KEY {
        section.global = shape_global(section_id, config_raw)?;
        continue;
      }
      let at = compose_id(section_id, config_id);
      let config = SubConfig::from_value(&at, config_raw, registry)?;
      section.configs.insert(config_id.clone(), config);
    }
    Ok(section)
  }

  fn to_value(&self) -> Value {
    let mut map = Map::new();
    if !self.global.is_empty() {
      map.insert(GLOBAL_KEY.to_string(), to_object(&self.global));
    }
    for (config_id, config) in &self.configs {
      map.insert(config_id.clone(), config.to_value());
    }
    Value::Object(map)
  }
}

impl SubConfig {
  fn from_value(at: &str, raw: &Value, registry: &Registry) -> Result<Self, ResolveError> {
    let map = as_object(raw, at, "sub-configuration")?;
    let mut config = SubConfig::default();
    for (key, value) in map {
      match key.as_str() {
        "init" => config.init = shape_seed(at, value, registry)?,
        "producer" => config.producer = shape_producer(at, value, registry)?,
        "patch" => config.patch = shape_patch(at, value)?,
        "steps" => config.steps = shape_steps(at, value, registry)?,
        "global" => config.global = shape_global(at, value)?,
        "priority" => config.priority = value.clone(),
        _ => {
          config.extra.insert(key.clone(), value.clone());
        }
      }
    }
    Ok(config)
  }

  fn to_value(&self) -> Value {
    let mut map = Map::new();
    let init = match &self.init {
      Seed::Literal(value) => value.clone(),
      Seed::Factory(name) => json!({ FACTORY_KEY: name }),
    };
    map.insert("init".to_string(), init);
    map.insert("producer".to_string(), Value::String(self.producer.clone()));
    map.insert(
      "patch".to_string(),
      Value::Object(
        self
          .patch
          .iter()
          .map(|(k, v)| (k.clone(), Value::String(v.clone())))
          .collect(),
      ),
    );
    map.insert(
      "steps".to_string(),
      Value::Array(self.steps.iter().map(Step::to_value).collect()),
    );
    map.insert("global".to_string(), to_object(&self.global));
    map.insert("priority".to_string(), self.priority.clone());
    for (key, value) in &self.extra {
      map.insert(key.clone(), value.clone());
    }
    Value::Object(map)
  }
}

impl Step {
  fn to_value(&self) -> Value {
    json!([
      self.method,
      to_object(&self.kwargs),
      self.decorators.iter().map(|d| json!(d)).collect::<Vec<_>>(),
    ])
  }
}

fn shape_seed(at: &str, raw: &Value, registry: &Registry) -> Result<Seed, ResolveError> {
  if let Value::Object(map) = raw
    && map.len() == 1
    && let Some(name) = map.get(FACTORY_KEY)
  {
    let Value::String(name) = name else {
      return Err(ResolveError::structure(at, "factory name must be a string"));
    };
    if !registry.has_seed(name) {
      return Err(ResolveError::structure(
        at,
        format!("unknown seed factory '{name}'"),
      ));
    }
    return Ok(Seed::Factory(name.clone()));
  }
  Ok(Seed::Literal(raw.clone()))
}

fn shape_producer(at: &str, raw: &Value, registry: &Registry) -> Result<String, ResolveError> {
  let Value::String(name) = raw else {
    return Err(ResolveError::structure(at, "producer must be a string name"));
  };
  if !registry.has_producer(name) {
    return Err(ResolveError::structure(
      at,
      format!("unknown producer '{name}'"),
    ));
  }
  Ok(name.clone())
}

fn shape_patch(at: &str, raw: &Value) -> Result<BTreeMap<String, String>, ResolveError> {
  let map = as_object(raw, at, "patch")?;
  let mut patch = BTreeMap::new();
  for (name, target) in map {
    let Value::String(target) = target else {
      return Err(ResolveError::structure(
        at,
        format!("patch entry '{name}' must name a method"),
      ));
    };
    patch.insert(name.clone(), target.clone());
  }
  Ok(patch)
}

fn shape_steps(at: &str, raw: &Value, registry: &Registry) -> Result<Vec<Step>, ResolveError> {
  let Value::Array(items) = raw else {
    return Err(ResolveError::structure(at, "steps must be an array"));
  };
  let mut steps = Vec::with_capacity(items.len());
  for item in items {
    let Value::Array(parts) = item else {
      return Err(ResolveError::structure(at, "each step must be an array"));
    };
    let method = match parts.first() {
      Some(Value::String(method)) => method.clone(),
      _ => return Err(ResolveError::structure(at, "step method id must be a string")),
    };
    let at_step = format!("{at}: {method}");
    if parts.len() > 3 {
      return Err(ResolveError::structure(
        at_step.as_str(),
        "step must have at most three elements",
      ));
    }
    let kwargs = match parts.get(1) {
      None => BTreeMap::new(),
      Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
      Some(_) => return Err(ResolveError::structure(at_step.as_str(), "step kwargs must be an object")),
    };
    let decorators = match parts.get(2) {
      None => Vec::new(),
      Some(Value::Array(names)) => shape_decorators(&at_step, names, registry)?,
      Some(_) => {
        return Err(ResolveError::structure(
          at_step.as_str(),
          "step decorators must be an array",
        ));
      }
    };
    steps.push(Step {
      method,
      kwargs,
      decorators,
    });
  }
  Ok(steps)
}

fn shape_decorators(
  at: &str,
  names: &[Value],
  registry: &Registry,
) -> Result<Vec<String>, ResolveError> {
  let mut decorators = Vec::with_capacity(names.len());
  for name in names {
    let Value::String(name) = name else {
      return Err(ResolveError::structure(
        at,
        "step decorators must be an array of names",
      ));
    };
    if !registry.has_decorator(name) {
      return Err(ResolveError::structure(
        at,
        format!("unknown decorator '{name}'"),
      ));
    }
    decorators.push(name.clone());
  }
  Ok(decorators)
}

fn shape_global(at: &str, raw: &Value) -> Result<BTreeMap<String, Value>, ResolveError> {
  let map = as_object(raw, at, "global")?;
  Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
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

fn to_object(map: &BTreeMap<String, Value>) -> Value {
  Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}
