//! Sequential builder runtime
//!
//! Executes the scheduled plan strictly one entry at a time against the
//! shared objects store: seed resolution, decorated producer construction,
//! method-table patching, decorated step invocation with cross-object
//! reference substitution, and store insertion.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::BuildError;
use crate::producer::{Arg, DecoratorCx, DecoratorFn, Kwargs, ProducerInstance};
use crate::registry::Registry;
use crate::schedule::Scheduled;
use crate::store::{Object, ObjectsStore};
use crate::tree::{INIT_STEP, Seed, Step, SubConfig};

/// Execute the ordered plan, appending each result to the store.
///
/// A failure aborts immediately; the store then reflects only the
/// sub-configurations that completed.
pub fn execute(
  plan: Vec<Scheduled>,
  mut objects: ObjectsStore,
  registry: &Registry,
) -> Result<ObjectsStore, BuildError> {
  for entry in plan {
    debug!(oid = %entry.oid, priority = entry.priority, "building configuration");
    let object = build_one(&entry.oid, entry.config, &objects, registry)?;
    objects.insert(entry.oid, object);
  }
  Ok(objects)
}

/// Build a single sub-configuration against the current store.
fn build_one(
  oid: &str,
  config: SubConfig,
  objects: &ObjectsStore,
  registry: &Registry,
) -> Result<Object, BuildError> {
  let seed = match &config.init {
    Seed::Literal(value) => Object::value(value.clone()),
    Seed::Factory(name) => {
      let factory = registry.seed(name).ok_or_else(|| BuildError::MissingReference {
        oid: oid.to_string(),
        name: format!("seed factory '{name}'"),
      })?;
      factory(registry)?
    }
  };

  let mut steps = config.steps;
  let (ctor_kwargs, ctor_decorators) = extract_init_step(oid, &mut steps)?;
  let mut instance = construct(oid, &config.producer, ctor_kwargs, &ctor_decorators, objects, registry)?;
  apply_patch(oid, &mut instance, &config.patch, registry)?;

  instance.cx.logger.info(&format!("|__ configuration: {oid}"));
  if objects.contains(oid) {
    instance.cx.logger.warn(&format!(
      "identifier '{oid}' is already in the store, its object will be replaced"
    ));
  }

  let mut result = seed;
  for step in steps {
    let Step {
      method: method_name,
      kwargs,
      decorators,
    } = step;
    instance.cx.logger.debug(&format!("    |__ {method_name}"));

    let method = instance
      .methods
      .get(&method_name)
      .cloned()
      .ok_or_else(|| BuildError::MissingReference {
        oid: oid.to_string(),
        name: method_name.clone(),
      })?;
    let kwargs = resolve_kwargs(kwargs, objects);
    let decorators = lookup_decorators(oid, &decorators, registry)?;

    let dcx = DecoratorCx {
      oid,
      method: &method_name,
    };
    let cx = &mut instance.cx;
    let mut current = Some(result);
    let mut raw = || -> Result<Object, BuildError> {
      let obj = current.take().ok_or_else(|| BuildError::Method {
        message: format!("step '{}' consumed its running object twice", dcx.method),
      })?;
      method(&mut *cx, obj, kwargs.clone())
    };
    result = compose(&decorators, &dcx, &mut raw)?;
  }

  // Identifier field of the envelope, set unconditionally.
  result.oid = Some(oid.to_string());
  Ok(result)
}

/// Construct the producer instance, decorators wrapping the construction
/// call.
fn construct(
  oid: &str,
  producer: &str,
  ctor_kwargs: BTreeMap<String, Value>,
  ctor_decorators: &[String],
  objects: &ObjectsStore,
  registry: &Registry,
) -> Result<ProducerInstance, BuildError> {
  let ctor = registry
    .producer(producer)
    .ok_or_else(|| BuildError::ProducerConstruction {
      oid: oid.to_string(),
      message: format!("unknown producer '{producer}'"),
    })?;
  let ctor_kwargs = resolve_kwargs(ctor_kwargs, objects);
  let decorators = lookup_decorators(oid, ctor_decorators, registry)?;

  let mut constructed = None;
  let dcx = DecoratorCx {
    oid,
    method: INIT_STEP,
  };
  let mut raw = || -> Result<Object, BuildError> {
    constructed = Some(ctor(objects, oid, ctor_kwargs.clone(), registry)?);
    Ok(Object::value(Value::Null))
  };
  compose(&decorators, &dcx, &mut raw)?;

  constructed.ok_or_else(|| BuildError::ProducerConstruction {
    oid: oid.to_string(),
    message: "a decorator never invoked the construction call".to_string(),
  })
}

/// Pull a leading `__init__` step out of the step list.
fn extract_init_step(
  oid: &str,
  steps: &mut Vec<Step>,
) -> Result<(BTreeMap<String, Value>, Vec<String>), BuildError> {
  match steps.iter().position(|step| step.method == INIT_STEP) {
    None => Ok((BTreeMap::new(), Vec::new())),
    Some(0) => {
      let step = steps.remove(0);
      Ok((step.kwargs, step.decorators))
    }
    Some(_) => Err(BuildError::InitStepMisplaced {
      oid: oid.to_string(),
    }),
  }
}

/// Bind patch entries into the instance's dispatch table.
///
/// A target naming a method in the pre-patch table is an alias resolved
/// against that snapshot; otherwise it names an entry in the registry's
/// method table.
fn apply_patch(
  oid: &str,
  instance: &mut ProducerInstance,
  patch: &BTreeMap<String, String>,
  registry: &Registry,
) -> Result<(), BuildError> {
  let base = instance.methods.clone();
  for (name, target) in patch {
    let method = if let Some(existing) = base.get(target) {
      existing.clone()
    } else if let Some(registered) = registry.method(target) {
      registered.clone()
    } else {
      return Err(BuildError::MissingReference {
        oid: oid.to_string(),
        name: target.clone(),
      });
    };
    instance.methods.insert(name.clone(), method);
  }
  Ok(())
}

/// Resolve raw kwargs against the store.
///
/// String values of non-`_id` arguments matching a composite id are
/// replaced with the stored object, scalars and top-level array elements
/// alike; `_id` arguments keep their identifier strings.
fn resolve_kwargs(raw: BTreeMap<String, Value>, objects: &ObjectsStore) -> Kwargs {
  let mut kwargs = Kwargs::new();
  for (name, value) in raw {
    let arg = if name.ends_with("_id") {
      Arg::Value(value)
    } else {
      resolve_value(value, objects)
    };
    kwargs.insert(name, arg);
  }
  kwargs
}

fn resolve_value(value: Value, objects: &ObjectsStore) -> Arg {
  match value {
    Value::String(s) => lookup_scalar(s, objects),
    Value::Array(items) => Arg::List(
      items
        .into_iter()
        .map(|item| match item {
          Value::String(s) => lookup_scalar(s, objects),
          other => Arg::Value(other),
        })
        .collect(),
    ),
    other => Arg::Value(other),
  }
}

fn lookup_scalar(id: String, objects: &ObjectsStore) -> Arg {
  match objects.get(&id) {
    Some(object) => Arg::Object(object.clone()),
    None => Arg::Value(Value::String(id)),
  }
}

fn lookup_decorators(
  oid: &str,
  names: &[String],
  registry: &Registry,
) -> Result<Vec<DecoratorFn>, BuildError> {
  names
    .iter()
    .map(|name| {
      registry
        .decorator(name)
        .cloned()
        .ok_or_else(|| BuildError::MissingReference {
          oid: oid.to_string(),
          name: format!("decorator '{name}'"),
        })
    })
    .collect()
}

/// Invoke `inner` wrapped by `decorators`, first decorator innermost.
fn compose(
  decorators: &[DecoratorFn],
  cx: &DecoratorCx<'_>,
  inner: &mut dyn FnMut() -> Result<Object, BuildError>,
) -> Result<Object, BuildError> {
  match decorators.split_last() {
    None => inner(),
    Some((outer, rest)) => outer(cx, &mut || compose(rest, cx, &mut *inner)),
  }
}
