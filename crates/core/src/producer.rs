//! Producer instances: context, method tables, and the base producer
//!
//! A producer's callable surface is an explicit per-instance dispatch map
//! from method name to function, populated at construction from a base
//! table plus `patch` entries. Every method receives the shared context,
//! the running object, and its resolved kwargs, and returns the new
//! running object.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::Codec;
use crate::error::BuildError;
use crate::registry::Registry;
use crate::store::{Object, ObjectsStore, Payload};
use confect_platform::{CacheStore, Logger, resolve_cache_dir};

/// Resolved step argument: plain value, store object, or a mixed list.
#[derive(Debug, Clone)]
pub enum Arg {
  Value(Value),
  Object(Arc<Object>),
  List(Vec<Arg>),
}

impl Arg {
  /// Borrow as a JSON value, looking through a store object's payload.
  pub fn as_value(&self) -> Option<&Value> {
    match self {
      Arg::Value(value) => Some(value),
      Arg::Object(object) => object.as_value(),
      Arg::List(_) => None,
    }
  }

  /// Borrow as a string.
  pub fn as_str(&self) -> Option<&str> {
    self.as_value().and_then(Value::as_str)
  }

  /// Borrow the store object, if this argument was substituted.
  pub fn as_object(&self) -> Option<&Arc<Object>> {
    match self {
      Arg::Object(object) => Some(object),
      _ => None,
    }
  }

  /// Borrow the list elements, if this argument was a sequence.
  pub fn as_list(&self) -> Option<&[Arg]> {
    match self {
      Arg::List(items) => Some(items),
      _ => None,
    }
  }

  /// Convert to a plain value where possible, object payloads included.
  pub fn to_value(&self) -> Option<Value> {
    match self {
      Arg::Value(value) => Some(value.clone()),
      Arg::Object(object) => object.as_value().cloned(),
      Arg::List(items) => items
        .iter()
        .map(Arg::to_value)
        .collect::<Option<Vec<_>>>()
        .map(Value::Array),
    }
  }
}

/// Resolved arguments for one step invocation.
#[derive(Debug, Clone, Default)]
pub struct Kwargs {
  entries: BTreeMap<String, Arg>,
}

impl Kwargs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, arg: Arg) {
    self.entries.insert(name.into(), arg);
  }

  pub fn get(&self, name: &str) -> Option<&Arg> {
    self.entries.get(name)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// Required argument, error when absent.
  pub fn required(&self, name: &str) -> Result<&Arg, BuildError> {
    self.get(name).ok_or_else(|| BuildError::MissingArgument {
      name: name.to_string(),
    })
  }

  /// Optional string argument; `null` counts as absent.
  pub fn str_opt(&self, name: &str) -> Result<Option<&str>, BuildError> {
    let Some(arg) = self.get(name) else {
      return Ok(None);
    };
    match arg.as_value() {
      Some(Value::Null) => Ok(None),
      Some(Value::String(s)) => Ok(Some(s)),
      _ => Err(BuildError::BadArgument {
        name: name.to_string(),
        message: "expected a string".to_string(),
      }),
    }
  }
}

impl IntoIterator for Kwargs {
  type Item = (String, Arg);
  type IntoIter = std::collections::btree_map::IntoIter<String, Arg>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.into_iter()
  }
}

impl FromIterator<(String, Arg)> for Kwargs {
  fn from_iter<T: IntoIterator<Item = (String, Arg)>>(iter: T) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}

/// One step implementation bound into a producer's method table.
pub type MethodFn = Arc<dyn Fn(&mut ProducerCx, Object, Kwargs) -> Result<Object, BuildError> + Send + Sync>;

/// Context handed to a decorator invocation.
pub struct DecoratorCx<'a> {
  /// Composite id being built.
  pub oid: &'a str,
  /// Method (or `__init__`) being wrapped.
  pub method: &'a str,
}

/// Wrapper around a step or construction call.
///
/// Receives the decorator context and the inner call; invoking the inner
/// call runs the next decorator inward, the raw call at the end of the
/// chain.
pub type DecoratorFn = Arc<
  dyn Fn(&DecoratorCx<'_>, &mut dyn FnMut() -> Result<Object, BuildError>) -> Result<Object, BuildError>
    + Send
    + Sync,
>;

/// Producer constructor, invoked once per sub-configuration with the store,
/// the composite id, and the resolved `__init__` kwargs.
pub type ProducerCtor = Arc<
  dyn Fn(&ObjectsStore, &str, Kwargs, &Registry) -> Result<ProducerInstance, BuildError>
    + Send
    + Sync,
>;

/// Per-build execution context shared by all methods of one producer.
pub struct ProducerCx {
  /// Composite id of the object being built.
  pub oid: String,
  /// Logger the runtime and methods report through.
  pub logger: Arc<dyn Logger>,
  /// Base directory for cache operations.
  pub project_path: PathBuf,
  /// Leftover constructor kwargs, available to methods as instance state.
  pub vars: BTreeMap<String, Value>,
  codecs: BTreeMap<String, Arc<dyn Codec>>,
  cache: Arc<dyn CacheStore>,
}

impl std::fmt::Debug for ProducerCx {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProducerCx")
      .field("oid", &self.oid)
      .field("project_path", &self.project_path)
      .field("vars", &self.vars)
      .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
      .finish_non_exhaustive()
  }
}

impl ProducerCx {
  /// Assemble a context the way the base producer does.
  ///
  /// `logger_id` / `path_id` constructor kwargs select entries from the
  /// store; absent (or null) the registry's default logger and the path
  /// provider's directory are used. Remaining kwargs become instance
  /// variables.
  pub fn new(
    objects: &ObjectsStore,
    oid: &str,
    kwargs: Kwargs,
    registry: &Registry,
  ) -> Result<Self, BuildError> {
    let mut logger = None;
    let mut project_path = None;
    let mut vars = BTreeMap::new();

    for (name, arg) in kwargs {
      match name.as_str() {
        "logger_id" => {
          if let Some(id) = str_kwarg(&name, &arg)? {
            let object = lookup(objects, oid, id)?;
            let found = object.as_logger().ok_or_else(|| BuildError::BadArgument {
              name: name.clone(),
              message: format!("store entry '{id}' is not a logger"),
            })?;
            logger = Some(found);
          }
        }
        "path_id" => {
          if let Some(id) = str_kwarg(&name, &arg)? {
            let object = lookup(objects, oid, id)?;
            let path = object.as_str().ok_or_else(|| BuildError::BadArgument {
              name: name.clone(),
              message: format!("store entry '{id}' is not a path string"),
            })?;
            project_path = Some(PathBuf::from(path));
          }
        }
        _ => {
          if let Some(value) = arg.to_value() {
            vars.insert(name, value);
          }
        }
      }
    }

    let logger = match logger {
      Some(logger) => logger,
      None => registry.logger.clone(),
    };
    let project_path = match project_path {
      Some(path) => path,
      None => registry.paths.project_dir()?,
    };

    Ok(Self {
      oid: oid.to_string(),
      logger,
      project_path,
      vars,
      codecs: registry.codecs.clone(),
      cache: registry.cache.clone(),
    })
  }

  /// Look up a registered codec by name.
  pub fn codec(&self, name: &str) -> Result<&Arc<dyn Codec>, BuildError> {
    self.codecs.get(name).ok_or_else(|| BuildError::MissingReference {
      oid: self.oid.clone(),
      name: format!("codec '{name}'"),
    })
  }

  /// Resolve the cache directory, file name, and codec for a cache step.
  fn cache_target(&self, kwargs: &Kwargs) -> Result<(PathBuf, String, String), BuildError> {
    let prefix = kwargs.str_opt("prefix")?.unwrap_or(self.oid.as_str());
    let dir = match kwargs.str_opt("cachedir")? {
      Some(raw) => resolve_cache_dir(raw, &self.project_path)?,
      None => self.project_path.join(".cache").join("objects"),
    };
    let codec = kwargs.str_opt("codec")?.unwrap_or("json").to_string();
    Ok((dir, format!("{prefix}.cache"), codec))
  }
}

fn str_kwarg<'a>(name: &str, arg: &'a Arg) -> Result<Option<&'a str>, BuildError> {
  match arg.as_value() {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(_) => Err(BuildError::BadArgument {
      name: name.to_string(),
      message: "expected a composite id string".to_string(),
    }),
  }
}

fn lookup<'a>(
  objects: &'a ObjectsStore,
  oid: &str,
  id: &str,
) -> Result<&'a Arc<Object>, BuildError> {
  objects.get(id).ok_or_else(|| BuildError::MissingReference {
    oid: oid.to_string(),
    name: id.to_string(),
  })
}

/// A constructed producer: execution context plus its dispatch table.
pub struct ProducerInstance {
  pub cx: ProducerCx,
  pub methods: BTreeMap<String, MethodFn>,
}

impl ProducerInstance {
  /// The base dispatch table shared by every producer: cache operations.
  pub fn base_methods() -> BTreeMap<String, MethodFn> {
    let mut methods: BTreeMap<String, MethodFn> = BTreeMap::new();
    methods.insert("dump_cache".to_string(), Arc::new(dump_cache));
    methods.insert("load_cache".to_string(), Arc::new(load_cache));
    methods
  }
}

/// Constructor for the built-in `base` producer.
pub fn base_producer(
  objects: &ObjectsStore,
  oid: &str,
  kwargs: Kwargs,
  registry: &Registry,
) -> Result<ProducerInstance, BuildError> {
  let cx = ProducerCx::new(objects, oid, kwargs, registry)?;
  Ok(ProducerInstance {
    cx,
    methods: ProducerInstance::base_methods(),
  })
}

/// Encode the running object's payload and hand it to the cache store.
///
/// The object itself passes through unchanged. Kwargs: `prefix` (default
/// the composite id), `cachedir` (default `<project>/.cache/objects`),
/// `codec` (default `json`; a store-substituted object carrying a string
/// payload also works).
pub fn dump_cache(cx: &mut ProducerCx, obj: Object, kwargs: Kwargs) -> Result<Object, BuildError> {
  let Payload::Value(value) = &obj.payload else {
    return Err(BuildError::Cache {
      oid: cx.oid.clone(),
      message: "cannot encode an opaque object".to_string(),
    });
  };
  let (dir, name, codec) = cx.cache_target(&kwargs)?;
  let bytes = cx
    .codec(&codec)?
    .encode(value)
    .map_err(|e| BuildError::Cache {
      oid: cx.oid.clone(),
      message: e.to_string(),
    })?;
  let path = cx.cache.write(&dir, &name, &bytes)?;
  cx.logger.warn(&format!("updated cache file {}", path.display()));
  Ok(obj)
}

/// Replace the running object's payload with previously cached state.
pub fn load_cache(cx: &mut ProducerCx, _obj: Object, kwargs: Kwargs) -> Result<Object, BuildError> {
  let (dir, name, codec) = cx.cache_target(&kwargs)?;
  let bytes = cx.cache.read(&dir, &name)?;
  let value = cx
    .codec(&codec)?
    .decode(&bytes)
    .map_err(|e| BuildError::Cache {
      oid: cx.oid.clone(),
      message: e.to_string(),
    })?;
  cx.logger.warn(&format!("loaded cache from {}", dir.display()));
  Ok(Object::value(value))
}
