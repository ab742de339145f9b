//! Registered vocabulary: producers, methods, decorators, seeds, codecs
//!
//! The configuration tree stays serializable by naming everything with
//! string keys; this module owns the tables those keys resolve against,
//! plus the injected collaborators the runtime hands to producers.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::codec::{Codec, JsonCodec};
use crate::error::BuildError;
use crate::producer::{
  DecoratorCx, DecoratorFn, Kwargs, MethodFn, ProducerCtor, ProducerCx, ProducerInstance,
  base_producer,
};
use crate::store::{Object, ObjectsStore};
use confect_platform::{
  CacheStore, FsCacheStore, Logger, PathProvider, TracingLogger, WorkingDirProvider,
};

/// Zero-argument seed factory, invoked when a sub-configuration's `init`
/// names it.
pub type SeedFn = Arc<dyn Fn(&Registry) -> Result<Object, BuildError> + Send + Sync>;

/// String-keyed lookup tables plus injected collaborators.
#[derive(Clone)]
pub struct Registry {
  producers: BTreeMap<String, ProducerCtor>,
  methods: BTreeMap<String, MethodFn>,
  decorators: BTreeMap<String, DecoratorFn>,
  seeds: BTreeMap<String, SeedFn>,
  pub(crate) codecs: BTreeMap<String, Arc<dyn Codec>>,
  pub(crate) cache: Arc<dyn CacheStore>,
  pub(crate) paths: Arc<dyn PathProvider>,
  pub(crate) logger: Arc<dyn Logger>,
}

impl Default for Registry {
  /// Registry with the built-in vocabulary: the `base` producer, the
  /// `json` codec, and the `path.project` / `logger.tracing` seed
  /// factories backing the default tree.
  fn default() -> Self {
    let mut registry = Self {
      producers: BTreeMap::new(),
      methods: BTreeMap::new(),
      decorators: BTreeMap::new(),
      seeds: BTreeMap::new(),
      codecs: BTreeMap::new(),
      cache: Arc::new(FsCacheStore),
      paths: Arc::new(WorkingDirProvider),
      logger: Arc::new(TracingLogger),
    };
    let base: ProducerCtor = Arc::new(base_producer);
    registry.producers.insert("base".to_string(), base);
    registry
      .codecs
      .insert("json".to_string(), Arc::new(JsonCodec));

    let path_seed: SeedFn = Arc::new(|registry: &Registry| {
      let dir = registry.paths.project_dir()?;
      Ok(Object::value(dir.to_string_lossy().into_owned().into()))
    });
    registry.seeds.insert("path.project".to_string(), path_seed);

    let logger_seed: SeedFn =
      Arc::new(|registry: &Registry| Ok(Object::from_logger(registry.logger.clone())));
    registry
      .seeds
      .insert("logger.tracing".to_string(), logger_seed);

    registry
  }
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a producer constructor.
  pub fn with_producer<F>(mut self, name: &str, ctor: F) -> Self
  where
    F: Fn(&ObjectsStore, &str, Kwargs, &Registry) -> Result<ProducerInstance, BuildError>
      + Send
      + Sync
      + 'static,
  {
    self.producers.insert(name.to_string(), Arc::new(ctor));
    self
  }

  /// Register a step method available to `patch`.
  pub fn with_method<F>(mut self, name: &str, method: F) -> Self
  where
    F: Fn(&mut ProducerCx, Object, Kwargs) -> Result<Object, BuildError> + Send + Sync + 'static,
  {
    self.methods.insert(name.to_string(), Arc::new(method));
    self
  }

  /// Register a step decorator.
  pub fn with_decorator<F>(mut self, name: &str, decorator: F) -> Self
  where
    F: Fn(&DecoratorCx<'_>, &mut dyn FnMut() -> Result<Object, BuildError>) -> Result<Object, BuildError>
      + Send
      + Sync
      + 'static,
  {
    self.decorators.insert(name.to_string(), Arc::new(decorator));
    self
  }

  /// Register a seed factory.
  pub fn with_seed<F>(mut self, name: &str, seed: F) -> Self
  where
    F: Fn(&Registry) -> Result<Object, BuildError> + Send + Sync + 'static,
  {
    self.seeds.insert(name.to_string(), Arc::new(seed));
    self
  }

  /// Register a codec.
  pub fn with_codec(mut self, name: &str, codec: Arc<dyn Codec>) -> Self {
    self.codecs.insert(name.to_string(), codec);
    self
  }

  /// Replace the injected cache store.
  pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
    self.cache = cache;
    self
  }

  /// Replace the injected path provider.
  pub fn with_paths(mut self, paths: Arc<dyn PathProvider>) -> Self {
    self.paths = paths;
    self
  }

  /// Replace the default logger.
  pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
    self.logger = logger;
    self
  }

  pub fn has_producer(&self, name: &str) -> bool {
    self.producers.contains_key(name)
  }

  pub fn has_seed(&self, name: &str) -> bool {
    self.seeds.contains_key(name)
  }

  pub fn has_decorator(&self, name: &str) -> bool {
    self.decorators.contains_key(name)
  }

  pub fn producer(&self, name: &str) -> Option<&ProducerCtor> {
    self.producers.get(name)
  }

  pub fn method(&self, name: &str) -> Option<&MethodFn> {
    self.methods.get(name)
  }

  pub fn decorator(&self, name: &str) -> Option<&DecoratorFn> {
    self.decorators.get(name)
  }

  pub fn seed(&self, name: &str) -> Option<&SeedFn> {
    self.seeds.get(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn built_in_vocabulary_is_registered() {
    let registry = Registry::default();
    assert!(registry.has_producer("base"));
    assert!(registry.has_seed("path.project"));
    assert!(registry.has_seed("logger.tracing"));
    assert!(registry.codecs.contains_key("json"));
  }

  #[test]
  fn custom_entries_are_found() {
    let registry = Registry::default()
      .with_method("touch", |_cx, obj, _kwargs| Ok(obj))
      .with_decorator("pass", |_cx, inner| inner())
      .with_seed("zero", |_registry| Ok(Object::value(json!(0))));

    assert!(registry.method("touch").is_some());
    assert!(registry.has_decorator("pass"));
    assert!(registry.has_seed("zero"));
    assert!(!registry.has_producer("nope"));
  }

  #[test]
  fn logger_seed_wraps_the_registry_logger() {
    let registry = Registry::default();
    let seed = registry.seed("logger.tracing").unwrap().clone();
    let object = seed(&registry).unwrap();
    assert!(object.as_logger().is_some());
  }
}
