//! Built objects and the shared objects store
//!
//! The store is the only shared mutable resource of a run: entries are
//! inserted once under their composite id and never mutated afterwards.
//! Later sub-configurations read earlier entries through kwarg
//! substitution.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use confect_platform::Logger;

/// Payload of a built object: plain data or a live runtime handle.
#[derive(Clone)]
pub enum Payload {
  /// JSON-shaped data.
  Value(Value),
  /// Opaque runtime object, e.g. an injected logger.
  Opaque(Arc<dyn Any + Send + Sync>),
}

/// A built object: payload plus the identifier it is stored under.
///
/// The identifier field is always present and assigned unconditionally by
/// the runtime when the object is finished.
#[derive(Clone)]
pub struct Object {
  pub oid: Option<String>,
  pub payload: Payload,
}

impl Object {
  /// Wrap a plain value.
  pub fn value(value: Value) -> Self {
    Self {
      oid: None,
      payload: Payload::Value(value),
    }
  }

  /// Wrap an opaque runtime handle.
  pub fn opaque<T: Any + Send + Sync>(inner: T) -> Self {
    Self {
      oid: None,
      payload: Payload::Opaque(Arc::new(inner)),
    }
  }

  /// Wrap a logger so it can live in the store.
  pub fn from_logger(logger: Arc<dyn Logger>) -> Self {
    Self::opaque(LoggerHandle(logger))
  }

  /// Borrow the JSON payload, if this is a plain value.
  pub fn as_value(&self) -> Option<&Value> {
    match &self.payload {
      Payload::Value(value) => Some(value),
      Payload::Opaque(_) => None,
    }
  }

  /// Borrow the payload as a string.
  pub fn as_str(&self) -> Option<&str> {
    self.as_value().and_then(Value::as_str)
  }

  /// Downcast an opaque payload.
  pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
    match &self.payload {
      Payload::Opaque(any) => any.downcast_ref::<T>(),
      Payload::Value(_) => None,
    }
  }

  /// Extract a logger previously stored with [`Object::from_logger`].
  pub fn as_logger(&self) -> Option<Arc<dyn Logger>> {
    self.downcast::<LoggerHandle>().map(|handle| handle.0.clone())
  }
}

impl fmt::Debug for Object {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.payload {
      Payload::Value(value) => f
        .debug_struct("Object")
        .field("oid", &self.oid)
        .field("payload", value)
        .finish(),
      Payload::Opaque(_) => f
        .debug_struct("Object")
        .field("oid", &self.oid)
        .field("payload", &"<opaque>")
        .finish(),
    }
  }
}

impl PartialEq for Object {
  fn eq(&self, other: &Self) -> bool {
    if self.oid != other.oid {
      return false;
    }
    match (&self.payload, &other.payload) {
      (Payload::Value(a), Payload::Value(b)) => a == b,
      (Payload::Opaque(a), Payload::Opaque(b)) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}

/// Store wrapper for an injectable logger.
pub struct LoggerHandle(pub Arc<dyn Logger>);

/// Run-scoped map of finished objects, keyed by composite id.
///
/// Iteration order is insertion order, which for a finished run is
/// execution order.
#[derive(Debug, Clone, Default)]
pub struct ObjectsStore {
  entries: IndexMap<String, Arc<Object>>,
}

impl ObjectsStore {
  /// Create an empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert an object, returning the previous entry if one existed.
  pub fn insert(&mut self, oid: impl Into<String>, object: Object) -> Option<Arc<Object>> {
    self.entries.insert(oid.into(), Arc::new(object))
  }

  /// Look up an object by composite id.
  pub fn get(&self, oid: &str) -> Option<&Arc<Object>> {
    self.entries.get(oid)
  }

  /// Whether an object exists under `oid`.
  pub fn contains(&self, oid: &str) -> bool {
    self.entries.contains_key(oid)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Composite ids in insertion order.
  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }

  /// Entries in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Object>)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use confect_platform::NullLogger;
  use serde_json::json;

  #[test]
  fn insert_and_get() {
    let mut store = ObjectsStore::new();
    assert!(store.is_empty());

    store.insert("s__c", Object::value(json!({"a": 7})));
    assert_eq!(store.len(), 1);
    assert!(store.contains("s__c"));
    assert_eq!(store.get("s__c").unwrap().as_value(), Some(&json!({"a": 7})));
  }

  #[test]
  fn insert_returns_previous_entry() {
    let mut store = ObjectsStore::new();
    store.insert("s__c", Object::value(json!(1)));
    let previous = store.insert("s__c", Object::value(json!(2)));
    assert_eq!(previous.unwrap().as_value(), Some(&json!(1)));
    assert_eq!(store.get("s__c").unwrap().as_value(), Some(&json!(2)));
  }

  #[test]
  fn keys_preserve_insertion_order() {
    let mut store = ObjectsStore::new();
    store.insert("b__1", Object::value(json!(null)));
    store.insert("a__1", Object::value(json!(null)));
    let keys: Vec<_> = store.keys().collect();
    assert_eq!(keys, ["b__1", "a__1"]);
  }

  #[test]
  fn logger_round_trips_through_the_store() {
    let logger: Arc<dyn Logger> = Arc::new(NullLogger);
    let object = Object::from_logger(logger);
    assert!(object.as_logger().is_some());
    assert!(object.as_value().is_none());
  }

  #[test]
  fn opaque_objects_compare_by_identity() {
    let a = Object::opaque(42_u32);
    let b = a.clone();
    assert_eq!(a, b);
    assert_ne!(a, Object::opaque(42_u32));
  }
}
