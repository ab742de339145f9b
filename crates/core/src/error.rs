//! Error types for the resolution engine and build runtime

use thiserror::Error;

/// Errors raised while normalizing, resolving, or scheduling a tree.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A section, sub-configuration, or step is malformed.
  #[error("malformed configuration at {at}: {message}")]
  Structure { at: String, message: String },

  /// A priority is negative or not an integer.
  #[error("priority for '{oid}' must be a non-negative integer, got {value}")]
  Priority { oid: String, value: serde_json::Value },

  /// Two sub-configurations flatten to the same composite id.
  #[error("non-unique configuration id '{oid}'")]
  DuplicateId { oid: String },

  /// An unset argument matched a section with several candidates.
  #[error(
    "multiple '{section}' configurations provided, specify '{argument}' explicitly in '{hint}'"
  )]
  AmbiguousReference {
    section: String,
    argument: String,
    hint: String,
  },
}

impl ResolveError {
  /// Structure error naming the offending location.
  pub fn structure(at: impl Into<String>, message: impl Into<String>) -> Self {
    ResolveError::Structure {
      at: at.into(),
      message: message.into(),
    }
  }
}

/// Errors raised while executing scheduled sub-configurations.
#[derive(Debug, Error)]
pub enum BuildError {
  /// A step, patch, or lookup names something that exists nowhere.
  #[error("'{oid}': unknown reference '{name}'")]
  MissingReference { oid: String, name: String },

  /// The producer could not be constructed.
  #[error("'{oid}': producer construction failed: {message}")]
  ProducerConstruction { oid: String, message: String },

  /// An `__init__` step appeared after the first position.
  #[error("'{oid}': step '__init__' must be the first step")]
  InitStepMisplaced { oid: String },

  /// A required step argument is absent.
  #[error("missing argument '{name}'")]
  MissingArgument { name: String },

  /// A step argument has an unusable shape or type.
  #[error("argument '{name}': {message}")]
  BadArgument { name: String, message: String },

  /// Cache or codec failure inside a producer method.
  #[error("'{oid}': cache operation failed: {message}")]
  Cache { oid: String, message: String },

  /// A producer method failed.
  #[error("{message}")]
  Method { message: String },

  /// Collaborator failure (path discovery, filesystem cache).
  #[error("platform error: {0}")]
  Platform(#[from] confect_platform::PlatformError),
}

/// Top-level error for [`run`](crate::run::run).
#[derive(Debug, Error)]
pub enum RunError {
  /// The tree could not be normalized, resolved, or scheduled.
  #[error("resolution error: {0}")]
  Resolve(#[from] ResolveError),

  /// A sub-configuration failed during execution.
  #[error("build error: {0}")]
  Build(#[from] BuildError),
}
