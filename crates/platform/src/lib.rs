//! Default collaborators for the confect engine
//!
//! This crate provides the injectable services the engine consumes:
//! - Path discovery and expansion (project directory, `~`, `./`-relative)
//! - Logging sinks behind the `Logger` interface
//! - A filesystem-backed cache store

mod cache;
mod error;
mod logging;
mod paths;

pub use cache::{CacheStore, FsCacheStore};
pub use error::PlatformError;
pub use logging::{Logger, NullLogger, TracingLogger};
pub use paths::{PathProvider, WorkingDirProvider, expand_path, resolve_cache_dir};
