//! confect-core: resolution engine and build runtime for confect
//!
//! This crate turns a declarative configuration tree into runtime objects:
//! - `tree`: the typed configuration model
//! - `normalize`: default merging and shaping
//! - `resolve`: global-override cascade and unset-reference resolution
//! - `schedule`: priority ordering of sub-configurations
//! - `execute`: the sequential builder runtime over a shared objects store

pub mod codec;
pub mod defaults;
pub mod error;
pub mod execute;
pub mod normalize;
pub mod producer;
pub mod registry;
pub mod resolve;
pub mod run;
pub mod schedule;
pub mod store;
pub mod tree;

pub use codec::{Codec, CodecError, JsonCodec};
pub use error::{BuildError, ResolveError, RunError};
pub use execute::execute;
pub use normalize::normalize;
pub use registry::Registry;
pub use resolve::resolve;
pub use run::{RunOptions, run};
pub use schedule::{Scheduled, schedule};
pub use store::{Object, ObjectsStore, Payload};
pub use tree::{ConfigTree, Section, Seed, Step, SubConfig, compose_id};

// Re-export the collaborator interfaces so producers only need this crate
pub use confect_platform::{CacheStore, Logger, PathProvider};
