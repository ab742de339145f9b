//! Logging sinks behind the injectable `Logger` interface

use tracing::{debug, info, warn};

/// Leveled message sink consumed by the build runtime.
///
/// The engine emits an info line per sub-configuration and a debug line per
/// step through whatever implementation is injected. Production code uses
/// [`TracingLogger`]; tests usually want [`NullLogger`].
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Forwards every message to the `tracing` subscriber.
#[derive(Debug, Default, Clone)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn debug(&self, message: &str) {
        debug!("{}", message);
    }

    fn warn(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Discards every message.
#[derive(Debug, Default, Clone)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn info(&self, _message: &str) {}

    fn debug(&self, _message: &str) {}

    fn warn(&self, _message: &str) {}
}
