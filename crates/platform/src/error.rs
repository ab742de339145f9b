//! Error types for confect-platform

use thiserror::Error;

/// Errors that can occur in platform collaborators
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Failed to determine home directory")]
    NoHomeDirectory,

    #[error("Failed to determine working directory: {0}")]
    NoWorkingDirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry not found: {0}")]
    CacheMiss(String),
}
