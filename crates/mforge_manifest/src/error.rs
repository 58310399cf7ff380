//! Error types for manifest resolution.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses
//! [`Error`] as the error type.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during manifest resolution.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (dumping the composed view).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize the composed view dump.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Removing an entry from the composed view is not supported.
    ///
    /// Entries can only be overridden by later layers or excluded via
    /// ownership; erasing a distribution entry outright has no defined
    /// behavior (the secondary database never forgets base rows).
    #[error("removing manifest entries is not supported")]
    RemovalUnsupported,
}
