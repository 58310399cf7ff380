//! Error types for cache operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses
//! [`Error`] as the error type. External error types (`std::io::Error`,
//! serde errors) are converted via `From` impls.
//!
//! Most cache entry points deliberately do *not* propagate these errors:
//! snapshot corruption, side-store read failures, and merge application
//! failures are recoverable-local conditions that degrade to a cache miss
//! or a no-op with a logged warning. The `Result` surface exists for the
//! storage layer and for callers that need the underlying cause.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during cache storage and merging.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (snapshot files, merged blobs, the artifact).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON (row tables, directives, merges).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to encode the binary metadata store artifact.
    #[error("artifact encode error: {0}")]
    ArtifactEncode(#[from] rmp_serde::encode::Error),

    /// Failed to decode the binary metadata store artifact.
    #[error("artifact decode error: {0}")]
    ArtifactDecode(#[from] rmp_serde::decode::Error),

    /// A merge operation could not be applied to the target content.
    #[error("merge failed: {0}")]
    Merge(String),

    /// The lock around the metadata store was poisoned by a panicked writer.
    #[error("metadata store lock poisoned")]
    StorePoisoned,
}
