//! Error types for pipeline wiring.
//!
//! The pipeline never propagates cache or manifest failures — those degrade
//! to logged warnings inside the owning components. The only error that
//! crosses the crate boundary is a content processor rejecting the loaded
//! text.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the load pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// A registered content processor rejected the loaded text.
    #[error("content processor '{name}' failed: {message}")]
    Processor { name: String, message: String },
}
