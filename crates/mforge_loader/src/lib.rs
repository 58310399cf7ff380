//! Load pipeline wiring for the mod loader.
//!
//! This crate is the composition root: it owns a
//! [`ManifestResolver`](mforge_manifest::ManifestResolver), a
//! [`MergeCache`](mforge_cache::MergeCache), and a
//! [`DatabaseCache`](mforge_cache::DatabaseCache), and runs loaded resource
//! text through them in the right order. The host's resource loader calls
//! [`LoadPipeline::process_loaded_text`] with each entry's raw text before
//! handing it to the game, and [`LoadPipeline::checkpoint`] at safe points
//! (end of load, scene transitions) to persist cache state.
//!
//! Loader-specific transformations plug in as [`ContentProcessor`]
//! implementations, registered explicitly and run in registration order —
//! there is no runtime discovery of hook methods.

pub mod error;
pub mod pipeline;

pub use error::{Error, Result};
pub use pipeline::{ContentProcessor, LoadPipeline};
