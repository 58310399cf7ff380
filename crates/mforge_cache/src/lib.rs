//! Incremental content caches for mod loading.
//!
//! Loading a heavily modded game does two kinds of expensive derived work:
//! splicing the textual/JSON edits that mods make into resource content, and
//! importing final content into the game's secondary metadata database. Both
//! survive process restarts through the caches in this crate:
//!
//! - [`MergeCache`] tracks, per target resource, the pending merge operations
//!   contributed by mods and the previously computed merged output. Staleness
//!   is keyed on operation-set identity plus the source's last-modified
//!   marker, so nothing re-hashes large source files on every load.
//! - [`DatabaseCache`] tracks which resources have already been imported into
//!   the metadata database, keyed the same way, and owns the database's
//!   durable artifact alongside its row table.
//!
//! Both caches persist as whole-file compressed snapshots written at
//! controlled checkpoints ([`MergeCache::save`], [`DatabaseCache::save`]),
//! never on individual mutation. Corruption is handled wholesale: a snapshot
//! that fails to load is discarded and the cache rebuilds from source, which
//! is always safe — the worst case is serving distribution-default content.

pub mod db_cache;
pub mod directive;
pub mod error;
pub mod key;
pub mod merge;
pub mod merge_cache;
pub mod storage;

pub use db_cache::{DatabaseCache, FileMetadataStore, MetadataStore};
pub use directive::MergeDirective;
pub use error::{Error, Result};
pub use key::CacheKey;
pub use merge::MergeOp;
pub use merge_cache::{Contributor, MergeCache, MergeCacheEntry, MergeLookup, PendingMerge};
