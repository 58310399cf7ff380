//! The merge-result cache.
//!
//! Mods edit resources they do not own by contributing merge operations:
//! same-file JSON merges, same-file text appends, or directive files that
//! fan out to named targets. Applying those edits on every load is wasted
//! work, so [`MergeCache`] persists each merged result and the identity of
//! the operation set that produced it.
//!
//! Two tables exist side by side. The *pending* table is rebuilt every
//! session from the registered contributors and records what merges are
//! queued per target. The *persistent* table is the loaded snapshot of what
//! was merged before. A lookup hits only when the pending operation set for
//! a target equals the persisted one (order-sensitive) *and* the target's
//! last-modified marker is unchanged — so a cache entry goes stale whenever
//! either the source content changed or the set of contributing mods did
//! (a mod was added, removed, reordered, or its file touched).

use crate::directive::{MergeDirective, DIRECTIVE_TYPE};
use crate::key::CacheKey;
use crate::merge::MergeOp;
use crate::storage;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use mforge_manifest::{ResourceEntry, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TABLE_FILE: &str = "merge_cache.json";

/// A mod file offering merge-relevant content.
///
/// Built by the mod loader from each mod's manifest entries. The
/// `merge_json` / `append_text` flags carry the mod author's request for
/// same-file merging; a resource type of [`DIRECTIVE_TYPE`] marks the file
/// as a multi-target directive instead.
#[derive(Debug, Clone)]
pub struct Contributor {
    /// Name of the contributing mod, for diagnostics.
    pub mod_name: String,

    /// Target resource id (ignored for directives, which name their own).
    pub id: String,

    /// Target resource type, or [`DIRECTIVE_TYPE`], or `None` for untyped.
    pub resource_type: Option<ResourceType>,

    /// The contributor file on disk.
    pub source_path: Utf8PathBuf,

    /// Last-modified marker of the contributor file.
    pub updated_on: DateTime<Utc>,

    /// The mod asked for this file to be JSON deep-merged into the target.
    pub merge_json: bool,

    /// The mod asked for this file to be appended to the target as text.
    pub append_text: bool,
}

impl Contributor {
    fn is_directive(&self) -> bool {
        self.resource_type
            .as_ref()
            .is_some_and(|ty| ty.as_str() == DIRECTIVE_TYPE)
    }

    fn extension(&self) -> String {
        self.source_path
            .extension()
            .unwrap_or("")
            .to_ascii_lowercase()
    }
}

/// One merge operation queued against a target, with enough identity for
/// staleness comparison: which file it came from and when that file changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMerge {
    pub mod_name: String,
    pub source_path: Utf8PathBuf,
    pub updated_on: DateTime<Utc>,
    pub op: MergeOp,
}

/// Per-target cache record: the queued operations, the target's own
/// last-modified marker at merge time, and where the merged blob lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCacheEntry {
    /// Blob path relative to the cache directory.
    pub cached_path: Utf8PathBuf,

    /// `updated_on` of the target entry the operations were applied to.
    pub original_updated_on: Option<DateTime<Utc>>,

    /// Operations in registration order.
    pub operations: Vec<PendingMerge>,
}

impl MergeCacheEntry {
    fn new(cached_path: Utf8PathBuf) -> Self {
        Self {
            cached_path,
            original_updated_on: None,
            operations: Vec::new(),
        }
    }

    /// Staleness comparison: operation set (order-sensitive) and source
    /// timestamp. The blob path is derived state and deliberately excluded.
    fn matches(&self, other: &Self) -> bool {
        self.original_updated_on == other.original_updated_on
            && self.operations == other.operations
    }
}

/// Result of a merge cache lookup.
#[derive(Debug)]
pub enum MergeLookup {
    /// No pending operations, no persisted match, or an unreadable blob.
    Miss,
    /// A valid cached merge exists (content not requested).
    Hit,
    /// A valid cached merge exists, with its content.
    HitContent(String),
}

impl MergeLookup {
    pub fn is_hit(&self) -> bool {
        !matches!(self, MergeLookup::Miss)
    }

    pub fn into_content(self) -> Option<String> {
        match self {
            MergeLookup::HitContent(content) => Some(content),
            _ => None,
        }
    }
}

/// Persistent cache of merged resource content.
pub struct MergeCache {
    cache_dir: Utf8PathBuf,
    table_path: Utf8PathBuf,

    /// Loaded snapshot: targets that were merged in a previous session.
    persistent: HashMap<CacheKey, MergeCacheEntry>,

    /// This session's queued merges, built from registered contributors.
    pending: HashMap<CacheKey, MergeCacheEntry>,

    dirty: bool,
}

impl MergeCache {
    /// Open the cache rooted at `cache_dir`, loading the previous snapshot.
    ///
    /// A missing or unreadable snapshot is not an error: the cache directory
    /// is cleaned and everything is re-merged from source this session.
    pub fn new(cache_dir: impl Into<Utf8PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        let table_path = cache_dir.join(TABLE_FILE);

        let persistent = if storage::exists(&table_path) {
            match storage::read_json(&table_path) {
                Ok(persistent) => Some(persistent),
                Err(e) => {
                    tracing::warn!("Merge cache: loading snapshot failed: {e}");
                    None
                }
            }
        } else {
            None
        };

        let persistent = persistent.unwrap_or_else(|| {
            tracing::info!("Merge cache: rebuilding cache");
            if let Err(e) = storage::clean_dir(&cache_dir) {
                tracing::warn!("Merge cache: couldn't clean {cache_dir}: {e}");
            }
            HashMap::new()
        });

        Self {
            cache_dir,
            table_path,
            persistent,
            pending: HashMap::new(),
            dirty: false,
        }
    }

    /// Register a mod file as a merge contributor.
    ///
    /// Returns `true` if the file was recognized as merge-relevant (even
    /// when its contribution had to be dropped with a warning), `false` if
    /// merging is not this cache's concern and the caller should handle the
    /// file another way.
    pub fn register_contributor(&mut self, contributor: &Contributor) -> bool {
        if contributor.is_directive() {
            self.register_directive(contributor);
            return true;
        }

        if !contributor.merge_json && !contributor.append_text {
            return false;
        }

        let ext = contributor.extension();
        let op = if contributor.merge_json && ext == "json" {
            read_json_op(&contributor.source_path)
        } else if contributor.append_text && (ext == "txt" || ext == "csv") {
            read_append_op(&contributor.source_path)
        } else {
            tracing::warn!(
                "Merge cache: mergeJson requires .json and appendText requires .txt or .csv: \
                 '{}' from mod '{}'",
                contributor.source_path,
                contributor.mod_name
            );
            return true;
        };

        match op {
            Ok(op) => {
                let key = CacheKey {
                    resource_type: contributor.resource_type.clone(),
                    id: contributor.id.clone(),
                };
                self.add_pending(key, contributor, op);
            }
            Err(e) => {
                tracing::warn!(
                    "Merge cache: couldn't read contributor '{}' from mod '{}': {e}",
                    contributor.source_path,
                    contributor.mod_name
                );
            }
        }
        true
    }

    fn register_directive(&mut self, contributor: &Contributor) {
        let directive = match MergeDirective::from_file(&contributor.source_path) {
            Ok(directive) => directive,
            Err(e) => {
                tracing::warn!(
                    "Merge cache: malformed directive '{}' from mod '{}': {e}",
                    contributor.source_path,
                    contributor.mod_name
                );
                return;
            }
        };

        if directive.is_ambiguous() {
            tracing::warn!(
                "Merge cache: directive '{}' has both patch and append; using patch",
                contributor.source_path
            );
        }

        let targets = directive.targets();
        if targets.is_empty() {
            tracing::warn!(
                "Merge cache: directive '{}' didn't target any ids, skipping",
                contributor.source_path
            );
            return;
        }

        let Some(op) = directive.op() else {
            tracing::warn!(
                "Merge cache: directive '{}' has neither patch nor append, skipping",
                contributor.source_path
            );
            return;
        };

        for target in targets {
            let key = CacheKey {
                resource_type: directive.target_type.clone(),
                id: target.to_string(),
            };
            self.add_pending(key, contributor, op.clone());
        }
    }

    fn add_pending(&mut self, key: CacheKey, contributor: &Contributor, op: MergeOp) {
        let cached_path = key.cached_rel_path();
        self.pending
            .entry(key)
            .or_insert_with(|| MergeCacheEntry::new(cached_path))
            .operations
            .push(PendingMerge {
                mod_name: contributor.mod_name.clone(),
                source_path: contributor.source_path.clone(),
                updated_on: contributor.updated_on,
                op,
            });
    }

    /// Whether any merges are queued for the entry. No I/O.
    pub fn has_pending(&self, entry: &ResourceEntry) -> bool {
        self.pending.contains_key(&CacheKey::of(entry))
    }

    /// Check whether a previously merged result is still valid for `entry`.
    ///
    /// On the first touch of a target whose pending operations were queued
    /// under the legacy untyped key, the pending record is migrated to the
    /// typed key in place. A hit requires the persisted operation set to
    /// equal the pending one and the persisted source timestamp to equal the
    /// entry's current `updated_on`. With `fetch_content`, a hit also loads
    /// the merged blob; a blob read failure downgrades to a miss.
    pub fn lookup(&mut self, entry: &ResourceEntry, fetch_content: bool) -> MergeLookup {
        let key = CacheKey::of(entry);

        if !self.pending.contains_key(&key) {
            // one-time migration of rows written before keys were typed
            let untyped = CacheKey::untyped(&entry.id);
            let Some(mut migrated) = self.pending.remove(&untyped) else {
                return MergeLookup::Miss;
            };
            migrated.cached_path = key.cached_rel_path();
            self.pending.insert(key.clone(), migrated);
        }

        let Some(pending) = self.pending.get_mut(&key) else {
            return MergeLookup::Miss;
        };
        pending.original_updated_on = Some(entry.updated_on);

        let Some(persisted) = self.persistent.get(&key) else {
            return MergeLookup::Miss;
        };
        if !pending.matches(persisted) {
            return MergeLookup::Miss;
        }

        let blob_path = self.cache_dir.join(&pending.cached_path);
        if fetch_content {
            match storage::read_text(&blob_path) {
                Ok(content) => MergeLookup::HitContent(content),
                Err(e) => {
                    tracing::warn!("Merge cache: couldn't read cached merge at {blob_path}: {e}");
                    MergeLookup::Miss
                }
            }
        } else if storage::exists(&blob_path) {
            MergeLookup::Hit
        } else {
            MergeLookup::Miss
        }
    }

    /// Apply the queued operations for `entry` to `content` and cache the
    /// result.
    ///
    /// Returns the content unchanged when nothing is queued, and the
    /// original content when an operation fails to apply (logged, never
    /// propagated — the caller keeps loading unmerged content).
    pub fn merge_and_cache(&mut self, entry: &ResourceEntry, content: String) -> String {
        let key = CacheKey::of(entry);
        let Some(pending) = self.pending.get_mut(&key) else {
            return content;
        };
        pending.original_updated_on = Some(entry.updated_on);

        let mut merged = content.clone();
        for pending_merge in &pending.operations {
            merged = match pending_merge.op.apply(&merged) {
                Ok(merged) => merged,
                Err(e) => {
                    tracing::warn!(
                        "Merge cache: couldn't merge '{}' from mod '{}' into {}: {e}",
                        pending_merge.source_path,
                        pending_merge.mod_name,
                        entry
                    );
                    return content;
                }
            };
        }

        let blob_path = self.cache_dir.join(&pending.cached_path);
        match storage::write_text(&blob_path, &merged) {
            Ok(()) => {
                let record = pending.clone();
                self.persistent.insert(key, record);
                self.dirty = true;
            }
            Err(e) => {
                tracing::warn!("Merge cache: couldn't write merge result to {blob_path}: {e}");
            }
        }
        merged
    }

    /// Checkpoint: persist the row table if anything changed.
    ///
    /// A write failure is logged and leaves the cache dirty so the next
    /// checkpoint retries.
    pub fn save(&mut self) {
        if !self.dirty {
            tracing::info!("Merge cache: no changes detected, skipping save");
            return;
        }

        match storage::write_json(&self.table_path, &self.persistent) {
            Ok(()) => {
                tracing::info!("Merge cache: saved to {}", self.table_path);
                self.dirty = false;
            }
            Err(e) => {
                tracing::warn!("Merge cache: couldn't write to {}: {e}", self.table_path);
            }
        }
    }

    /// Whether unsaved mutations exist.
    pub fn has_changes(&self) -> bool {
        self.dirty
    }
}

fn read_json_op(path: &Utf8Path) -> crate::Result<MergeOp> {
    let contents = std::fs::read_to_string(path.as_std_path())?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    Ok(MergeOp::JsonMerge(value))
}

fn read_append_op(path: &Utf8Path) -> crate::Result<MergeOp> {
    let contents = std::fs::read_to_string(path.as_std_path())?;
    Ok(MergeOp::AppendText(contents))
}
