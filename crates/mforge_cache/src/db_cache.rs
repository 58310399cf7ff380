//! The derived metadata-database cache.
//!
//! A handful of resource types (mechs, weapons, contracts, ...) are imported
//! into a secondary queryable store so the game can run indexed lookups over
//! them. Importing is expensive, so [`DatabaseCache`] remembers which entries
//! were already imported — keyed by [`CacheKey`] plus the entry's
//! last-modified marker — and skips redundant work across process restarts.
//!
//! The cache owns two files inside its directory: the row table snapshot and
//! the store's durable artifact. They are only ever valid together; if either
//! is missing or unreadable at construction, the directory is wiped and the
//! distribution's default artifact is copied forward as the new baseline.
//! That is a full-rebuild fallback, never a partial merge of stale data.
//!
//! The artifact write at checkpoint time may be dispatched to a background
//! worker while loading continues. The in-memory store sits behind a mutex
//! held for the duration of that write, with at most one write in flight;
//! callers block only in [`save`](DatabaseCache::save) and
//! [`finish`](DatabaseCache::finish), never on ordinary mutation.

use crate::error::{Error, Result};
use crate::key::CacheKey;
use crate::storage;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use mforge_manifest::{ResourceEntry, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

const TABLE_FILE: &str = "database_cache.json";
const ARTIFACT_FILE: &str = "metadata.db";

/// The secondary queryable store the cache imports into.
///
/// The host game brings its own implementation (typically a SQL database);
/// [`FileMetadataStore`] is the crate's file-backed default. Implementations
/// must be [`Send`] because the artifact write can run on a background
/// thread.
pub trait MetadataStore: Send {
    /// Insert or replace the row for `(resource_type, id)`.
    fn upsert(&mut self, resource_type: &ResourceType, id: &str, content: &str) -> Result<()>;

    /// Write the store's durable artifact.
    fn save_to(&self, path: &Utf8Path) -> Result<()>;

    /// Replace the store's contents from a durable artifact.
    fn load_from(&mut self, path: &Utf8Path) -> Result<()>;
}

/// File-backed metadata store: nested `type -> id -> content` tables
/// persisted as a compressed MessagePack artifact.
#[derive(Debug, Default)]
pub struct FileMetadataStore {
    tables: BTreeMap<String, BTreeMap<String, String>>,
}

impl FileMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The imported content for `(resource_type, id)`, if present.
    pub fn get(&self, resource_type: &ResourceType, id: &str) -> Option<&str> {
        self.tables
            .get(resource_type.as_str())?
            .get(id)
            .map(String::as_str)
    }

    /// Total number of imported rows.
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl MetadataStore for FileMetadataStore {
    fn upsert(&mut self, resource_type: &ResourceType, id: &str, content: &str) -> Result<()> {
        self.tables
            .entry(resource_type.as_str().to_string())
            .or_default()
            .insert(id.to_string(), content.to_string());
        Ok(())
    }

    fn save_to(&self, path: &Utf8Path) -> Result<()> {
        storage::write_msgpack(path, &self.tables)
    }

    fn load_from(&mut self, path: &Utf8Path) -> Result<()> {
        self.tables = storage::read_msgpack(path)?;
        Ok(())
    }
}

/// Identity of an imported file version: presence of a row with a matching
/// `updated_on` means "already imported, skip".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub source_path: Utf8PathBuf,
    pub updated_on: DateTime<Utc>,
    pub version: String,
}

impl From<&ResourceEntry> for FileVersion {
    fn from(entry: &ResourceEntry) -> Self {
        Self {
            source_path: entry.source_path.clone(),
            updated_on: entry.updated_on,
            version: entry.version.clone(),
        }
    }
}

/// Tracks which resource entries were already imported into the metadata
/// store, and owns the store's persistence.
pub struct DatabaseCache<S: MetadataStore + 'static> {
    table_path: Utf8PathBuf,
    store_path: Utf8PathBuf,

    /// Root of the distribution's own content. Entries sourced from here are
    /// assumed present in the baseline artifact already.
    distribution_dir: Utf8PathBuf,

    /// Resource types this store indexes. Everything else is silently
    /// ignored — most resource types never touch the database.
    relevant_types: HashSet<ResourceType>,

    rows: HashMap<CacheKey, FileVersion>,

    /// Session-scoped exclusions; ignore wins over every later `add`.
    ignored: HashSet<CacheKey>,

    store: Arc<Mutex<S>>,
    in_flight: Option<JoinHandle<Result<()>>>,
    dirty: bool,
}

impl<S: MetadataStore + 'static> DatabaseCache<S> {
    /// Open the cache rooted at `cache_dir`.
    ///
    /// Loads the previous snapshot and artifact when both are intact;
    /// otherwise cleans the directory, copies `baseline_artifact` forward,
    /// and starts from an empty row table.
    pub fn new(
        cache_dir: impl Into<Utf8PathBuf>,
        baseline_artifact: impl Into<Utf8PathBuf>,
        distribution_dir: impl Into<Utf8PathBuf>,
        relevant_types: HashSet<ResourceType>,
        mut store: S,
    ) -> Self {
        let cache_dir = cache_dir.into();
        let baseline_artifact = baseline_artifact.into();
        let table_path = cache_dir.join(TABLE_FILE);
        let store_path = cache_dir.join(ARTIFACT_FILE);

        let rows = load_or_rebuild(
            &cache_dir,
            &table_path,
            &store_path,
            &baseline_artifact,
            &mut store,
        );

        Self {
            table_path,
            store_path,
            distribution_dir: distribution_dir.into(),
            relevant_types,
            rows,
            ignored: HashSet::new(),
            store: Arc::new(Mutex::new(store)),
            in_flight: None,
            dirty: false,
        }
    }

    /// Import `content` into the metadata store under the entry's identity.
    ///
    /// Entries of irrelevant types are silently skipped. With
    /// `update_only_if_outdated`, entries whose row already matches the
    /// current `updated_on` are skipped, as are distribution-default entries
    /// with no row (the baseline artifact already contains them).
    pub fn add(&mut self, entry: &ResourceEntry, content: &str, update_only_if_outdated: bool) {
        self.import(entry, content, update_only_if_outdated, false);
    }

    /// Import merged `content` under the entry's identity.
    ///
    /// Same gating as [`add`](Self::add), except the distribution-default
    /// shortcut does not apply: merged content diverges from the file under
    /// the distribution directory, so a rebuilt database must relearn the
    /// row even for entries sourced there.
    pub fn add_merged(
        &mut self,
        entry: &ResourceEntry,
        content: &str,
        update_only_if_outdated: bool,
    ) {
        self.import(entry, content, update_only_if_outdated, true);
    }

    fn import(
        &mut self,
        entry: &ResourceEntry,
        content: &str,
        update_only_if_outdated: bool,
        merged: bool,
    ) {
        if !self.relevant_types.contains(&entry.resource_type) {
            return;
        }

        let key = CacheKey::of(entry);
        if self.ignored.contains(&key) {
            tracing::debug!("Database cache: {key} is ignored this session, skipping");
            return;
        }

        if update_only_if_outdated {
            match self.rows.get(&key) {
                Some(row) if row.updated_on == entry.updated_on => return,
                Some(_) => {}
                None if !merged && entry.source_path.starts_with(&self.distribution_dir) => {
                    return
                }
                None => {}
            }
        }

        let upserted = match self.store.lock() {
            Ok(mut store) => store.upsert(&entry.resource_type, &entry.id, content),
            Err(_) => {
                tracing::warn!("Database cache: store lock poisoned, skipping import of {key}");
                return;
            }
        };
        if let Err(e) = upserted {
            tracing::warn!("Database cache: couldn't import {key}: {e}");
            return;
        }

        self.rows.insert(key, FileVersion::from(entry));
        self.dirty = true;
    }

    /// Exclude the entry's key from importing for the rest of this session.
    pub fn ignore(&mut self, entry: &ResourceEntry) {
        self.ignored.insert(CacheKey::of(entry));
    }

    /// Whether a row exists for the entry's key.
    pub fn is_cached(&self, entry: &ResourceEntry) -> bool {
        self.rows.contains_key(&CacheKey::of(entry))
    }

    /// Checkpoint: persist the artifact and the row table if anything
    /// changed.
    ///
    /// The previous checkpoint's background write is joined first — if it
    /// failed, the cache is dirty again and this save retries it. Then the
    /// artifact write is dispatched to a background worker and the row table
    /// is written synchronously. A failure on either side is logged and
    /// leaves the dirty flag set so the next checkpoint retries.
    pub fn save(&mut self) {
        self.join_in_flight();

        if !self.dirty {
            tracing::info!("Database cache: no changes detected, skipping save");
            return;
        }

        let store = Arc::clone(&self.store);
        let store_path = self.store_path.clone();
        self.in_flight = Some(std::thread::spawn(move || {
            let store = store.lock().map_err(|_| Error::StorePoisoned)?;
            store.save_to(&store_path)
        }));

        match storage::write_json(&self.table_path, &self.rows) {
            Ok(()) => {
                tracing::info!("Database cache: saved to {}", self.table_path);
                self.dirty = false;
            }
            Err(e) => {
                tracing::warn!(
                    "Database cache: couldn't write to {}: {e}",
                    self.table_path
                );
            }
        }
    }

    /// Block until the in-flight artifact write (if any) completes.
    ///
    /// A failed write re-marks the cache dirty so a later [`save`](Self::save)
    /// retries it.
    pub fn finish(&mut self) {
        self.join_in_flight();
    }

    /// Whether unsaved mutations exist.
    pub fn has_changes(&self) -> bool {
        self.dirty
    }

    /// Shared handle to the metadata store, for host-side queries.
    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    fn join_in_flight(&mut self) {
        let Some(handle) = self.in_flight.take() else {
            return;
        };
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Database cache: artifact write failed, will retry: {e}");
                self.dirty = true;
            }
            Err(_) => {
                tracing::warn!("Database cache: artifact writer panicked, will retry");
                self.dirty = true;
            }
        }
    }
}

impl<S: MetadataStore + 'static> Drop for DatabaseCache<S> {
    fn drop(&mut self) {
        self.join_in_flight();
    }
}

/// Load the row table and artifact, or fall back to a full rebuild from the
/// distribution baseline.
fn load_or_rebuild<S: MetadataStore>(
    cache_dir: &Utf8Path,
    table_path: &Utf8Path,
    store_path: &Utf8Path,
    baseline_artifact: &Utf8Path,
    store: &mut S,
) -> HashMap<CacheKey, FileVersion> {
    if storage::exists(table_path) && storage::exists(store_path) {
        match try_load(table_path, store_path, store) {
            Ok(rows) => {
                tracing::info!("Database cache: loaded");
                return rows;
            }
            Err(e) => {
                tracing::warn!("Database cache: loading failed, rebuilding: {e}");
            }
        }
    }

    tracing::info!("Database cache: copying over baseline and rebuilding cache");
    if let Err(e) = storage::clean_dir(cache_dir) {
        tracing::warn!("Database cache: couldn't clean {cache_dir}: {e}");
    }

    if storage::exists(baseline_artifact) {
        let copied = std::fs::copy(
            storage::compressed_path(baseline_artifact).as_std_path(),
            storage::compressed_path(store_path).as_std_path(),
        );
        if let Err(e) = copied {
            tracing::warn!("Database cache: couldn't copy baseline artifact: {e}");
        } else if let Err(e) = store.load_from(baseline_artifact) {
            tracing::warn!("Database cache: couldn't load baseline artifact: {e}");
        }
    } else {
        tracing::info!("Database cache: no baseline artifact, starting empty");
    }

    HashMap::new()
}

fn try_load<S: MetadataStore>(
    table_path: &Utf8Path,
    store_path: &Utf8Path,
    store: &mut S,
) -> Result<HashMap<CacheKey, FileVersion>> {
    let rows = storage::read_json(table_path)?;
    store.load_from(store_path)?;
    Ok(rows)
}
