//! The composed typed view.
//!
//! [`TypedView`] is the flattened result of replaying the default catalog and
//! every active addendum in order. It is pure derived state: never persisted,
//! rebuilt from scratch on each recompute, and kept in sorted maps so that
//! repeated recomputes of the same inputs produce byte-identical dumps.

use crate::entry::{ResourceEntry, ResourceType};
use crate::error::Result;
use crate::ownership::OwnershipOracle;
use camino::Utf8Path;
use std::collections::BTreeMap;

/// One slot in the composed view: the winning entry plus which ownable
/// bundle contributed it (`None` for distribution defaults and mod entries,
/// which are always owned).
#[derive(Debug, Clone)]
struct ComposedRecord {
    entry: ResourceEntry,
    owner: Option<String>,
}

/// Flattened `(type, id) -> entry` view of the manifest stack.
#[derive(Debug, Default)]
pub struct TypedView {
    by_type: BTreeMap<ResourceType, BTreeMap<String, ComposedRecord>>,
}

impl TypedView {
    /// Clear the view and fold in the distribution's default catalog.
    pub fn reset(&mut self, default_entries: &[ResourceEntry]) {
        self.by_type.clear();
        self.fold(None, default_entries);
    }

    /// Fold a batch of entries into the view with last-write-wins semantics.
    ///
    /// `owner` is the bundle name for ownable base addendums; entries folded
    /// with `Some(name)` are subject to ownership filtering at query time.
    pub fn fold(&mut self, owner: Option<&str>, entries: &[ResourceEntry]) {
        for entry in entries {
            self.by_type
                .entry(entry.resource_type.clone())
                .or_default()
                .insert(
                    entry.id.clone(),
                    ComposedRecord {
                        entry: entry.clone(),
                        owner: owner.map(str::to_string),
                    },
                );
        }
    }

    /// Look up the current entry for `(resource_type, id)`.
    ///
    /// "Not found" is a normal result, never an error. With
    /// `filter_by_ownership` set, entries contributed by an unowned bundle
    /// are excluded even though they are present in the view.
    pub fn get(
        &self,
        id: &str,
        resource_type: &ResourceType,
        filter_by_ownership: bool,
        oracle: Option<&dyn OwnershipOracle>,
    ) -> Option<&ResourceEntry> {
        let record = self.by_type.get(resource_type)?.get(id)?;
        if filter_by_ownership && !record_owned(record, oracle) {
            return None;
        }
        Some(&record.entry)
    }

    /// All current entries of a type, sorted by id.
    pub fn all_of_type(
        &self,
        resource_type: &ResourceType,
        filter_by_ownership: bool,
        oracle: Option<&dyn OwnershipOracle>,
    ) -> Vec<&ResourceEntry> {
        let Some(by_id) = self.by_type.get(resource_type) else {
            return Vec::new();
        };
        by_id
            .values()
            .filter(|record| !filter_by_ownership || record_owned(record, oracle))
            .map(|record| &record.entry)
            .collect()
    }

    /// Every entry in the view, sorted by `(type, id)`.
    pub fn all_entries(&self) -> Vec<&ResourceEntry> {
        self.by_type
            .values()
            .flat_map(|by_id| by_id.values().map(|record| &record.entry))
            .collect()
    }

    /// Total number of composed entries.
    pub fn len(&self) -> usize {
        self.by_type.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Write the view as pretty JSON for debugging.
    ///
    /// The output is a nested `type -> id -> entry` object. Map ordering is
    /// deterministic, so identical views produce identical files.
    pub fn dump_to_disk(&self, path: &Utf8Path) -> Result<()> {
        let dump: BTreeMap<&ResourceType, BTreeMap<&String, &ResourceEntry>> = self
            .by_type
            .iter()
            .map(|(ty, by_id)| {
                (
                    ty,
                    by_id
                        .iter()
                        .map(|(id, record)| (id, &record.entry))
                        .collect(),
                )
            })
            .collect();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        let contents = serde_json::to_string_pretty(&dump)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }
}

fn record_owned(record: &ComposedRecord, oracle: Option<&dyn OwnershipOracle>) -> bool {
    match (&record.owner, oracle) {
        (Some(owner), Some(oracle)) => oracle.is_bundle_owned(owner),
        // no oracle yet, or not bundle-owned content: treat as owned
        _ => true,
    }
}
