//! The manifest resolver.
//!
//! [`ManifestResolver`] owns the ordered composition of the default catalog,
//! registered base addendums, and registered mod addendums, and exposes the
//! flattened [`TypedView`] through query methods.
//!
//! # Recompute Algorithm
//!
//! Recomputation is lazy, guarded by a dirty flag so repeated no-op calls are
//! O(1). When it runs, it replays the stack strictly sequentially:
//!
//! 1. Start from the immutable default catalog.
//! 2. For each base addendum in registration order: skip it if its bundle is
//!    unowned (absent oracle means owned; memory stores are always owned);
//!    otherwise fold its entries, then its override-table entries, into the
//!    view with last-write-wins per `(type, id)`. Record its name in the
//!    active-and-owned set.
//! 3. For each mod addendum in registration order: fold it the same way if
//!    its requirement list is a subset of the active-and-owned set, otherwise
//!    skip it entirely — a mod addendum never contributes partially.
//! 4. Clear the dirty flag.
//!
//! Registration order is load-bearing; the resolver never reorders or batches
//! addendum folding, since override precedence and requirement gating both
//! depend on strict sequential replay.

use crate::addendum::{Addendum, ModAddendum};
use crate::entry::{ResourceEntry, ResourceType};
use crate::error::{Error, Result};
use crate::ownership::OwnershipOracle;
use crate::view::TypedView;
use camino::Utf8Path;
use std::collections::{HashMap, HashSet};

/// Resolves the layered manifest stack into a single queryable view.
///
/// Explicitly constructed and owned by the host's composition root — there is
/// no process-wide instance. All mutation and queries happen from one logical
/// control flow; the resolver does no internal locking.
pub struct ManifestResolver {
    /// The distribution's default catalog. Immutable.
    default_entries: Vec<ResourceEntry>,

    /// Base addendums in registration order. Also a set keyed by name:
    /// re-registering an existing name is a no-op.
    base_addendums: Vec<Addendum>,

    /// Mod addendums in caller-supplied load order.
    mod_addendums: Vec<ModAddendum>,

    /// Ad-hoc single-entry replacements, keyed by addendum name. Applied
    /// logically after that addendum's own entries on every recompute.
    entry_overrides: HashMap<String, Vec<ResourceEntry>>,

    /// Names of base addendums that are memory stores: dynamic in-memory
    /// content applied by the host at runtime. They replay in the base layer
    /// but are exempt from ownership gating.
    memory_store_names: HashSet<String>,

    /// Reverse index `type -> id -> memory store names`, in registration
    /// order, maintained on register/remove rather than during recompute.
    memory_store_index: HashMap<ResourceType, HashMap<String, Vec<String>>>,

    oracle: Option<Box<dyn OwnershipOracle>>,

    view: TypedView,
    dirty: bool,
}

impl ManifestResolver {
    /// Create a resolver over the distribution's default catalog.
    pub fn new(default_entries: Vec<ResourceEntry>) -> Self {
        Self {
            default_entries,
            base_addendums: Vec::new(),
            mod_addendums: Vec::new(),
            entry_overrides: HashMap::new(),
            memory_store_names: HashSet::new(),
            memory_store_index: HashMap::new(),
            oracle: None,
            view: TypedView::default(),
            dirty: true,
        }
    }

    /// Register a base addendum and recompute.
    ///
    /// Idempotent by name: registering an already-registered name leaves the
    /// composed view untouched.
    pub fn register_base_addendum(&mut self, addendum: Addendum) {
        if self.base_addendums.iter().any(|a| a.name == addendum.name) {
            return;
        }
        self.base_addendums.push(addendum);
        self.dirty = true;
        self.refresh();
    }

    /// Remove all base addendums matching `name` and recompute.
    pub fn remove_base_addendum(&mut self, name: &str) {
        self.base_addendums.retain(|a| a.name != name);
        self.dirty = true;
        self.refresh();
    }

    /// Register a dynamic in-memory addendum (a *memory store*) and
    /// recompute.
    ///
    /// Memory stores replay in the base layer at their registration position
    /// but are never ownership-gated — the host applied them explicitly, so
    /// there is no bundle to own. Idempotent by name, including against
    /// existing base addendums.
    pub fn register_memory_store(&mut self, addendum: Addendum) {
        if self.addendum_by_name(&addendum.name).is_some() {
            return;
        }
        self.index_memory_store(&addendum);
        self.memory_store_names.insert(addendum.name.clone());
        self.register_base_addendum(addendum);
    }

    /// Remove the named memory store and recompute. Unknown names are a
    /// no-op.
    pub fn remove_memory_store(&mut self, name: &str) {
        if !self.memory_store_names.remove(name) {
            return;
        }
        self.unindex_memory_store(name);
        self.remove_base_addendum(name);
    }

    /// Memory stores whose entries include `(resource_type, id)`, in
    /// registration order.
    ///
    /// Reads the reverse index, not the composed view: entries shadowed by
    /// later layers still count as contained.
    pub fn memory_stores_containing_entry(
        &self,
        resource_type: &ResourceType,
        id: &str,
    ) -> Vec<&Addendum> {
        let Some(names) = self
            .memory_store_index
            .get(resource_type)
            .and_then(|by_id| by_id.get(id))
        else {
            return Vec::new();
        };
        names
            .iter()
            .filter_map(|name| self.addendum_by_name(name))
            .collect()
    }

    /// The registered memory store with the given name, if any.
    pub fn memory_store_by_name(&self, name: &str) -> Option<&Addendum> {
        if !self.memory_store_names.contains(name) {
            return None;
        }
        self.addendum_by_name(name)
    }

    fn index_memory_store(&mut self, addendum: &Addendum) {
        for entry in &addendum.entries {
            let stores = self
                .memory_store_index
                .entry(entry.resource_type.clone())
                .or_default()
                .entry(entry.id.clone())
                .or_default();
            if !stores.iter().any(|store| store == &addendum.name) {
                stores.push(addendum.name.clone());
            }
        }
    }

    fn unindex_memory_store(&mut self, name: &str) {
        for by_id in self.memory_store_index.values_mut() {
            for stores in by_id.values_mut() {
                stores.retain(|store| store != name);
            }
        }
    }

    /// Append a mod addendum to the load order.
    ///
    /// Marks the view dirty but does not force an immediate recompute —
    /// mods register in batches and the next query pays for the replay once.
    pub fn register_mod_addendum(&mut self, mod_addendum: ModAddendum) {
        self.mod_addendums.push(mod_addendum);
        self.dirty = true;
    }

    /// Append an override entry for the named addendum.
    pub fn add_override_entry(&mut self, addendum_name: impl Into<String>, entry: ResourceEntry) {
        self.entry_overrides
            .entry(addendum_name.into())
            .or_default()
            .push(entry);
        self.dirty = true;
    }

    /// Install the ownership oracle and recompute.
    ///
    /// Before this is called, every bundle is treated as owned.
    pub fn set_ownership_oracle(&mut self, oracle: Box<dyn OwnershipOracle>) {
        self.oracle = Some(oracle);
        self.dirty = true;
        self.refresh();
    }

    /// Install the ownership oracle and, once it reports all bundles loaded,
    /// log the finalized composition for diagnostics.
    pub fn try_finalize(&mut self, oracle: Box<dyn OwnershipOracle>) {
        self.set_ownership_oracle(oracle);

        let oracle = self
            .oracle
            .as_deref()
            .filter(|oracle| oracle.all_bundles_loaded());
        let Some(oracle) = oracle else {
            return;
        };

        let owned: Vec<&str> = self
            .base_addendums
            .iter()
            .filter(|a| oracle.is_bundle_owned(&a.name))
            .map(|a| a.name.as_str())
            .collect();
        tracing::info!("Owned content bundles: {}", owned.join(" "));

        tracing::info!("Mod addendums:");
        for mod_addendum in &self.mod_addendums {
            if mod_addendum.required_addendums.is_empty() {
                tracing::info!("\t{}", mod_addendum.addendum.name);
            } else {
                tracing::info!(
                    "\t{} requires: {}",
                    mod_addendum.addendum.name,
                    mod_addendum.required_addendums.join(" ")
                );
            }
        }
    }

    /// Look up the current entry for `(resource_type, id)`.
    ///
    /// Returns `None` for unknown identities — not found is a normal result.
    pub fn entry_by_id(
        &mut self,
        id: &str,
        resource_type: &ResourceType,
        filter_by_ownership: bool,
    ) -> Option<&ResourceEntry> {
        self.refresh();
        self.view
            .get(id, resource_type, filter_by_ownership, self.oracle.as_deref())
    }

    /// All current entries of a type, sorted by id.
    pub fn entries_of_type(
        &mut self,
        resource_type: &ResourceType,
        filter_by_ownership: bool,
    ) -> Vec<&ResourceEntry> {
        self.refresh();
        self.view
            .all_of_type(resource_type, filter_by_ownership, self.oracle.as_deref())
    }

    /// Every entry in the composed view, sorted by `(type, id)`.
    pub fn all_entries(&mut self) -> Vec<&ResourceEntry> {
        self.refresh();
        self.view.all_entries()
    }

    /// The registered base addendum with the given name, if any.
    ///
    /// Does not trigger a recompute.
    pub fn addendum_by_name(&self, name: &str) -> Option<&Addendum> {
        self.base_addendums.iter().find(|a| a.name == name)
    }

    /// Explicit entry removal is unsupported.
    ///
    /// Always fails without mutating any state; see [`Error::RemovalUnsupported`].
    pub fn remove_entry(&mut self, _entry: &ResourceEntry) -> Result<()> {
        Err(Error::RemovalUnsupported)
    }

    /// Dump the composed view to disk as pretty JSON for debugging.
    pub fn dump_to_disk(&mut self, path: &Utf8Path) -> Result<()> {
        self.refresh();
        self.view.dump_to_disk(path)
    }

    /// Recompute the composed view if anything changed since the last replay.
    pub fn refresh(&mut self) {
        if !self.dirty {
            return;
        }

        self.view.reset(&self.default_entries);
        let mut active_and_owned: Vec<&str> = Vec::new();

        for addendum in &self.base_addendums {
            // before ownership data loads, every bundle counts as owned;
            // memory stores have no bundle and are always owned
            let is_memory_store = self.memory_store_names.contains(&addendum.name);
            let is_owned = is_memory_store
                || self
                    .oracle
                    .as_deref()
                    .map(|oracle| oracle.is_bundle_owned(&addendum.name))
                    .unwrap_or(true);
            if !is_owned {
                tracing::debug!("Skipping unowned bundle addendum '{}'", addendum.name);
                continue;
            }
            active_and_owned.push(&addendum.name);

            // memory store entries carry no owner, exempting them from the
            // query-time ownership filter as well
            let owner = (!is_memory_store).then_some(addendum.name.as_str());
            self.view.fold(owner, &addendum.entries);
            if let Some(overrides) = self.entry_overrides.get(&addendum.name) {
                self.view.fold(owner, overrides);
            }
        }

        for mod_addendum in &self.mod_addendums {
            let satisfied = mod_addendum
                .required_addendums
                .iter()
                .all(|name| active_and_owned.iter().any(|active| active == name));
            if !satisfied {
                tracing::debug!(
                    "Skipping mod addendum '{}': requirements not met",
                    mod_addendum.addendum.name
                );
                continue;
            }

            self.view.fold(None, &mod_addendum.addendum.entries);
            if let Some(overrides) = self.entry_overrides.get(&mod_addendum.addendum.name) {
                self.view.fold(None, overrides);
            }
        }

        self.dirty = false;
        tracing::debug!("Composed view refreshed: {} entries", self.view.len());
    }
}
