//! Addendums: named, ordered batches of manifest entries.
//!
//! Two kinds exist. *Base addendums* come from the host distribution and its
//! content bundles; they become active once registered and contribute only
//! while their bundle is owned. *Mod addendums* wrap a base-shaped addendum
//! with a requirement list; they contribute only when every required bundle
//! is active and owned during the same recompute pass.

use crate::entry::{ResourceEntry, ResourceType};
use serde::{Deserialize, Serialize};

/// A named, ordered batch of manifest entries.
///
/// Entry order within an addendum is load-bearing: when the same `(type, id)`
/// appears twice, the later entry wins during composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addendum {
    /// Addendum name. For bundle addendums this doubles as the bundle name
    /// passed to the ownership oracle.
    pub name: String,

    /// Entries in manifest order.
    pub entries: Vec<ResourceEntry>,
}

impl Addendum {
    pub fn new(name: impl Into<String>, entries: Vec<ResourceEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Entries of one resource type, in manifest order.
    ///
    /// Reads the addendum directly rather than the composed view, so entries
    /// shadowed by later layers are still returned.
    pub fn entries_of_type(&self, resource_type: &ResourceType) -> Vec<&ResourceEntry> {
        self.entries
            .iter()
            .filter(|entry| &entry.resource_type == resource_type)
            .collect()
    }
}

/// A mod's addendum plus the bundles it depends on.
///
/// The requirement list gates the whole addendum: if any required bundle is
/// missing or unowned at recompute time, none of the entries contribute.
/// There is no partial activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModAddendum {
    pub addendum: Addendum,

    /// Names of base addendums that must be active and owned.
    /// An empty list means the addendum is unconditionally active.
    #[serde(default)]
    pub required_addendums: Vec<String>,
}

impl ModAddendum {
    pub fn new(addendum: Addendum, required_addendums: Vec<String>) -> Self {
        Self {
            addendum,
            required_addendums,
        }
    }
}
