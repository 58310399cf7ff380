//! Resource entry and type identifier values.
//!
//! A [`ResourceEntry`] describes one loadable content item as listed by a
//! manifest: a mech definition, a weapon, a contract, a localization table.
//! The host game owns the actual catalog of type names; this crate treats
//! them as opaque [`ResourceType`] identifiers.

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque resource type identifier (e.g. `"MechDef"`, `"WeaponDef"`).
///
/// The set of valid type names is defined by the host game's catalog and is
/// not enumerated here. Two entries with equal `(type, id)` refer to the same
/// logical resource regardless of where they were loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One manifest entry: where a resource's content lives and how fresh it is.
///
/// Immutable once constructed. Overlay identity is `(resource_type, id)` —
/// multiple entries may share that identity across layers, and only the
/// latest one in the composed order is visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    /// Resource identifier, unique within its type.
    pub id: String,

    /// Resource type from the host catalog.
    pub resource_type: ResourceType,

    /// Where the raw content is read from.
    pub source_path: Utf8PathBuf,

    /// Last-modified marker of the source. Caches key their staleness
    /// checks on this, so loaders must fill it from real file metadata.
    pub updated_on: DateTime<Utc>,

    /// Version string carried through from the manifest.
    pub version: String,
}

impl ResourceEntry {
    pub fn new(
        id: impl Into<String>,
        resource_type: ResourceType,
        source_path: impl Into<Utf8PathBuf>,
        updated_on: DateTime<Utc>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type,
            source_path: source_path.into(),
            updated_on,
            version: version.into(),
        }
    }
}

impl fmt::Display for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}
