//! Cache keys.
//!
//! A [`CacheKey`] uniquely identifies a cacheable unit as
//! `(resource type, resource id)`. Equality is structural: two entries with
//! equal `(type, id)` map to the same key regardless of source path.
//!
//! The untyped form `(None, id)` exists only to read cache rows written by
//! old versions that keyed on id alone; [`MergeCache`](crate::MergeCache)
//! migrates such rows to the typed form the first time they are touched.

use mforge_manifest::{ResourceEntry, ResourceType};
use camino::Utf8PathBuf;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Structural identity of a cacheable unit.
///
/// Serializes as the string `"Type:id"` (legacy untyped form `":id"`) so the
/// persisted row tables keep human-readable string keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub resource_type: Option<ResourceType>,
    pub id: String,
}

impl CacheKey {
    /// The typed key for a manifest entry.
    pub fn of(entry: &ResourceEntry) -> Self {
        Self {
            resource_type: Some(entry.resource_type.clone()),
            id: entry.id.clone(),
        }
    }

    /// The legacy untyped key for an id. Migration-only.
    pub fn untyped(id: impl Into<String>) -> Self {
        Self {
            resource_type: None,
            id: id.into(),
        }
    }

    /// Relative path under a cache directory for this key's cached blob.
    pub fn cached_rel_path(&self) -> Utf8PathBuf {
        let type_dir = self
            .resource_type
            .as_ref()
            .map(ResourceType::as_str)
            .unwrap_or("untyped");
        Utf8PathBuf::from(type_dir).join(&self.id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_type {
            Some(ty) => write!(f, "{}:{}", ty, self.id),
            None => write!(f, ":{}", self.id),
        }
    }
}

/// The string form of a cache key did not contain a `:` separator.
#[derive(Debug, Error)]
#[error("invalid cache key '{0}': missing ':' separator")]
pub struct ParseCacheKeyError(String);

impl FromStr for CacheKey {
    type Err = ParseCacheKeyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // type names never contain ':', ids may — split on the first one
        let (type_part, id) = s
            .split_once(':')
            .ok_or_else(|| ParseCacheKeyError(s.to_string()))?;
        Ok(Self {
            resource_type: (!type_part.is_empty()).then(|| ResourceType::new(type_part)),
            id: id.to_string(),
        })
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
