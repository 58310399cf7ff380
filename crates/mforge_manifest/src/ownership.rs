//! Bundle ownership oracle.
//!
//! Ownership data (which DLC bundles the player has purchased/unlocked) is
//! supplied by the host's content pack index and becomes available well after
//! the first manifest queries. The resolver therefore treats an absent oracle
//! as "everything owned" — the same fail-open behavior the vanilla loader
//! exhibits before its pack index finishes loading.

/// Capability for checking content bundle ownership.
pub trait OwnershipOracle {
    /// Whether the named content bundle is owned by the player.
    fn is_bundle_owned(&self, name: &str) -> bool;

    /// Whether ownership information has finished loading for all bundles.
    ///
    /// Until this reports `true`, ownership answers may be provisional and
    /// finalization logging is deferred.
    fn all_bundles_loaded(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::OwnershipOracle;
    use std::collections::HashMap;

    /// Map-backed oracle for tests. Unknown bundles are unowned.
    pub struct MapOracle {
        owned: HashMap<String, bool>,
        loaded: bool,
    }

    impl MapOracle {
        pub fn new(owned: &[(&str, bool)], loaded: bool) -> Self {
            Self {
                owned: owned
                    .iter()
                    .map(|(name, v)| (name.to_string(), *v))
                    .collect(),
                loaded,
            }
        }
    }

    impl OwnershipOracle for MapOracle {
        fn is_bundle_owned(&self, name: &str) -> bool {
            self.owned.get(name).copied().unwrap_or(false)
        }

        fn all_bundles_loaded(&self) -> bool {
            self.loaded
        }
    }
}
