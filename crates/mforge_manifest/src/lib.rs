//! Layered content manifest resolver for mod loading.
//!
//! The game ships a default resource catalog, content bundles (DLC) extend it
//! with *addendums*, and third-party mods layer their own addendums on top.
//! This crate resolves that stack into a single authoritative view mapping
//! `(resource type, resource id)` to the one entry that should be used at
//! runtime. It supports:
//!
//! - **Override precedence**: Later layers replace earlier entries for the
//!   same `(type, id)` — duplicates are expected, not errors
//! - **Ownership gating**: Bundle addendums only contribute once the bundle
//!   is confirmed owned (fail-open before ownership data loads)
//! - **Requirement gating**: Mod addendums activate only when every bundle
//!   they require is active and owned
//! - **Lazy recompute**: The composed view is rebuilt behind a dirty flag,
//!   so batched registration and repeated queries stay cheap
//!
//! # Example
//!
//! ```
//! use mforge_manifest::{Addendum, ManifestResolver, ModAddendum, ResourceEntry, ResourceType};
//! use chrono::Utc;
//!
//! let mech = ResourceType::new("MechDef");
//! let base = vec![ResourceEntry::new("atlas", mech.clone(), "base/atlas.json", Utc::now(), "1.0")];
//!
//! let mut resolver = ManifestResolver::new(base);
//! resolver.register_mod_addendum(ModAddendum::new(
//!     Addendum::new("MyMod", vec![
//!         ResourceEntry::new("atlas", mech.clone(), "mods/MyMod/atlas.json", Utc::now(), "1.0"),
//!     ]),
//!     vec![],
//! ));
//!
//! let entry = resolver.entry_by_id("atlas", &mech, false).unwrap();
//! assert_eq!(entry.source_path, "mods/MyMod/atlas.json");
//! ```

pub mod addendum;
pub mod entry;
pub mod error;
pub mod ownership;
pub mod resolver;
pub mod view;

pub use addendum::{Addendum, ModAddendum};
pub use entry::{ResourceEntry, ResourceType};
pub use error::{Error, Result};
pub use ownership::OwnershipOracle;
pub use resolver::ManifestResolver;
pub use view::TypedView;
