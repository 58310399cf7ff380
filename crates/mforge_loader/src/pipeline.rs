//! The load pipeline.
//!
//! For every resource the host loads as text, the pipeline runs:
//!
//! 1. **Cached-merge fast path** — if the merge cache holds a valid merged
//!    result for the entry, serve it and skip everything else except the
//!    database import bookkeeping.
//! 2. **Content processors** — registered [`ContentProcessor`]s transform
//!    the raw text in registration order. A failing processor is logged and
//!    skipped; the text from the previous stage carries forward.
//! 3. **Merge and cache** — pending mod merges are applied and the result
//!    persisted for the next session.
//! 4. **Database import** — the final text is offered to the database cache,
//!    which imports it only if its type is database-relevant and its row is
//!    outdated.
//!
//! Nothing in this flow aborts the host load. The worst outcome of any
//! failure is serving distribution-default content, which is always safe.

use crate::error::Result;
use mforge_cache::{DatabaseCache, MergeCache, MergeLookup, MetadataStore};
use mforge_manifest::{ManifestResolver, ResourceEntry};

/// A loader-type-specific transformation of loaded resource text.
///
/// Implementations are registered on the pipeline explicitly, one per
/// loader type that needs to post-process content (enum extension tables,
/// localization fix-ups, ...). They run before mod merges are applied.
pub trait ContentProcessor {
    /// Short name for diagnostics.
    fn name(&self) -> &str;

    /// Transform the loaded text for `entry`.
    fn on_content_loaded(&mut self, entry: &ResourceEntry, text: String) -> Result<String>;
}

/// Owns the resolver and both caches, and processes loaded resource text.
pub struct LoadPipeline<S: MetadataStore + 'static> {
    resolver: ManifestResolver,
    merge_cache: MergeCache,
    database_cache: DatabaseCache<S>,
    processors: Vec<Box<dyn ContentProcessor>>,
}

impl<S: MetadataStore + 'static> LoadPipeline<S> {
    pub fn new(
        resolver: ManifestResolver,
        merge_cache: MergeCache,
        database_cache: DatabaseCache<S>,
    ) -> Self {
        Self {
            resolver,
            merge_cache,
            database_cache,
            processors: Vec::new(),
        }
    }

    /// Register a content processor. Processors run in registration order.
    pub fn register_processor(&mut self, processor: Box<dyn ContentProcessor>) {
        self.processors.push(processor);
    }

    pub fn resolver(&mut self) -> &mut ManifestResolver {
        &mut self.resolver
    }

    pub fn merge_cache(&mut self) -> &mut MergeCache {
        &mut self.merge_cache
    }

    pub fn database_cache(&mut self) -> &mut DatabaseCache<S> {
        &mut self.database_cache
    }

    /// Run loaded text through the merge and import stages.
    ///
    /// Returns the text the host should actually use.
    pub fn process_loaded_text(&mut self, entry: &ResourceEntry, raw: String) -> String {
        if let MergeLookup::HitContent(cached) = self.merge_cache.lookup(entry, true) {
            tracing::debug!("Serving cached merge for {entry}");
            // a rebuilt database has no row for this entry and must relearn
            // the merged content even when it is distribution-sourced
            self.database_cache.add_merged(entry, &cached, true);
            return cached;
        }

        let mut text = raw;
        for processor in &mut self.processors {
            text = match processor.on_content_loaded(entry, text.clone()) {
                Ok(processed) => processed,
                Err(e) => {
                    tracing::warn!(
                        "Processor '{}' failed for {entry}, keeping previous text: {e}",
                        processor.name()
                    );
                    text
                }
            };
        }

        // A fresh merge imports unconditionally: the operation set may have
        // changed while the source timestamp did not.
        if self.merge_cache.has_pending(entry) {
            let text = self.merge_cache.merge_and_cache(entry, text);
            self.database_cache.add_merged(entry, &text, false);
            return text;
        }

        self.database_cache.add(entry, &text, true);
        text
    }

    /// Persist both caches. Safe to call at any quiet point; clean caches
    /// skip their writes.
    pub fn checkpoint(&mut self) {
        self.merge_cache.save();
        self.database_cache.save();
    }

    /// Checkpoint and block until background writes complete.
    pub fn shutdown(&mut self) {
        self.checkpoint();
        self.database_cache.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::{Utf8Path, Utf8PathBuf};
    use chrono::{DateTime, TimeZone, Utc};
    use mforge_cache::{Contributor, FileMetadataStore};
    use mforge_manifest::ResourceType;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, secs).unwrap()
    }

    fn mech() -> ResourceType {
        ResourceType::new("MechDef")
    }

    fn new_pipeline(root: &Utf8Path) -> LoadPipeline<FileMetadataStore> {
        let resolver = ManifestResolver::new(vec![ResourceEntry::new(
            "mechdef_atlas",
            mech(),
            root.join("dist/mechdef_atlas.json"),
            ts(1),
            "1.0",
        )]);
        let merge_cache = MergeCache::new(root.join("merge_cache"));
        let database_cache = DatabaseCache::new(
            root.join("db_cache"),
            root.join("dist/metadata.db"),
            root.join("dist"),
            [mech()].into_iter().collect::<HashSet<_>>(),
            FileMetadataStore::new(),
        );
        LoadPipeline::new(resolver, merge_cache, database_cache)
    }

    fn json_contributor(root: &Utf8Path) -> Contributor {
        let source_path = root.join("mods/ModA/mechdef_atlas.json");
        std::fs::create_dir_all(source_path.parent().unwrap().as_std_path()).unwrap();
        std::fs::write(source_path.as_std_path(), r#"{"armor": 100}"#).unwrap();
        Contributor {
            mod_name: "ModA".to_string(),
            id: "mechdef_atlas".to_string(),
            resource_type: Some(mech()),
            source_path,
            updated_on: ts(10),
            merge_json: true,
            append_text: false,
        }
    }

    struct Upcaser;

    impl ContentProcessor for Upcaser {
        fn name(&self) -> &str {
            "upcaser"
        }

        fn on_content_loaded(&mut self, _entry: &ResourceEntry, text: String) -> Result<String> {
            Ok(text.to_uppercase())
        }
    }

    struct Failing;

    impl ContentProcessor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_content_loaded(&mut self, _entry: &ResourceEntry, _text: String) -> Result<String> {
            Err(crate::Error::Processor {
                name: "failing".to_string(),
                message: "nope".to_string(),
            })
        }
    }

    #[test]
    fn test_merge_then_import_then_cached_fast_path() {
        let dir = tempdir().unwrap();
        let root = utf8_dir(&dir);
        let mut pipeline = new_pipeline(&root);

        pipeline
            .merge_cache()
            .register_contributor(&json_contributor(&root));

        let entry = pipeline
            .resolver()
            .entry_by_id("mechdef_atlas", &mech(), false)
            .unwrap()
            .clone();

        let raw = r#"{"armor": 50, "name": "Atlas"}"#.to_string();
        let merged = pipeline.process_loaded_text(&entry, raw.clone());

        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["armor"], 100);
        assert_eq!(value["name"], "Atlas");

        // the merged content was imported into the metadata store
        {
            let store = pipeline.database_cache().store().lock().unwrap();
            let imported = store.get(&mech(), "mechdef_atlas").unwrap();
            assert!(imported.contains("100"));
        }

        pipeline.shutdown();

        // a second load is served from the cache and yields identical text
        let again = pipeline.process_loaded_text(&entry, raw);
        assert_eq!(again, merged);
    }

    #[test]
    fn test_processors_run_in_order_and_failures_are_skipped() {
        let dir = tempdir().unwrap();
        let root = utf8_dir(&dir);
        let mut pipeline = new_pipeline(&root);
        pipeline.register_processor(Box::new(Failing));
        pipeline.register_processor(Box::new(Upcaser));

        let entry = ResourceEntry::new(
            "gametips_general",
            ResourceType::new("GameTip"),
            "dist/gametips_general.txt",
            ts(1),
            "1.0",
        );

        // the failing processor is skipped, the upcaser still runs
        let text = pipeline.process_loaded_text(&entry, "a tip".to_string());
        assert_eq!(text, "A TIP");
    }

    #[test]
    fn test_database_rebuild_relearns_cached_merges() {
        let dir = tempdir().unwrap();
        let root = utf8_dir(&dir);
        let raw = r#"{"armor": 50, "name": "Atlas"}"#.to_string();

        // first session: merge, import, checkpoint
        let merged = {
            let mut pipeline = new_pipeline(&root);
            pipeline
                .merge_cache()
                .register_contributor(&json_contributor(&root));
            let entry = pipeline
                .resolver()
                .entry_by_id("mechdef_atlas", &mech(), false)
                .unwrap()
                .clone();
            let merged = pipeline.process_loaded_text(&entry, raw.clone());
            pipeline.shutdown();
            merged
        };

        // losing the artifact forces a database rebuild from the baseline
        std::fs::remove_file(root.join("db_cache/metadata.db.zst").as_std_path()).unwrap();

        // second session: the merge cache hits, and the rebuilt database
        // still relearns the merged row for the distribution-sourced entry
        let mut pipeline = new_pipeline(&root);
        pipeline
            .merge_cache()
            .register_contributor(&json_contributor(&root));
        let entry = pipeline
            .resolver()
            .entry_by_id("mechdef_atlas", &mech(), false)
            .unwrap()
            .clone();
        let again = pipeline.process_loaded_text(&entry, raw);
        assert_eq!(again, merged);

        let store = pipeline.database_cache().store().lock().unwrap();
        let imported = store.get(&mech(), "mechdef_atlas").unwrap();
        assert!(imported.contains("100"));
    }

    #[test]
    fn test_unmerged_entry_passes_through() {
        let dir = tempdir().unwrap();
        let root = utf8_dir(&dir);
        let mut pipeline = new_pipeline(&root);

        let entry = ResourceEntry::new(
            "mechdef_atlas",
            mech(),
            root.join("mods/ModB/mechdef_atlas.json"),
            ts(5),
            "1.0",
        );
        let text = pipeline.process_loaded_text(&entry, "{}".to_string());
        assert_eq!(text, "{}");
    }
}
