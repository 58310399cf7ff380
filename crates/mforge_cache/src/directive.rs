//! Merge directive files.
//!
//! A directive is a standalone JSON file shipped by a mod that names one or
//! more target resources to patch, instead of shadowing a same-named file.
//! This is how a single mod file edits many resources at once.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "targetId": "mechdef_atlas",
//!   "targetIds": ["mechdef_catapult", "mechdef_marauder"],
//!   "targetType": "MechDef",
//!   "patch": { "stats": { "armor": 100 } }
//! }
//! ```
//!
//! Exactly one of `patch` (JSON deep-merge) or `append` (text append) must be
//! present. `targetId` and `targetIds` combine; at least one target is
//! required. Malformed directives are dropped with a logged warning by the
//! merge cache — they are never fatal to the overall load.

use crate::error::Result;
use crate::merge::MergeOp;
use camino::Utf8Path;
use mforge_manifest::ResourceType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource type name that marks a mod file as a merge directive.
pub const DIRECTIVE_TYPE: &str = "MergeDirective";

/// A parsed directive file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDirective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ids: Vec<String>,

    /// Type of the targets. `None` targets the legacy untyped key space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<ResourceType>,

    /// JSON value deep-merged into each target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Value>,

    /// Text appended verbatim to each target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<String>,
}

impl MergeDirective {
    /// Parse a directive from a JSON file.
    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_std_path())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// All target ids, `target_id` first.
    pub fn targets(&self) -> Vec<&str> {
        self.target_id
            .iter()
            .chain(self.target_ids.iter())
            .map(String::as_str)
            .collect()
    }

    /// The merge operation this directive contributes, if it names one.
    ///
    /// `patch` wins if both are present (the duplicate is a mod authoring
    /// mistake the caller warns about via [`is_ambiguous`](Self::is_ambiguous)).
    pub fn op(&self) -> Option<MergeOp> {
        if let Some(patch) = &self.patch {
            return Some(MergeOp::JsonMerge(patch.clone()));
        }
        self.append.clone().map(MergeOp::AppendText)
    }

    /// Whether both `patch` and `append` were supplied.
    pub fn is_ambiguous(&self) -> bool {
        self.patch.is_some() && self.append.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_parse_full_directive() {
        let directive: MergeDirective = serde_json::from_str(
            r#"{
                "targetId": "mechdef_atlas",
                "targetIds": ["mechdef_catapult"],
                "targetType": "MechDef",
                "patch": {"stats": {"armor": 100}}
            }"#,
        )
        .unwrap();

        assert_eq!(directive.targets(), vec!["mechdef_atlas", "mechdef_catapult"]);
        assert_eq!(directive.target_type, Some(ResourceType::new("MechDef")));
        assert_eq!(
            directive.op(),
            Some(MergeOp::JsonMerge(json!({"stats": {"armor": 100}})))
        );
        assert!(!directive.is_ambiguous());
    }

    #[test]
    fn test_directive_without_targets_or_op() {
        let directive: MergeDirective = serde_json::from_str("{}").unwrap();
        assert!(directive.targets().is_empty());
        assert!(directive.op().is_none());
    }

    #[test]
    fn test_append_directive() {
        let directive: MergeDirective = serde_json::from_str(
            r#"{"targetId": "gametips_general", "append": "\nnew tip"}"#,
        )
        .unwrap();
        assert_eq!(
            directive.op(),
            Some(MergeOp::AppendText("\nnew tip".to_string()))
        );
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("directive.json")).unwrap();
        std::fs::write(
            path.as_std_path(),
            r#"{"targetId": "mechdef_atlas", "patch": {}}"#,
        )
        .unwrap();

        let directive = MergeDirective::from_file(&path).unwrap();
        assert_eq!(directive.targets(), vec!["mechdef_atlas"]);
    }

    #[test]
    fn test_from_file_malformed_is_error() {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("directive.json")).unwrap();
        std::fs::write(path.as_std_path(), "{ not json").unwrap();
        assert!(MergeDirective::from_file(&path).is_err());
    }
}
