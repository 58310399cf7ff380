//! Merge operations.
//!
//! A [`MergeOp`] is the unit of work a mod contributes against a target
//! resource: either a JSON deep-merge patch or a raw text append. The cache
//! layer treats operations as opaque values — it only needs order-sensitive
//! equality for staleness comparison — but application lives here too.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One pending edit against a target resource's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeOp {
    /// Deep-merge this JSON value into the target. The target content must
    /// itself parse as JSON.
    JsonMerge(Value),

    /// Append this text verbatim to the target content.
    AppendText(String),
}

impl MergeOp {
    /// Apply the operation to `content`, producing the merged content.
    pub fn apply(&self, content: &str) -> Result<String> {
        match self {
            MergeOp::JsonMerge(patch) => {
                let mut base: Value = serde_json::from_str(content)
                    .map_err(|e| Error::Merge(format!("target content is not JSON: {e}")))?;
                deep_merge(&mut base, patch);
                Ok(serde_json::to_string_pretty(&base)?)
            }
            MergeOp::AppendText(text) => Ok(format!("{content}{text}")),
        }
    }
}

/// Recursively merge `patch` into `base`.
///
/// Objects merge key-by-key; any other value (including arrays) replaces the
/// base value outright.
fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, patch_value),
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_text() {
        let op = MergeOp::AppendText("!".to_string());
        assert_eq!(op.apply("base").unwrap(), "base!");
    }

    #[test]
    fn test_json_merge_nested_objects() {
        let op = MergeOp::JsonMerge(json!({"stats": {"armor": 100}, "tag": "modded"}));
        let merged = op
            .apply(r#"{"stats": {"armor": 50, "speed": 4}, "name": "Atlas"}"#)
            .unwrap();

        let value: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["stats"]["armor"], 100);
        assert_eq!(value["stats"]["speed"], 4);
        assert_eq!(value["name"], "Atlas");
        assert_eq!(value["tag"], "modded");
    }

    #[test]
    fn test_json_merge_replaces_arrays() {
        let op = MergeOp::JsonMerge(json!({"weapons": ["ac20"]}));
        let merged = op.apply(r#"{"weapons": ["laser", "srm6"]}"#).unwrap();

        let value: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["weapons"], json!(["ac20"]));
    }

    #[test]
    fn test_json_merge_rejects_non_json_target() {
        let op = MergeOp::JsonMerge(json!({}));
        assert!(matches!(op.apply("plain text"), Err(Error::Merge(_))));
    }

    #[test]
    fn test_op_equality_is_payload_sensitive() {
        assert_eq!(
            MergeOp::AppendText("!".into()),
            MergeOp::AppendText("!".into())
        );
        assert_ne!(
            MergeOp::AppendText("!".into()),
            MergeOp::AppendText("?".into())
        );
        assert_ne!(
            MergeOp::JsonMerge(json!({"a": 1})),
            MergeOp::JsonMerge(json!({"a": 2}))
        );
    }
}
