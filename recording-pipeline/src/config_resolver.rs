//! Effective-config resolver (§4.3).
//!
//! Produces the effective config for one step by deep-merging an ordered
//! chain of layers. The merge itself is a small recursive function over
//! `serde_json::Value`: objects merge key-by-key (recursing into nested
//! objects), arrays and scalars are replaced wholesale. `deep_merge` never
//! mutates its inputs — it always returns a new, fully-owned tree.

use serde_json::Value;

use crate::domain::{Recording, RecordingTemplate};

/// Recursively merge `overlay` onto `base`, returning a new tree.
///
/// - object + object: recurse key-by-key, union of keys
/// - anything else + anything: `overlay` wins wholesale (no list concatenation)
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (k, v) in overlay_map {
                let new_value = match merged.get(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v.clone(),
                };
                merged.insert(k.clone(), new_value);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

fn merge_many<'a>(layers: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut acc = Value::Object(Default::default());
    for layer in layers {
        acc = deep_merge(&acc, layer);
    }
    acc
}

/// A manual override passed into a single execution. `runtime_template_id`
/// is a resolver hint (layer 3 selector), not config — it is stripped
/// before being merged as layer 5.
#[derive(Debug, Clone, Default)]
pub struct ManualOverride {
    pub runtime_template_id: Option<i64>,
    pub processing_config: Option<Value>,
    pub output_config: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub processing: Value,
    pub metadata: Value,
    pub output: Option<Value>,
}

fn empty_obj() -> Value {
    Value::Object(Default::default())
}

fn sub(tree: &Value, key: &str) -> Value {
    tree.get(key).cloned().unwrap_or_else(empty_obj)
}

/// Flatten a nested `processing_config` subtree into the root, if present
/// (post-processing step in §4.3 — some templates store it nested).
fn flatten_nested_processing_config(mut tree: Value) -> Value {
    if let Value::Object(map) = &mut tree {
        if let Some(Value::Object(nested)) = map.remove("processing_config") {
            for (k, v) in nested {
                map.entry(k).or_insert(v);
            }
        }
    }
    tree
}

/// Merge `transcription_vocabulary` (template-level list) into
/// `transcription.vocabulary`, deduplicated and trimmed.
fn merge_vocabulary(mut tree: Value, extra_vocab: Option<&Value>) -> Value {
    let Some(Value::Array(extra)) = extra_vocab else {
        return tree;
    };
    if let Value::Object(map) = &mut tree {
        let transcription = map
            .entry("transcription")
            .or_insert_with(empty_obj);
        if let Value::Object(t) = transcription {
            let mut vocab: Vec<String> = t
                .get("vocabulary")
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            for v in extra {
                if let Some(s) = v.as_str() {
                    let s = s.trim();
                    if !s.is_empty() && !vocab.iter().any(|existing| existing == s) {
                        vocab.push(s.to_string());
                    }
                }
            }
            t.insert(
                "vocabulary".to_string(),
                Value::Array(vocab.into_iter().map(Value::String).collect()),
            );
        }
    }
    tree
}

pub struct ConfigResolver;

impl ConfigResolver {
    /// Resolve the effective config for one step execution (§4.3).
    ///
    /// Layer precedence, lowest to highest:
    /// 1. `user.config`
    /// 2. `recording.template.{processing,metadata,output}_config`
    /// 3. runtime template (if `manual_override.runtime_template_id` is set)
    /// 4. `recording.processing_preferences`
    /// 5. `manual_override.{processing,output}_config`
    pub fn resolve(
        user_config: &Value,
        template: Option<&RecordingTemplate>,
        runtime_template: Option<&RecordingTemplate>,
        recording: &Recording,
        manual_override: Option<&ManualOverride>,
        include_output_config: bool,
    ) -> EffectiveConfig {
        let layer1_processing = sub(user_config, "processing");
        let layer1_metadata = sub(user_config, "metadata");

        let layer2_processing = template
            .map(|t| t.processing_config.clone())
            .unwrap_or_else(empty_obj);
        let layer2_metadata = template
            .map(|t| t.metadata_config.clone())
            .unwrap_or_else(empty_obj);

        let layer3_processing = runtime_template
            .map(|t| t.processing_config.clone())
            .unwrap_or_else(empty_obj);
        let layer3_metadata = runtime_template
            .map(|t| t.metadata_config.clone())
            .unwrap_or_else(empty_obj);

        let layer4 = recording
            .processing_preferences
            .clone()
            .unwrap_or_else(empty_obj);

        let layer5_processing = manual_override
            .and_then(|m| m.processing_config.clone())
            .unwrap_or_else(empty_obj);

        let mut processing = merge_many([
            &layer1_processing,
            &layer2_processing,
            &layer3_processing,
            &layer4,
            &layer5_processing,
        ]);
        processing = flatten_nested_processing_config(processing);

        let vocab_extra = template.and_then(|t| t.processing_config.get("transcription_vocabulary"));
        processing = merge_vocabulary(processing, vocab_extra);

        let metadata = merge_many([&layer1_metadata, &layer2_metadata, &layer3_metadata]);

        let output = if include_output_config {
            let layer2_output = template
                .map(|t| t.output_config.clone())
                .unwrap_or_else(empty_obj);
            let layer3_output = runtime_template
                .map(|t| t.output_config.clone())
                .unwrap_or_else(empty_obj);
            let layer5_output = manual_override
                .and_then(|m| m.output_config.clone())
                .unwrap_or_else(empty_obj);
            Some(merge_many([&layer2_output, &layer3_output, &layer5_output]))
        } else {
            None
        };

        EffectiveConfig {
            processing,
            metadata,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_idempotent() {
        let a = json!({"trimming": {"enable_trimming": true}, "download": {"force": false}});
        let b = json!({"trimming": {"silence_threshold": -40.0}});
        let once = deep_merge(&a, &b);
        let twice = deep_merge(&once, &b);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_with_empty_is_deep_copy() {
        let a = json!({"a": {"b": 1}});
        let merged = deep_merge(&a, &json!({}));
        assert_eq!(merged, a);
    }

    #[test]
    fn lists_replace_not_concatenate() {
        let a = json!({"platforms": ["youtube"]});
        let b = json!({"platforms": ["vk", "rutube"]});
        let merged = deep_merge(&a, &b);
        assert_eq!(merged, json!({"platforms": ["vk", "rutube"]}));
    }

    #[test]
    fn nested_processing_config_is_flattened() {
        let tree = json!({"processing_config": {"trimming": {"enable_trimming": true}}, "other": 1});
        let flattened = flatten_nested_processing_config(tree);
        assert_eq!(flattened["trimming"]["enable_trimming"], json!(true));
        assert_eq!(flattened["other"], json!(1));
        assert!(flattened.get("processing_config").is_none());
    }

    #[test]
    fn vocabulary_is_merged_and_deduplicated() {
        let tree = json!({"transcription": {"vocabulary": ["alpha"]}});
        let extra = json!(["beta", " alpha ", "  "]);
        let merged = merge_vocabulary(tree, Some(&extra));
        let vocab: Vec<&str> = merged["transcription"]["vocabulary"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(vocab, vec!["alpha", "beta"]);
    }
}
