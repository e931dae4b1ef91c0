//! Coerce loosely-typed model JSON into [`AnalysisResult`].
//!
//! Coercion rules, applied per field:
//!
//! | Field             | Missing / wrong type | String          | Sequence / mapping                  |
//! |-------------------|----------------------|-----------------|-------------------------------------|
//! | `brand_list`      | `[]`                 | `[s]`           | strings kept, others dropped, deduped |
//! | `spu_list`        | `[]`                 | `[s]`           | strings kept, others dropped        |
//! | `emotion_dict`    | `{}`                 | `{}`            | label → synonym table, else neutral |
//! | `evaluation_dict` | `{}`                 | `{}`            | scalar string → `[s]`, lists filtered |
//!
//! Strings are trimmed and empty strings dropped. Dictionary keys are not
//! checked against the lists.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use xhsop_core::{AnalysisResult, Emotion};

use crate::error::NormalizeError;
use crate::synonyms::EmotionSynonyms;

/// Normalize a parsed model response.
///
/// # Errors
///
/// Returns [`NormalizeError::NotAnObject`] when `parsed` is not a JSON object.
pub fn normalize(
    parsed: &Value,
    synonyms: &EmotionSynonyms,
) -> Result<AnalysisResult, NormalizeError> {
    let Value::Object(fields) = parsed else {
        return Err(NormalizeError::NotAnObject(json_kind(parsed)));
    };

    let mut brand_list = string_list(fields.get("brand_list"));
    dedup_in_order(&mut brand_list);

    Ok(AnalysisResult {
        brand_list,
        spu_list: string_list(fields.get("spu_list")),
        emotion_dict: emotion_dict(fields.get("emotion_dict"), synonyms),
        evaluation_dict: evaluation_dict(fields.get("evaluation_dict")),
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => clean(s).into_iter().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(clean)
            .collect(),
        _ => Vec::new(),
    }
}

fn emotion_dict(value: Option<&Value>, synonyms: &EmotionSynonyms) -> BTreeMap<String, Emotion> {
    object_entries(value)
        .map(|(key, label)| {
            let emotion = label
                .as_str()
                .map_or(Emotion::Neutral, |l| synonyms.resolve(l));
            (key, emotion)
        })
        .collect()
}

fn evaluation_dict(value: Option<&Value>) -> BTreeMap<String, Vec<String>> {
    object_entries(value)
        .map(|(key, phrases)| (key, string_list(Some(phrases))))
        .collect()
}

/// Entries of an object value with trimmed, non-empty keys.
fn object_entries(value: Option<&Value>) -> impl Iterator<Item = (String, &Value)> {
    value
        .and_then(Value::as_object)
        .map(Map::iter)
        .into_iter()
        .flatten()
        .filter_map(|(key, v)| clean(key).map(|k| (k, v)))
}

fn clean(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(value: &Value) -> AnalysisResult {
        normalize(value, &EmotionSynonyms::default()).unwrap()
    }

    #[test]
    fn missing_fields_become_empty_containers() {
        let result = run(&json!({}));
        assert_eq!(result, AnalysisResult::default());
    }

    #[test]
    fn single_string_lists_are_wrapped() {
        let result = run(&json!({"brand_list": "兰蔻", "spu_list": "小黑瓶"}));
        assert_eq!(result.brand_list, ["兰蔻"]);
        assert_eq!(result.spu_list, ["小黑瓶"]);
    }

    #[test]
    fn non_string_list_elements_are_dropped() {
        let result = run(&json!({"brand_list": ["A", 1, null, {"x": 1}, "B", "  "]}));
        assert_eq!(result.brand_list, ["A", "B"]);
    }

    #[test]
    fn brand_list_is_deduplicated_in_order() {
        let result = run(&json!({"brand_list": ["B", "A", "B", " A "]}));
        assert_eq!(result.brand_list, ["B", "A"]);
    }

    #[test]
    fn wrong_container_types_become_empty() {
        let result = run(&json!({
            "brand_list": {"A": 1},
            "spu_list": 42,
            "emotion_dict": ["正向"],
            "evaluation_dict": "好用"
        }));
        assert_eq!(result, AnalysisResult::default());
    }

    #[test]
    fn emotion_synonyms_are_mapped() {
        let result = run(&json!({"emotion_dict": {
            "兰蔻": "正面",
            "雅诗兰黛": "negative",
            "花西子": "一般",
            "珀莱雅": "正向"
        }}));
        assert_eq!(result.emotion_dict["兰蔻"], Emotion::Positive);
        assert_eq!(result.emotion_dict["雅诗兰黛"], Emotion::Negative);
        assert_eq!(result.emotion_dict["花西子"], Emotion::Neutral);
        assert_eq!(result.emotion_dict["珀莱雅"], Emotion::Positive);
    }

    #[test]
    fn unrecognized_or_non_string_emotions_are_neutral() {
        let result = run(&json!({"emotion_dict": {"A": "ecstatic", "B": 5, "C": null}}));
        assert!(result.emotion_dict.values().all(|e| *e == Emotion::Neutral));
        assert_eq!(result.emotion_dict.len(), 3);
    }

    #[test]
    fn evaluation_scalars_are_wrapped_and_lists_filtered() {
        let result = run(&json!({"evaluation_dict": {
            "兰蔻": "好用",
            "SK-II": ["保湿", 3, "温和"],
            "X": 7
        }}));
        assert_eq!(result.evaluation_dict["兰蔻"], ["好用"]);
        assert_eq!(result.evaluation_dict["SK-II"], ["保湿", "温和"]);
        assert!(result.evaluation_dict["X"].is_empty());
    }

    #[test]
    fn dictionary_keys_need_not_be_listed() {
        let result = run(&json!({
            "brand_list": [],
            "emotion_dict": {"unlisted": "positive"}
        }));
        assert!(result.brand_list.is_empty());
        assert_eq!(result.emotion_dict["unlisted"], Emotion::Positive);
    }

    #[test]
    fn blank_keys_are_dropped() {
        let result = run(&json!({"emotion_dict": {" ": "正向", "A": "正向"}}));
        assert_eq!(result.emotion_dict.len(), 1);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let result = run(&json!({
            "brand_list": ["A"],
            "video_analysis": {"scenes": ["bathroom"]}
        }));
        assert_eq!(result.brand_list, ["A"]);
    }

    #[test]
    fn non_object_is_rejected() {
        let err = normalize(&json!(["A"]), &EmotionSynonyms::default()).unwrap_err();
        assert!(matches!(err, NormalizeError::NotAnObject("an array")));
        assert!(normalize(&json!(null), &EmotionSynonyms::default()).is_err());
    }

    #[test]
    fn normalizing_a_serialized_result_is_identity() {
        let original = run(&json!({
            "brand_list": ["兰蔻", "SK-II"],
            "spu_list": ["神仙水"],
            "emotion_dict": {"兰蔻": "好评", "SK-II": "差", "神仙水": "???"},
            "evaluation_dict": {"兰蔻": "好用", "神仙水": ["贵", "有效"]}
        }));
        let value = serde_json::to_value(&original).unwrap();
        assert_eq!(run(&value), original);
    }

    fn synonym_tables() -> Vec<(&'static str, EmotionSynonyms)> {
        vec![
            ("default", EmotionSynonyms::default()),
            (
                "custom",
                EmotionSynonyms::from_yaml("positive: [种草, love]\nnegative: [踩雷]\n").unwrap(),
            ),
            (
                "remapping",
                EmotionSynonyms::from_yaml("negative: [正向]\nneutral: [负向]\npositive: [中立]\n")
                    .unwrap(),
            ),
        ]
    }

    #[test]
    fn normalized_output_is_a_fixed_point_for_every_table() {
        let inputs = [
            json!({}),
            json!({"brand_list": "兰蔻"}),
            json!({"brand_list": [" 兰蔻 ", "兰蔻", "SK-II", 3, ""], "spu_list": ["  小黑瓶"]}),
            json!({"emotion_dict": {"兰蔻": "种草", "SK-II": "踩雷", "雅诗兰黛": "LOVE", " 花西子 ": 1}}),
            json!({"emotion_dict": {"A": "正向", "B": "负向", "C": "中立", "D": "正面"}}),
            json!({"evaluation_dict": {"兰蔻": " 好用 ", "SK-II": ["贵", null, " "], "X": {}}}),
            json!({
                "brand_list": ["兰蔻"],
                "spu_list": "小黑瓶",
                "emotion_dict": {"兰蔻": "好评", "小黑瓶": "差评"},
                "evaluation_dict": {"兰蔻": ["温和"], "小黑瓶": "贵"},
                "extra": true
            }),
        ];

        for (name, table) in synonym_tables() {
            for input in &inputs {
                let first = normalize(input, &table).unwrap();
                let value = serde_json::to_value(&first).unwrap();
                assert_eq!(
                    normalize(&value, &table).unwrap(),
                    first,
                    "table {name}, input {input}"
                );
            }
        }
    }

    #[test]
    fn hand_built_results_survive_normalization() {
        let results = [
            AnalysisResult::default(),
            AnalysisResult {
                brand_list: vec!["兰蔻".into(), "SK-II".into()],
                spu_list: vec!["小黑瓶".into(), "小黑瓶".into()],
                emotion_dict: BTreeMap::from([
                    ("兰蔻".into(), Emotion::Positive),
                    ("SK-II".into(), Emotion::Negative),
                    ("小黑瓶".into(), Emotion::Neutral),
                ]),
                evaluation_dict: BTreeMap::from([
                    ("兰蔻".into(), vec!["好用".into()]),
                    ("SK-II".into(), Vec::new()),
                ]),
            },
            AnalysisResult {
                brand_list: Vec::new(),
                spu_list: Vec::new(),
                emotion_dict: BTreeMap::from([("unlisted".into(), Emotion::Negative)]),
                evaluation_dict: BTreeMap::new(),
            },
        ];

        for (name, table) in synonym_tables() {
            for result in &results {
                let value = serde_json::to_value(result).unwrap();
                assert_eq!(&normalize(&value, &table).unwrap(), result, "table {name}");
            }
        }
    }

    #[test]
    fn untidy_hand_built_results_settle_after_one_pass() {
        let untidy = AnalysisResult {
            brand_list: vec![" 兰蔻".into(), "兰蔻".into(), String::new()],
            spu_list: vec!["  ".into(), "小黑瓶 ".into()],
            emotion_dict: BTreeMap::from([(" 兰蔻 ".into(), Emotion::Positive)]),
            evaluation_dict: BTreeMap::from([("兰蔻".into(), vec![" 好用".into(), String::new()])]),
        };

        for (name, table) in synonym_tables() {
            let once = normalize(&serde_json::to_value(&untidy).unwrap(), &table).unwrap();
            assert_eq!(once.brand_list, ["兰蔻"], "table {name}");
            assert_eq!(once.spu_list, ["小黑瓶"], "table {name}");
            assert_eq!(once.emotion_dict["兰蔻"], Emotion::Positive, "table {name}");
            assert_eq!(once.evaluation_dict["兰蔻"], ["好用"], "table {name}");

            let twice = normalize(&serde_json::to_value(&once).unwrap(), &table).unwrap();
            assert_eq!(twice, once, "table {name}");
        }
    }
}
