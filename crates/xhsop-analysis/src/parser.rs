//! Raw model text in, [`AnalysisOutcome`] out.

use std::sync::Arc;

use xhsop_core::{AnalysisOutcome, FailureKind};

use crate::extract::extract_json;
use crate::normalize::normalize;
use crate::synonyms::EmotionSynonyms;

/// Longest prefix of raw text echoed into logs.
const LOG_PREVIEW_CHARS: usize = 200;

/// Turns one model response into an analysis outcome.
///
/// [`AnalysisParser::parse`] is total: every input, including empty strings
/// and garbage, yields an outcome. There are no retries here; one extraction,
/// one JSON parse, one normalization pass.
#[derive(Debug, Clone, Default)]
pub struct AnalysisParser {
    synonyms: Arc<EmotionSynonyms>,
}

impl AnalysisParser {
    #[must_use]
    pub fn new(synonyms: EmotionSynonyms) -> Self {
        Self {
            synonyms: Arc::new(synonyms),
        }
    }

    /// Parse a raw model response.
    #[must_use]
    pub fn parse(&self, raw_text: &str) -> AnalysisOutcome {
        let Some(candidate) = extract_json(raw_text) else {
            tracing::warn!(
                len = raw_text.len(),
                preview = %preview(raw_text),
                "no JSON object found in model response"
            );
            return AnalysisOutcome::failed(
                FailureKind::ExtractionFailed,
                "no JSON object found in model response",
            );
        };

        let value: serde_json::Value = match serde_json::from_str(candidate) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    preview = %preview(candidate),
                    "model response is not valid JSON"
                );
                return AnalysisOutcome::failed(FailureKind::JsonParseError, e.to_string());
            }
        };

        match normalize(&value, &self.synonyms) {
            Ok(result) => AnalysisOutcome::Analyzed(result),
            Err(e) => {
                tracing::warn!(error = %e, "model response did not match the analysis schema");
                AnalysisOutcome::failed(FailureKind::UnexpectedError, e.to_string())
            }
        }
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use xhsop_core::{AnalysisResult, Emotion};

    use super::*;

    fn parse(text: &str) -> AnalysisOutcome {
        AnalysisParser::default().parse(text)
    }

    fn kind(outcome: &AnalysisOutcome) -> Option<FailureKind> {
        outcome.failure().map(|f| f.kind)
    }

    #[test]
    fn scalar_evaluation_is_wrapped_and_emotion_normalized() {
        let outcome = parse(
            r#"{"brand_list": ["兰蔻"], "spu_list": [], "emotion_dict": {"兰蔻": "正面"}, "evaluation_dict": {"兰蔻": "好用"}}"#,
        );
        let result = match outcome {
            AnalysisOutcome::Analyzed(result) => result,
            other @ AnalysisOutcome::Failed(_) => panic!("expected success, got {other:?}"),
        };
        assert_eq!(result.brand_list, ["兰蔻"]);
        assert_eq!(result.emotion_dict["兰蔻"], Emotion::Positive);
        assert_eq!(result.evaluation_dict["兰蔻"], ["好用"]);
    }

    #[test]
    fn fenced_json_with_missing_fields_succeeds() {
        let outcome = parse("```json\n{\"brand_list\": []}\n```");
        assert_eq!(outcome, AnalysisOutcome::Analyzed(AnalysisResult::default()));
    }

    #[test]
    fn refusal_is_extraction_failed() {
        let outcome = parse("I'm sorry, I cannot analyze this.");
        assert_eq!(kind(&outcome), Some(FailureKind::ExtractionFailed));
        assert!(outcome.result().is_empty());
    }

    #[test]
    fn truncated_json_is_parse_error() {
        let outcome = parse(r#"{"brand_list": ["A""#);
        assert_eq!(kind(&outcome), Some(FailureKind::JsonParseError));
        assert!(!outcome.failure().unwrap().message.is_empty());
    }

    #[test]
    fn fenced_array_has_no_object_candidate() {
        let outcome = parse("```\n[\"A\", \"B\"]\n```");
        assert_eq!(kind(&outcome), Some(FailureKind::ExtractionFailed));
    }

    #[test]
    fn code_fence_before_the_object_still_parses() {
        let outcome = parse(
            "Code used:\n```python\nprint('hi')\n```\nResult: {\"brand_list\": [\"兰蔻\"]}",
        );
        assert_eq!(outcome.result().brand_list, ["兰蔻"]);
        assert!(!outcome.is_failed());
    }

    #[test]
    fn inline_fence_before_the_object_still_parses() {
        let outcome = parse("Note ```注意``` then {\"spu_list\": [\"小黑瓶\"]}");
        assert!(!outcome.is_failed());
        assert_eq!(outcome.result().spu_list, ["小黑瓶"]);
    }

    #[test]
    fn empty_input_is_extraction_failed() {
        assert_eq!(kind(&parse("")), Some(FailureKind::ExtractionFailed));
    }

    #[test]
    fn deeply_nested_input_fails_without_crashing() {
        let text = format!("{}{}", "{\"a\":".repeat(10_000), "}".repeat(10_000));
        let outcome = parse(&text);
        assert_eq!(kind(&outcome), Some(FailureKind::JsonParseError));
    }

    #[test]
    fn oversized_garbage_fails_cleanly() {
        let text = "垃圾 ".repeat(200_000);
        assert_eq!(kind(&parse(&text)), Some(FailureKind::ExtractionFailed));
    }

    #[test]
    fn arbitrary_inputs_always_produce_well_formed_records() {
        let inputs = [
            "",
            "{",
            "}",
            "{}",
            "null",
            "```json```",
            "``` ```",
            "{\"brand_list\": null, \"emotion_dict\": null}",
            "{\"brand_list\": [[\"nested\"]], \"evaluation_dict\": {\"a\": {\"b\": 1}}}",
            "prefix {\"a\": \"unterminated",
            "\u{0}\u{1}\u{2}",
            "{\"emotion_dict\": {\"A\": [\"正向\"]}}",
        ];
        for input in inputs {
            let value = serde_json::to_value(parse(input)).unwrap();
            assert!(value["brand_list"].is_array(), "input {input:?}");
            assert!(value["spu_list"].is_array(), "input {input:?}");
            assert!(value["emotion_dict"].is_object(), "input {input:?}");
            assert!(value["evaluation_dict"].is_object(), "input {input:?}");
            assert!(value["analysis_failed"].is_boolean(), "input {input:?}");
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "兰".repeat(LOG_PREVIEW_CHARS + 10);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), LOG_PREVIEW_CHARS + 1);
        assert!(shown.ends_with('…'));
        assert_eq!(preview("short"), "short");
    }
}
