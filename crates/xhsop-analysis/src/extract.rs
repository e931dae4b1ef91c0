//! Locate the JSON object inside a free-form model response.
//!
//! Strategies run in order and the first non-empty candidate wins. The cheap
//! whole-string check goes first so clean output never hits the fence
//! patterns; the brace scan is the last resort.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json\s*(.*?)```").expect("fenced json pattern is valid")
});

static FENCED_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_+.-]*[ \t]*\r?\n)?(.*?)```")
        .expect("fenced block pattern is valid")
});

/// A named extraction strategy.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub extract: fn(&str) -> Option<&str>,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).finish()
    }
}

/// Extraction order.
pub const EXTRACTION_STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "whole_object",
        extract: whole_object,
    },
    Strategy {
        name: "fenced_json",
        extract: fenced_json,
    },
    Strategy {
        name: "fenced_any",
        extract: fenced_any,
    },
    Strategy {
        name: "brace_scan",
        extract: brace_scan,
    },
];

/// Return the first JSON candidate found in `text`, or `None`.
#[must_use]
pub fn extract_json(text: &str) -> Option<&str> {
    extract_with(EXTRACTION_STRATEGIES, text)
}

/// Run `strategies` in order over `text`.
#[must_use]
pub fn extract_with<'t>(strategies: &[Strategy], text: &'t str) -> Option<&'t str> {
    strategies.iter().find_map(|strategy| {
        let candidate = (strategy.extract)(text)?.trim();
        if candidate.is_empty() {
            return None;
        }
        tracing::debug!(
            strategy = strategy.name,
            len = candidate.len(),
            "extracted JSON candidate"
        );
        Some(candidate)
    })
}

/// The trimmed text already looks like one object.
fn whole_object(text: &str) -> Option<&str> {
    object_shaped(text)
}

/// Inner content of the first fence tagged `json` that holds an object.
fn fenced_json(text: &str) -> Option<&str> {
    first_object_fence(&FENCED_JSON, text)
}

/// Inner content of the first fence that holds an object, skipping a
/// language tag if present.
fn fenced_any(text: &str) -> Option<&str> {
    first_object_fence(&FENCED_ANY, text)
}

/// Fences holding code or prose are skipped so a later fence, or the brace
/// scan, can still find the object.
fn first_object_fence<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| object_shaped(m.as_str()))
}

fn object_shaped(candidate: &str) -> Option<&str> {
    let trimmed = candidate.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}')).then_some(trimmed)
}

/// Span from the first `{` to its matching `}`.
///
/// Braces inside string literals are ignored and backslash escapes are
/// honoured. If the text ends while still nested, everything from the first
/// `{` is returned so the JSON parser can report where it broke.
fn brace_scan(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let tail = &text[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in tail.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&tail[..=offset]);
                }
            }
            _ => {}
        }
    }

    Some(tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_object_is_returned_as_is() {
        let text = "  {\"brand_list\": []}\n";
        assert_eq!(extract_json(text), Some("{\"brand_list\": []}"));
    }

    #[test]
    fn json_fence_is_unwrapped() {
        let text = "```json\n{\"brand_list\": []}\n```";
        assert_eq!(extract_json(text), Some("{\"brand_list\": []}"));
    }

    #[test]
    fn json_fence_tag_is_case_insensitive() {
        let text = "Result:\n```JSON\n{\"a\": 1}\n```\nDone.";
        assert_eq!(fenced_json(text).map(str::trim), Some("{\"a\": 1}"));
    }

    #[test]
    fn json_fence_wins_over_earlier_plain_fence() {
        let text = "```\nnot this\n```\n```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn plain_fence_is_unwrapped() {
        let text = "Here you go:\n```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn plain_fence_skips_language_tag() {
        let text = "```javascript\n{\"a\": 1}\n```";
        assert_eq!(fenced_any(text).map(str::trim), Some("{\"a\": 1}"));
    }

    #[test]
    fn single_line_fence() {
        let text = "answer: ```{\"a\": 1}``` end";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn empty_fence_falls_through_to_brace_scan() {
        let text = "```json\n```\nfallback {\"a\": 1} trailing";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn code_fence_before_the_object_is_skipped() {
        let text = "Code used:\n```python\nprint('hi')\n```\nResult: {\"brand_list\": [\"兰蔻\"]}";
        assert_eq!(fenced_any(text), None);
        assert_eq!(extract_json(text), Some("{\"brand_list\": [\"兰蔻\"]}"));
    }

    #[test]
    fn inline_fence_before_the_object_is_skipped() {
        let text = "See ```note``` below: {\"brand_list\": []}";
        assert_eq!(extract_json(text), Some("{\"brand_list\": []}"));
    }

    #[test]
    fn later_object_fence_is_used_when_the_first_holds_code() {
        let text = "```sh\ncurl x\n```\nthen\n```\n{\"a\": 1}\n```";
        assert_eq!(fenced_any(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn json_fence_without_an_object_falls_through() {
        let text = "```json\n[1, 2]\n```";
        assert_eq!(fenced_json(text), None);
        assert_eq!(extract_json(text), None);
    }

    #[test]
    fn prose_wrapped_object_is_found_by_brace_scan() {
        let text = "Sure! Here is the analysis: {\"a\": {\"b\": 2}} Hope it helps.";
        assert_eq!(extract_json(text), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn brace_scan_ignores_braces_in_strings() {
        let text = "x {\"a\": \"}{\", \"b\": \"\\\"}\"} y";
        assert_eq!(brace_scan(text), Some("{\"a\": \"}{\", \"b\": \"\\\"}\"}"));
    }

    #[test]
    fn brace_scan_handles_multibyte_text() {
        let text = "分析结果：{\"brand_list\": [\"兰蔻\"]}。";
        assert_eq!(extract_json(text), Some("{\"brand_list\": [\"兰蔻\"]}"));
    }

    #[test]
    fn truncated_object_is_returned_to_the_end() {
        let text = "{\"brand_list\": [\"A\"";
        assert_eq!(extract_json(text), Some("{\"brand_list\": [\"A\""));
    }

    #[test]
    fn refusal_has_no_candidate() {
        assert_eq!(extract_json("I'm sorry, I cannot analyze this."), None);
    }

    #[test]
    fn empty_and_whitespace_have_no_candidate() {
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("   \n\t"), None);
    }

    #[test]
    fn strategy_order_is_stable() {
        let names: Vec<&str> = EXTRACTION_STRATEGIES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            ["whole_object", "fenced_json", "fenced_any", "brace_scan"]
        );
    }

    #[test]
    fn custom_strategy_list_is_honoured() {
        let only_whole = [EXTRACTION_STRATEGIES[0]];
        assert_eq!(extract_with(&only_whole, "prefix {\"a\": 1}"), None);
    }
}
