//! Canonical analysis schema and the flat record stored per note.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentiment towards one brand or product.
///
/// Serialized with the labels stored in the `emotion_dict` column.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Emotion {
    #[serde(rename = "正向")]
    Positive,
    #[serde(rename = "负向")]
    Negative,
    #[default]
    #[serde(rename = "中立")]
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 3] = [Emotion::Positive, Emotion::Negative, Emotion::Neutral];

    /// The stored label (`正向`, `负向`, `中立`).
    #[must_use]
    pub fn as_label(self) -> &'static str {
        match self {
            Emotion::Positive => "正向",
            Emotion::Negative => "负向",
            Emotion::Neutral => "中立",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Emotion::Positive => write!(f, "positive"),
            Emotion::Negative => write!(f, "negative"),
            Emotion::Neutral => write!(f, "neutral"),
        }
    }
}

/// Normalized brand/product analysis for one note.
///
/// All four fields are always present; empty containers mean "nothing found".
/// Keys of the two dictionaries need not appear in either list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub brand_list: Vec<String>,
    pub spu_list: Vec<String>,
    pub emotion_dict: BTreeMap<String, Emotion>,
    pub evaluation_dict: BTreeMap<String, Vec<String>>,
}

impl AnalysisResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.brand_list.is_empty()
            && self.spu_list.is_empty()
            && self.emotion_dict.is_empty()
            && self.evaluation_dict.is_empty()
    }
}

/// Why a note could not be analyzed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No JSON-like substring in the model response.
    ExtractionFailed,
    /// The extracted candidate is not valid JSON.
    JsonParseError,
    /// Normalization rejected the parsed value.
    UnexpectedError,
    /// The model call itself returned an error.
    AnalysisCallFailed,
    /// The model call exceeded its deadline.
    Timeout,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::ExtractionFailed => "extraction_failed",
            FailureKind::JsonParseError => "json_parse_error",
            FailureKind::UnexpectedError => "unexpected_error",
            FailureKind::AnalysisCallFailed => "analysis_call_failed",
            FailureKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl std::fmt::Display for AnalysisFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of analyzing one note. Callers match on this; nothing below the
/// orchestrator reports per-note problems through `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "AnalysisRecord", from = "AnalysisRecord")]
pub enum AnalysisOutcome {
    Analyzed(AnalysisResult),
    Failed(AnalysisFailure),
}

impl AnalysisOutcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        AnalysisOutcome::Failed(AnalysisFailure {
            kind,
            message: message.into(),
        })
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, AnalysisOutcome::Failed(_))
    }

    /// The analysis fields; the empty form for failures.
    #[must_use]
    pub fn result(&self) -> AnalysisResult {
        match self {
            AnalysisOutcome::Analyzed(result) => result.clone(),
            AnalysisOutcome::Failed(_) => AnalysisResult::default(),
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&AnalysisFailure> {
        match self {
            AnalysisOutcome::Analyzed(_) => None,
            AnalysisOutcome::Failed(failure) => Some(failure),
        }
    }

    #[must_use]
    pub fn to_record(&self) -> AnalysisRecord {
        AnalysisRecord::from(self.clone())
    }
}

/// Flat JSON shape persisted per note and consumed downstream.
///
/// `analysis_failed` is always written; `error_type` and `error_message`
/// only on failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(default)]
    pub brand_list: Vec<String>,
    #[serde(default)]
    pub spu_list: Vec<String>,
    #[serde(default)]
    pub emotion_dict: BTreeMap<String, Emotion>,
    #[serde(default)]
    pub evaluation_dict: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub analysis_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<AnalysisOutcome> for AnalysisRecord {
    fn from(outcome: AnalysisOutcome) -> Self {
        match outcome {
            AnalysisOutcome::Analyzed(result) => Self {
                brand_list: result.brand_list,
                spu_list: result.spu_list,
                emotion_dict: result.emotion_dict,
                evaluation_dict: result.evaluation_dict,
                analysis_failed: false,
                error_type: None,
                error_message: None,
            },
            AnalysisOutcome::Failed(failure) => Self {
                brand_list: Vec::new(),
                spu_list: Vec::new(),
                emotion_dict: BTreeMap::new(),
                evaluation_dict: BTreeMap::new(),
                analysis_failed: true,
                error_type: Some(failure.kind),
                error_message: Some(failure.message),
            },
        }
    }
}

impl From<AnalysisRecord> for AnalysisOutcome {
    fn from(record: AnalysisRecord) -> Self {
        if record.analysis_failed {
            return AnalysisOutcome::Failed(AnalysisFailure {
                kind: record.error_type.unwrap_or(FailureKind::UnexpectedError),
                message: record.error_message.unwrap_or_default(),
            });
        }
        AnalysisOutcome::Analyzed(AnalysisResult {
            brand_list: record.brand_list,
            spu_list: record.spu_list,
            emotion_dict: record.emotion_dict,
            evaluation_dict: record.evaluation_dict,
        })
    }
}
