//! Free-text sentiment labels mapped onto the three stored emotions.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use xhsop_core::Emotion;

use crate::error::SynonymTableError;

/// Built-in label table.
///
/// Matching is done on the trimmed label with ASCII letters lowercased.
pub(crate) const DEFAULT_SYNONYMS: &[(&str, Emotion)] = &[
    // Positive
    ("正向", Emotion::Positive),
    ("positive", Emotion::Positive),
    ("正面", Emotion::Positive),
    ("好", Emotion::Positive),
    ("推荐", Emotion::Positive),
    ("积极", Emotion::Positive),
    ("好评", Emotion::Positive),
    // Negative
    ("负向", Emotion::Negative),
    ("negative", Emotion::Negative),
    ("负面", Emotion::Negative),
    ("差", Emotion::Negative),
    ("不推荐", Emotion::Negative),
    ("消极", Emotion::Negative),
    ("差评", Emotion::Negative),
    // Neutral
    ("中立", Emotion::Neutral),
    ("neutral", Emotion::Neutral),
    ("一般", Emotion::Neutral),
    ("普通", Emotion::Neutral),
    ("客观", Emotion::Neutral),
    ("中性", Emotion::Neutral),
];

/// On-disk shape of a synonym table.
#[derive(Debug, Default, Deserialize)]
struct SynonymFile {
    #[serde(default)]
    positive: Vec<String>,
    #[serde(default)]
    negative: Vec<String>,
    #[serde(default)]
    neutral: Vec<String>,
}

/// Lookup table from sentiment label to [`Emotion`].
#[derive(Debug, Clone)]
pub struct EmotionSynonyms {
    labels: HashMap<String, Emotion>,
}

impl Default for EmotionSynonyms {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_SYNONYMS.iter().copied())
    }
}

impl EmotionSynonyms {
    /// Build a table from `(label, emotion)` pairs.
    ///
    /// The canonical labels always map to their own emotion so stored results
    /// normalize to themselves; pairs that try to remap one are skipped.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Emotion)>,
    {
        let mut labels: HashMap<String, Emotion> = Emotion::ALL
            .iter()
            .map(|&e| (e.as_label().to_string(), e))
            .collect();
        for (label, emotion) in pairs {
            let key = normalize_label(label);
            if key.is_empty() {
                continue;
            }
            if let Some(&canonical) = Emotion::ALL.iter().find(|e| e.as_label() == key) {
                if canonical != emotion {
                    tracing::warn!(
                        label = %key,
                        canonical = %canonical,
                        ignored = %emotion,
                        "synonym table cannot remap a canonical label"
                    );
                }
                continue;
            }
            labels.insert(key, emotion);
        }
        Self { labels }
    }

    /// Parse a YAML table with `positive`, `negative` and `neutral` lists.
    ///
    /// # Errors
    ///
    /// Returns [`serde_yaml::Error`] if the document does not match that shape.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let file: SynonymFile = serde_yaml::from_str(yaml)?;
        let pairs = file
            .positive
            .iter()
            .map(|l| (l.as_str(), Emotion::Positive))
            .chain(file.negative.iter().map(|l| (l.as_str(), Emotion::Negative)))
            .chain(file.neutral.iter().map(|l| (l.as_str(), Emotion::Neutral)));
        Ok(Self::from_pairs(pairs))
    }

    /// Load a YAML table from disk.
    ///
    /// # Errors
    ///
    /// Returns [`SynonymTableError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SynonymTableError> {
        let shown = path.display().to_string();
        let yaml = std::fs::read_to_string(path).map_err(|source| SynonymTableError::Io {
            path: shown.clone(),
            source,
        })?;
        let table = Self::from_yaml(&yaml).map_err(|source| SynonymTableError::Yaml {
            path: shown.clone(),
            source,
        })?;
        tracing::info!(
            path = %shown,
            labels = table.label_count(),
            "loaded emotion synonym table"
        );
        Ok(table)
    }

    /// Map a label to an emotion; unknown labels are neutral.
    #[must_use]
    pub fn resolve(&self, label: &str) -> Emotion {
        self.lookup(label).unwrap_or_default()
    }

    /// Map a label to an emotion if the table knows it.
    #[must_use]
    pub fn lookup(&self, label: &str) -> Option<Emotion> {
        self.labels.get(&normalize_label(label)).copied()
    }

    /// Number of distinct labels, canonical ones included.
    #[must_use]
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}
