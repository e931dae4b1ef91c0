use serde::{Deserialize, Serialize};

/// One social post awaiting brand/sentiment analysis.
///
/// Owned by the storage layer; the pipeline only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub note_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Empty when the note is not a video post.
    #[serde(default)]
    pub video_url: String,
}

/// Media mix of a note, used for run logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKind {
    Text,
    Image,
    Video,
    Mixed,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Text => write!(f, "text"),
            ContentKind::Image => write!(f, "image"),
            ContentKind::Video => write!(f, "video"),
            ContentKind::Mixed => write!(f, "mixed"),
        }
    }
}

impl NoteRecord {
    #[must_use]
    pub fn has_images(&self) -> bool {
        self.image_urls.iter().any(|u| !u.trim().is_empty())
    }

    #[must_use]
    pub fn has_video(&self) -> bool {
        !self.video_url.trim().is_empty()
    }

    #[must_use]
    pub fn content_kind(&self) -> ContentKind {
        match (self.has_images(), self.has_video()) {
            (true, true) => ContentKind::Mixed,
            (false, true) => ContentKind::Video,
            (true, false) => ContentKind::Image,
            (false, false) => ContentKind::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(images: &[&str], video: &str) -> NoteRecord {
        NoteRecord {
            note_id: "n1".to_string(),
            image_urls: images.iter().map(|s| (*s).to_string()).collect(),
            video_url: video.to_string(),
            ..NoteRecord::default()
        }
    }

    #[test]
    fn content_kind_text_only() {
        assert_eq!(note(&[], "").content_kind(), ContentKind::Text);
    }

    #[test]
    fn content_kind_images_only() {
        assert_eq!(
            note(&["https://img/1.jpg"], "").content_kind(),
            ContentKind::Image
        );
    }

    #[test]
    fn content_kind_video_only() {
        assert_eq!(
            note(&[], "https://v/1.mp4").content_kind(),
            ContentKind::Video
        );
    }

    #[test]
    fn content_kind_mixed() {
        assert_eq!(
            note(&["https://img/1.jpg"], "https://v/1.mp4").content_kind(),
            ContentKind::Mixed
        );
    }

    #[test]
    fn blank_image_urls_do_not_count() {
        assert_eq!(note(&["", "  "], "").content_kind(), ContentKind::Text);
    }

    #[test]
    fn deserializes_with_missing_optional_fields() {
        let n: NoteRecord = serde_json::from_str(r#"{"note_id": "abc"}"#).unwrap();
        assert_eq!(n.note_id, "abc");
        assert!(n.image_urls.is_empty());
        assert!(n.video_url.is_empty());
    }
}
