//! Chat messages sent to the model for one note.

use serde::Serialize;
use xhsop_core::NoteRecord;

pub(crate) const SYSTEM_PROMPT: &str = "你是社交媒体品牌分析助手。阅读一篇小红书笔记（文字、图片或视频），\
识别其中提到的品牌和具体产品（SPU），判断作者对每个品牌或产品的情感倾向，并摘录代表性的评价词。\n\
情感只能是以下三种之一：正向、负向、中立。\n\
只输出一个 JSON 对象，不要输出解释文字，格式如下：\n\
{\"brand_list\": [\"品牌\"], \"spu_list\": [\"产品\"], \
\"emotion_dict\": {\"品牌或产品\": \"正向\"}, \
\"evaluation_dict\": {\"品牌或产品\": [\"评价词\"]}}\n\
没有提到品牌或产品时，对应字段返回空列表或空对象。";

/// Bounds applied when turning a note into message content.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PromptLimits {
    pub max_content_chars: usize,
    pub max_images: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: UrlRef },
    VideoUrl { video_url: UrlRef },
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct UrlRef {
    pub url: String,
}

/// System prompt plus a multimodal user message for `note`.
pub(crate) fn build_messages(note: &NoteRecord, limits: PromptLimits) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
        },
        ChatMessage {
            role: "user",
            content: MessageContent::Parts(user_parts(note, limits)),
        },
    ]
}

fn user_parts(note: &NoteRecord, limits: PromptLimits) -> Vec<ContentPart> {
    let body = format!(
        "请分析这篇小红书笔记。\n【标题】{}\n【正文】{}",
        note.title.trim(),
        note.description.trim()
    );
    let mut parts = vec![ContentPart::Text {
        text: truncate_chars(&body, limits.max_content_chars).to_string(),
    }];

    parts.extend(
        note.image_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .take(limits.max_images)
            .map(|url| ContentPart::ImageUrl {
                image_url: UrlRef {
                    url: url.to_string(),
                },
            }),
    );

    if note.has_video() {
        parts.push(ContentPart::VideoUrl {
            video_url: UrlRef {
                url: note.video_url.trim().to_string(),
            },
        });
    }

    parts
}

/// Longest prefix of `text` with at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            tracing::warn!(
                chars = text.chars().count(),
                max_chars,
                "note content exceeds the prompt limit, truncating"
            );
            &text[..idx]
        }
        None => text,
    }
}
