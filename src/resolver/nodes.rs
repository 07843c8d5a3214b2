//! Typed raw nodes and text extraction strategies
//!
//! The remote encodes the same logical field in several shapes. Instead of
//! probing untyped JSON at resolution time, the wire parser lifts every shape it
//! finds into a [`TextSource`] variant and the resolver runs an ordered list of
//! [`TextStrategy`] values over them.

use crate::model::EntityKey;
use serde_json::Value;

/// One wire shape a display text can take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    /// A single pre-formatted string (`{"simpleText": "..."}`)
    SimpleText(String),

    /// Styled runs to be concatenated (`{"runs": [{"text": "..."}, ...]}`)
    Runs(Vec<String>),

    /// Content path used by normalized payloads (`{"content": "..."}`)
    NestedContent(String),
}

impl TextSource {
    /// Lifts every recognised shape found on `value`
    pub fn collect(value: &Value) -> Vec<TextSource> {
        let mut sources = Vec::new();

        if let Some(text) = value.as_str() {
            sources.push(TextSource::SimpleText(text.to_string()));
            return sources;
        }

        if let Some(text) = value.get("simpleText").and_then(Value::as_str) {
            sources.push(TextSource::SimpleText(text.to_string()));
        }

        if let Some(runs) = value.get("runs").and_then(Value::as_array) {
            let texts = runs
                .iter()
                .filter_map(|run| run.get("text").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            sources.push(TextSource::Runs(texts));
        }

        if let Some(text) = value.get("content").and_then(Value::as_str) {
            sources.push(TextSource::NestedContent(text.to_string()));
        }

        sources
    }
}

/// Named extraction strategies, evaluated in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStrategy {
    SimpleText,
    Runs,
    NestedContent,
}

impl TextStrategy {
    pub const ORDER: [TextStrategy; 3] = [
        TextStrategy::SimpleText,
        TextStrategy::Runs,
        TextStrategy::NestedContent,
    ];

    fn apply(&self, sources: &[TextSource]) -> Option<String> {
        sources
            .iter()
            .filter_map(|source| match (self, source) {
                (TextStrategy::SimpleText, TextSource::SimpleText(text)) => Some(text.clone()),
                (TextStrategy::Runs, TextSource::Runs(runs)) => Some(runs.concat()),
                (TextStrategy::NestedContent, TextSource::NestedContent(text)) => {
                    Some(text.clone())
                }
                _ => None,
            })
            .find(|text| !text.trim().is_empty())
    }
}

/// Runs every strategy in order and returns the first non-empty result
pub fn extract_text(sources: &[TextSource]) -> Option<String> {
    TextStrategy::ORDER
        .iter()
        .find_map(|strategy| strategy.apply(sources))
}

/// Fields carried directly on a rendered node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineComment {
    pub comment_id: Option<String>,
    pub author: Vec<TextSource>,
    pub content: Vec<TextSource>,
    pub published: Vec<TextSource>,
    pub likes: Vec<TextSource>,
    pub author_url: Option<String>,
    pub is_owner: bool,
    pub member_label: Option<String>,
}

/// A raw hierarchical node before resolution
#[derive(Debug, Clone, PartialEq)]
pub enum RawNode {
    /// Legacy renderer: every field is inline
    Inline(InlineComment),

    /// View-model node referencing a normalized payload in the entity store;
    /// the inline fields are only the fallback source.
    Keyed {
        entity_key: EntityKey,
        inline: InlineComment,
    },
}

impl RawNode {
    pub fn inline(&self) -> &InlineComment {
        match self {
            RawNode::Inline(inline) => inline,
            RawNode::Keyed { inline, .. } => inline,
        }
    }

    pub fn entity_key(&self) -> Option<&EntityKey> {
        match self {
            RawNode::Inline(_) => None,
            RawNode::Keyed { entity_key, .. } => Some(entity_key),
        }
    }
}

/// Normalized comment payload from an entity batch update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentEntity {
    pub comment_id: Option<String>,
    pub content: Vec<TextSource>,
    pub published: Option<String>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub is_creator: bool,
    pub member_label: Option<String>,
    pub like_count: Option<String>,
}

impl CommentEntity {
    /// Reads a `commentEntityPayload` object
    pub fn from_payload(payload: &Value) -> Self {
        let properties = payload.get("properties").unwrap_or(&Value::Null);
        let author = payload.get("author").unwrap_or(&Value::Null);
        let toolbar = payload.get("toolbar").unwrap_or(&Value::Null);

        let author_url = author
            .pointer("/channelCommand/innertubeCommand/browseEndpoint/canonicalBaseUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                author
                    .get("channelId")
                    .and_then(Value::as_str)
                    .map(|id| format!("/channel/{}", id))
            });

        Self {
            comment_id: string_at(properties, "commentId"),
            content: properties
                .get("content")
                .map(TextSource::collect)
                .unwrap_or_default(),
            published: string_at(properties, "publishedTime"),
            author_name: string_at(author, "displayName"),
            author_url,
            is_creator: author
                .get("isCreator")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            member_label: string_at(author, "sponsorBadgeA11y").filter(|s| !s.is_empty()),
            like_count: string_at(toolbar, "likeCountNotliked"),
        }
    }
}

/// Normalized payload stored under an entity key
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPayload {
    Comment(CommentEntity),

    /// Any payload kind the resolver does not read (toolbar state, etc.)
    Other(Value),
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
