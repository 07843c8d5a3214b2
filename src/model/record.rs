use serde::{Deserialize, Serialize};

/// A harvested comment or reply
///
/// Records are immutable once built. A record is a reply exactly when it carries
/// a `parent_id`; `is_reply` is derived from that field so the two can never
/// disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub author: String,
    pub text: String,

    /// Display timestamp as rendered by the remote ("3 days ago")
    pub published: String,

    /// Display like count as rendered by the remote ("1.2K")
    pub likes: String,

    pub author_url: String,
    pub is_owner: bool,
    pub is_member: bool,
    pub member_label: String,

    #[serde(default)]
    parent_id: Option<String>,
}

impl Record {
    /// Creates a top-level record with empty optional fields
    pub fn new(id: impl Into<String>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            text: text.into(),
            published: String::new(),
            likes: String::new(),
            author_url: String::new(),
            is_owner: false,
            is_member: false,
            member_label: String::new(),
            parent_id: None,
        }
    }

    /// Turns this record into a reply to `parent_id`
    pub fn into_reply(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Generates an identity for a record whose source exposes none
    pub fn synthetic_id() -> String {
        format!("synthetic-{}", uuid::Uuid::new_v4())
    }
}
