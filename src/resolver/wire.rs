//! Response parser for continuation pages
//!
//! Turns a JSON response body into a [`ParsedPage`]:
//!
//! - `onResponseReceivedEndpoints` / `onResponseReceivedActions` hold action
//!   blocks of kind `reloadContinuationItemsCommand` or
//!   `appendContinuationItemsAction`, each carrying `continuationItems`
//! - the last item of a block, when it is a `continuationItemRenderer`, is the
//!   continuation marker for the next page
//! - `frameworkUpdates.entityBatchUpdate.mutations` carries normalized entities
//!
//! Unknown item kinds are skipped.

use crate::model::{Continuation, ContinuationToken, EntityKey};
use crate::resolver::nodes::{CommentEntity, EntityPayload, InlineComment, RawNode, TextSource};
use crate::HarvestError;
use serde_json::Value;

const ACTION_KEYS: [&str; 2] = ["onResponseReceivedEndpoints", "onResponseReceivedActions"];
const BLOCK_KINDS: [&str; 2] = [
    "/reloadContinuationItemsCommand/continuationItems",
    "/appendContinuationItemsAction/continuationItems",
];

/// A reply collection reference found under a thread
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyToken {
    /// Present when the marker carried a canonical token string
    pub continuation: Option<Continuation>,

    /// The continuation endpoint exactly as it appeared on the wire
    pub raw: Value,
}

/// One item of an action block
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    /// A top-level comment, possibly with reply collections attached
    Thread {
        node: RawNode,
        replies: Vec<ReplyToken>,
    },

    /// A standalone comment (reply pages)
    Comment(RawNode),
}

/// Everything extracted from one response body
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub items: Vec<PageItem>,
    pub next: Option<Continuation>,
    pub mutations: Vec<(EntityKey, EntityPayload)>,
}

/// Parses a response body
///
/// Returns `HarvestError::MalformedResponse` when the body does not have the
/// shape of a continuation response at all. A well-formed body without action
/// blocks is an empty, final page.
pub fn parse_response(body: &Value) -> Result<ParsedPage, HarvestError> {
    if !body.is_object() {
        return Err(HarvestError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            kind_of(body)
        )));
    }

    let mut page = ParsedPage::default();

    for key in ACTION_KEYS {
        let Some(actions) = body.get(key) else {
            continue;
        };
        let actions = actions.as_array().ok_or_else(|| {
            HarvestError::MalformedResponse(format!("{} is {}, not an array", key, kind_of(actions)))
        })?;

        for action in actions {
            for kind in BLOCK_KINDS {
                if let Some(items) = action.pointer(kind).and_then(Value::as_array) {
                    parse_block(items, &mut page);
                }
            }
        }
    }

    if let Some(mutations) = body
        .pointer("/frameworkUpdates/entityBatchUpdate/mutations")
        .and_then(Value::as_array)
    {
        page.mutations = mutations.iter().filter_map(parse_mutation).collect();
    }

    Ok(page)
}

fn parse_block(items: &[Value], page: &mut ParsedPage) {
    let last = items.len().saturating_sub(1);

    for (index, item) in items.iter().enumerate() {
        if let Some(marker) = item.get("continuationItemRenderer") {
            if index == last {
                if let Some(token) = parse_marker(marker) {
                    page.next = token.continuation;
                }
            }
            continue;
        }

        if let Some(thread) = item.get("commentThreadRenderer") {
            if let Some(item) = parse_thread(thread) {
                page.items.push(item);
            }
        } else if let Some(renderer) = item.get("commentRenderer") {
            page.items.push(PageItem::Comment(RawNode::Inline(parse_inline(renderer))));
        } else if let Some(view_model) = item.get("commentViewModel") {
            page.items.push(PageItem::Comment(parse_view_model(view_model)));
        }
    }
}

fn parse_thread(thread: &Value) -> Option<PageItem> {
    let node = if let Some(view_model) = thread.pointer("/commentViewModel/commentViewModel") {
        parse_view_model(view_model)
    } else if let Some(renderer) = thread.pointer("/comment/commentRenderer") {
        RawNode::Inline(parse_inline(renderer))
    } else {
        return None;
    };

    let mut replies = Vec::new();
    if let Some(replies_renderer) = thread.pointer("/replies/commentRepliesRenderer") {
        for list in ["contents", "subThreads"] {
            let Some(entries) = replies_renderer.get(list).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                if let Some(token) = entry.get("continuationItemRenderer").and_then(parse_marker) {
                    replies.push(token);
                }
            }
        }
    }

    Some(PageItem::Thread { node, replies })
}

/// Reads a `continuationItemRenderer`, either the direct endpoint form or the
/// "show more" button form
fn parse_marker(marker: &Value) -> Option<ReplyToken> {
    let endpoint = marker
        .get("continuationEndpoint")
        .or_else(|| marker.pointer("/button/buttonRenderer/command"))?;

    let continuation = endpoint
        .pointer("/continuationCommand/token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(|token| Continuation {
            token: ContinuationToken::new(token),
            tracking: endpoint
                .get("clickTrackingParams")
                .and_then(Value::as_str)
                .map(str::to_string),
        });

    Some(ReplyToken {
        continuation,
        raw: endpoint.clone(),
    })
}

fn parse_view_model(view_model: &Value) -> RawNode {
    let inline = InlineComment {
        comment_id: view_model
            .get("commentId")
            .and_then(Value::as_str)
            .map(str::to_string),
        ..InlineComment::default()
    };

    match view_model.get("commentKey").and_then(Value::as_str) {
        Some(key) => RawNode::Keyed {
            entity_key: EntityKey::new(key),
            inline,
        },
        None => RawNode::Inline(inline),
    }
}

fn parse_inline(renderer: &Value) -> InlineComment {
    let sources = |key: &str| {
        renderer
            .get(key)
            .map(TextSource::collect)
            .unwrap_or_default()
    };

    InlineComment {
        comment_id: renderer
            .get("commentId")
            .and_then(Value::as_str)
            .map(str::to_string),
        author: sources("authorText"),
        content: sources("contentText"),
        published: sources("publishedTimeText"),
        likes: sources("voteCount"),
        author_url: renderer
            .pointer("/authorEndpoint/browseEndpoint/canonicalBaseUrl")
            .and_then(Value::as_str)
            .map(str::to_string),
        is_owner: renderer
            .get("authorIsChannelOwner")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        member_label: renderer
            .pointer("/sponsorCommentBadge/sponsorCommentBadgeRenderer/tooltip")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn parse_mutation(mutation: &Value) -> Option<(EntityKey, EntityPayload)> {
    let key = mutation.get("entityKey").and_then(Value::as_str)?;
    let payload = mutation.get("payload")?;

    let payload = match payload.get("commentEntityPayload") {
        Some(comment) => EntityPayload::Comment(CommentEntity::from_payload(comment)),
        None => EntityPayload::Other(payload.clone()),
    };

    Some((EntityKey::new(key), payload))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
