//! Entity resolution
//!
//! This module turns raw response bodies into canonical [`Record`]s:
//! - `wire`: JSON response → typed nodes, continuation markers and entity mutations
//! - `nodes`: the typed node variants and ordered text extraction strategies
//! - `entity_store`: the session-wide last-write-wins entity map

mod entity_store;
mod nodes;
mod wire;

pub use entity_store::{EntityStore, SharedEntityStore};
pub use nodes::{
    extract_text, CommentEntity, EntityPayload, InlineComment, RawNode, TextSource, TextStrategy,
};
pub use wire::{parse_response, PageItem, ParsedPage, ReplyToken};

use crate::model::{Batch, EntityKey, Record, ReplyTokenDescriptor};

/// Applies an entity batch update to the store (last-applied update wins per key)
pub fn merge_entities<I>(update: I, store: &mut EntityStore)
where
    I: IntoIterator<Item = (EntityKey, EntityPayload)>,
{
    store.merge(update);
}

/// Resolves a raw node into a record
///
/// A node referencing a comment payload in `store` takes its fields from that
/// payload first and falls back to its inline fields. Returns `None` only when
/// none of identity, author, or text can be determined; a node with author or
/// text but no identity gets a synthetic one.
pub fn resolve(node: &RawNode, store: &EntityStore) -> Option<Record> {
    let inline = node.inline();
    let entity = node
        .entity_key()
        .and_then(|key| store.get(key))
        .and_then(|payload| match payload {
            EntityPayload::Comment(comment) => Some(comment),
            EntityPayload::Other(_) => None,
        });

    let id = entity
        .and_then(|e| e.comment_id.clone())
        .or_else(|| inline.comment_id.clone())
        .filter(|id| !id.is_empty());

    let author = entity
        .and_then(|e| e.author_name.clone())
        .or_else(|| extract_text(&inline.author));

    let text = entity
        .and_then(|e| extract_text(&e.content))
        .or_else(|| extract_text(&inline.content));

    if id.is_none() && author.is_none() && text.is_none() {
        return None;
    }

    let member_label = entity
        .and_then(|e| e.member_label.clone())
        .or_else(|| inline.member_label.clone())
        .unwrap_or_default();

    let mut record = Record::new(
        id.unwrap_or_else(Record::synthetic_id),
        author.unwrap_or_default(),
        text.unwrap_or_default(),
    );
    record.published = entity
        .and_then(|e| e.published.clone())
        .or_else(|| extract_text(&inline.published))
        .unwrap_or_default();
    record.likes = entity
        .and_then(|e| e.like_count.clone())
        .or_else(|| extract_text(&inline.likes))
        .unwrap_or_default();
    record.author_url = entity
        .and_then(|e| e.author_url.clone())
        .or_else(|| inline.author_url.clone())
        .unwrap_or_default();
    record.is_owner = entity.map(|e| e.is_creator).unwrap_or(false) || inline.is_owner;
    record.is_member = !member_label.is_empty();
    record.member_label = member_label;

    Some(record)
}

/// Merges a page's entity mutations and resolves its items into a batch
///
/// With `parent` set (reply pages) every resolved record becomes a reply to it.
/// Reply collections found under a thread are attached to that thread's record;
/// collections under a thread that cannot be resolved are dropped since they
/// have no parent to attach to.
pub fn resolve_page(page: ParsedPage, store: &mut EntityStore, parent: Option<&str>) -> Batch {
    merge_entities(page.mutations, store);

    let mut batch = Batch {
        next: page.next,
        ..Batch::default()
    };

    for item in page.items {
        let (node, replies) = match item {
            PageItem::Thread { node, replies } => (node, replies),
            PageItem::Comment(node) => (node, Vec::new()),
        };

        let Some(record) = resolve(&node, store) else {
            tracing::trace!("Dropping unresolvable node ({} reply tokens)", replies.len());
            continue;
        };
        let record = match parent {
            Some(parent_id) => record.into_reply(parent_id),
            None => record,
        };

        for reply in replies {
            batch.replies.push(ReplyTokenDescriptor {
                token: reply.continuation.as_ref().map(|c| c.token.clone()),
                tracking: reply.continuation.and_then(|c| c.tracking),
                raw: reply.raw,
                parent_id: record.id.clone(),
            });
        }

        batch.records.push(record);
    }

    batch
}
