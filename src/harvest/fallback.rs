//! Rendered-page fallback extraction
//!
//! Used only when a session ends with nothing persisted. Scrapes comment
//! threads out of the page markup the viewer already rendered. Extraction is
//! synchronous and never fails; unreadable markup yields no records.

use crate::model::Record;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use url::Url;

/// Source of records when the network harvest came back empty
pub trait FallbackExtractor: Send + Sync {
    fn extract(&self) -> Vec<Record>;
}

/// Fallback that never produces anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl FallbackExtractor for NoFallback {
    fn extract(&self) -> Vec<Record> {
        Vec::new()
    }
}

const THREAD: &str = "ytd-comment-thread-renderer";
const ROOT_COMMENT: &str = "#comment";
const REPLY_COMMENT: &str = "#replies ytd-comment-renderer, #replies ytd-comment-view-model";
const AUTHOR: &str = "#author-text";
const CONTENT: &str = "#content-text";
const PUBLISHED: &str = "#published-time-text";
const PUBLISHED_LINK: &str = "#published-time-text a[href]";
const LIKES: &str = "#vote-count-middle";
const OWNER_BADGE: &str = "ytd-author-comment-badge-renderer[creator]";
const MEMBER_BADGE: &str = "ytd-sponsor-comment-badge-renderer";

/// Base for resolving relative author and permalink hrefs
const PAGE_BASE: &str = "https://www.youtube.com/";

/// Extracts comment threads from a rendered HTML document
#[derive(Debug, Clone)]
pub struct HtmlFallback {
    html: String,
}

impl HtmlFallback {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    /// Reads a saved page from disk
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }
}

impl FallbackExtractor for HtmlFallback {
    fn extract(&self) -> Vec<Record> {
        let Some(selectors) = Selectors::build() else {
            return Vec::new();
        };
        let document = Html::parse_document(&self.html);
        let mut records = Vec::new();

        for thread in document.select(&selectors.thread) {
            let Some(root) = thread
                .select(&selectors.root)
                .next()
                .and_then(|element| read_comment(element, &selectors))
            else {
                continue;
            };

            let parent_id = root.id.clone();
            records.push(root);

            for element in thread.select(&selectors.reply) {
                if let Some(reply) = read_comment(element, &selectors) {
                    records.push(reply.into_reply(parent_id.as_str()));
                }
            }
        }

        tracing::debug!("Fallback extracted {} records from rendered page", records.len());
        records
    }
}

struct Selectors {
    thread: Selector,
    root: Selector,
    reply: Selector,
    author: Selector,
    content: Selector,
    published: Selector,
    published_link: Selector,
    likes: Selector,
    owner_badge: Selector,
    member_badge: Selector,
}

impl Selectors {
    fn build() -> Option<Self> {
        Some(Self {
            thread: Selector::parse(THREAD).ok()?,
            root: Selector::parse(ROOT_COMMENT).ok()?,
            reply: Selector::parse(REPLY_COMMENT).ok()?,
            author: Selector::parse(AUTHOR).ok()?,
            content: Selector::parse(CONTENT).ok()?,
            published: Selector::parse(PUBLISHED).ok()?,
            published_link: Selector::parse(PUBLISHED_LINK).ok()?,
            likes: Selector::parse(LIKES).ok()?,
            owner_badge: Selector::parse(OWNER_BADGE).ok()?,
            member_badge: Selector::parse(MEMBER_BADGE).ok()?,
        })
    }
}

fn read_comment(element: ElementRef<'_>, selectors: &Selectors) -> Option<Record> {
    let author = first_text(element, &selectors.author);
    let text = first_text(element, &selectors.content);
    if author.is_none() && text.is_none() {
        return None;
    }

    let id = element
        .select(&selectors.published_link)
        .next()
        .and_then(|link| link.value().attr("href"))
        .and_then(comment_id_from_permalink)
        .unwrap_or_else(Record::synthetic_id);

    let mut record = Record::new(id, author.unwrap_or_default(), text.unwrap_or_default());
    record.published = first_text(element, &selectors.published).unwrap_or_default();
    record.likes = first_text(element, &selectors.likes).unwrap_or_default();
    record.author_url = element
        .select(&selectors.author)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(absolute)
        .unwrap_or_default();
    record.is_owner = element.select(&selectors.owner_badge).next().is_some();
    record.member_label = element
        .select(&selectors.member_badge)
        .next()
        .and_then(|badge| badge.value().attr("aria-label"))
        .map(|label| label.trim().to_string())
        .unwrap_or_default();
    record.is_member = !record.member_label.is_empty();

    Some(record)
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn absolute(href: &str) -> Option<String> {
    Url::parse(PAGE_BASE)
        .ok()?
        .join(href)
        .ok()
        .map(|url| url.to_string())
}

/// Permalinks carry the comment identity in the `lc` query parameter
fn comment_id_from_permalink(href: &str) -> Option<String> {
    let url = Url::parse(PAGE_BASE).ok()?.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "lc")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}
