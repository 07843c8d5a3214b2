//! Scripted remote client and page builders for harvest unit tests

use crate::harvest::source::PageSource;
use crate::resolver::EntityStore;
use crate::storage::{DurableSink, PendingWriteSet, SqliteRecordStore};
use crate::transport::{ClientContext, RemoteClient, RetryPolicy, RetryTransport, TransportError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers continuation requests from a fixed token → body table
///
/// Unknown tokens fail with HTTP 500.
#[derive(Clone, Default)]
pub(crate) struct ScriptedClient {
    pages: Arc<HashMap<String, Value>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, token: &str, body: Value) -> Self {
        Arc::make_mut(&mut self.pages).insert(token.to_string(), body);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls_for(&self, token: &str) -> usize {
        self.calls.lock().unwrap().get(token).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClient for ScriptedClient {
    async fn post_json(&self, _url: &str, body: &Value) -> Result<Value, TransportError> {
        let token = body["continuation"].as_str().unwrap_or_default().to_string();
        *self.calls.lock().unwrap().entry(token.clone()).or_insert(0) += 1;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.pages
            .get(&token)
            .cloned()
            .ok_or(TransportError::Status { status: 500 })
    }
}

/// Two quick attempts so failure paths stay fast
pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
    }
}

pub(crate) fn source_with(client: ScriptedClient) -> (Arc<PageSource>, DurableSink) {
    let sink = DurableSink::new(SqliteRecordStore::new_in_memory().unwrap());
    (source_with_sink(client, sink.clone()), sink)
}

pub(crate) fn source_with_sink(client: ScriptedClient, sink: DurableSink) -> Arc<PageSource> {
    let source = PageSource::new(
        RetryTransport::new(Arc::new(client), fast_retry()),
        "http://remote.test/next".to_string(),
        ClientContext::from_value(json!({"client": {"clientName": "TEST"}})),
        EntityStore::shared(),
        sink,
        Arc::new(PendingWriteSet::new()),
    );
    Arc::new(source)
}

/// A page of plain comments, optionally pointing at a next page
pub(crate) fn comment_page(ids: &[&str], next: Option<&str>) -> Value {
    let mut items: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({"commentRenderer": {
                "commentId": id,
                "authorText": {"simpleText": "@someone"},
                "contentText": {"simpleText": format!("text of {}", id)}
            }})
        })
        .collect();
    if let Some(token) = next {
        items.push(continuation_marker(token));
    }
    json!({
        "onResponseReceivedEndpoints": [{
            "appendContinuationItemsAction": {"continuationItems": items}
        }]
    })
}

/// A page of threads; each entry is (comment id, optional reply token)
pub(crate) fn thread_page(threads: &[(&str, Option<&str>)], next: Option<&str>) -> Value {
    let mut items: Vec<Value> = threads
        .iter()
        .map(|(id, replies)| {
            let mut thread = json!({
                "comment": {"commentRenderer": {
                    "commentId": id,
                    "authorText": {"simpleText": "@someone"},
                    "contentText": {"simpleText": format!("text of {}", id)}
                }}
            });
            if let Some(token) = replies {
                thread["replies"] = json!({"commentRepliesRenderer": {
                    "contents": [continuation_marker(token)]
                }});
            }
            json!({ "commentThreadRenderer": thread })
        })
        .collect();
    if let Some(token) = next {
        items.push(continuation_marker(token));
    }
    json!({
        "onResponseReceivedEndpoints": [{
            "reloadContinuationItemsCommand": {"continuationItems": items}
        }]
    })
}

pub(crate) fn continuation_marker(token: &str) -> Value {
    json!({"continuationItemRenderer": {"continuationEndpoint": {
        "continuationCommand": {"token": token}
    }}})
}
