//! Page source shared by the walker and reply tasks
//!
//! Bundles everything a fetch needs (transport, endpoint, client context) with
//! the session-wide shared state: the entity store, the sink, and the set of
//! pending writes.

use crate::model::{Batch, Continuation, Record};
use crate::resolver::{parse_response, resolve_page, ParsedPage, SharedEntityStore};
use crate::storage::{DurableSink, PendingWriteSet};
use crate::transport::{build_request, ClientContext, FetchOutcome, RetryTransport};
use std::sync::Arc;

pub(crate) struct PageSource {
    transport: RetryTransport,
    url: String,
    context: ClientContext,
    entities: SharedEntityStore,
    sink: DurableSink,
    pending: Arc<PendingWriteSet>,
}

impl PageSource {
    pub(crate) fn new(
        transport: RetryTransport,
        url: String,
        context: ClientContext,
        entities: SharedEntityStore,
        sink: DurableSink,
        pending: Arc<PendingWriteSet>,
    ) -> Self {
        Self {
            transport,
            url,
            context,
            entities,
            sink,
            pending,
        }
    }

    /// Fetches and parses one page
    ///
    /// Returns `None` when retries are exhausted or the body is malformed; the
    /// caller treats both as the end of that branch.
    pub(crate) async fn fetch(&self, continuation: &Continuation) -> Option<ParsedPage> {
        let request = build_request(&self.context, continuation);

        match self.transport.send(&self.url, &request).await {
            FetchOutcome::Success(body) => match parse_response(&body) {
                Ok(page) => Some(page),
                Err(e) => {
                    tracing::warn!("{:?}: {}; treating page as empty", continuation.token, e);
                    None
                }
            },
            FetchOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::warn!(
                    "Giving up on {:?} after {} attempts: {}",
                    continuation.token,
                    attempts,
                    last_error
                );
                None
            }
        }
    }

    /// Merges the page's entity updates and resolves its items
    pub(crate) fn resolve(&self, page: ParsedPage, parent: Option<&str>) -> Batch {
        let mut entities = self.entities.lock().unwrap_or_else(|e| e.into_inner());
        resolve_page(page, &mut entities, parent)
    }

    /// Hands records to the sink; the write handle joins the pending set
    pub(crate) fn persist(&self, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        self.pending.push(self.sink.append(records));
    }

    pub(crate) fn sink(&self) -> &DurableSink {
        &self.sink
    }

    pub(crate) fn pending(&self) -> &PendingWriteSet {
        &self.pending
    }
}
