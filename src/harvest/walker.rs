//! Main token walker
//!
//! Follows the top-level continuation chain one page at a time. The fetch for
//! the next token is started as soon as a response has been parsed, so it
//! overlaps with resolving and forwarding the current page. Records go to the
//! sink, reply collections to the reply harvester.
//!
//! Once the chain ends the walker drains: it waits for reply tasks to go idle,
//! then for every pending write to settle, and only then reads the store.

use crate::harvest::fallback::FallbackExtractor;
use crate::harvest::replies::ReplyHarvester;
use crate::harvest::source::PageSource;
use crate::model::{Continuation, ContinuationToken, Record};
use crate::resolver::ParsedPage;
use crate::storage::DurableSink;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Lifecycle of one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerPhase {
    Idle,
    Fetching,
    Draining,
    Done,
}

/// What a finished walk produced
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Final store snapshot (or the fallback's records)
    pub records: Vec<Record>,
    pub main_fetches: u32,
    pub used_fallback: bool,
}

pub struct TokenWalker {
    source: Arc<PageSource>,
    replies: ReplyHarvester,
    fallback: Arc<dyn FallbackExtractor>,
    max_pages: u32,
    phase: WalkerPhase,
    main_fetches: u32,
}

impl TokenWalker {
    pub(crate) fn new(
        source: Arc<PageSource>,
        replies: ReplyHarvester,
        fallback: Arc<dyn FallbackExtractor>,
        max_pages: u32,
    ) -> Self {
        Self {
            source,
            replies,
            fallback,
            max_pages: max_pages.max(1),
            phase: WalkerPhase::Idle,
            main_fetches: 0,
        }
    }

    pub fn phase(&self) -> WalkerPhase {
        self.phase
    }

    /// Walks the chain starting at `seed` and drains the session
    pub async fn run(&mut self, seed: Continuation) -> WalkOutcome {
        self.phase = WalkerPhase::Fetching;
        self.walk(seed).await;

        self.phase = WalkerPhase::Draining;
        let outcome = self.drain().await;

        self.phase = WalkerPhase::Done;
        outcome
    }

    async fn walk(&mut self, seed: Continuation) {
        let mut seen: HashSet<ContinuationToken> = HashSet::new();
        seen.insert(seed.token.clone());
        let mut in_flight = Some(self.spawn_fetch(seed));

        while let Some(handle) = in_flight.take() {
            let mut page = match handle.await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Page fetch task failed: {}", e);
                    break;
                }
            };

            if let Some(next) = page.next.take() {
                if self.main_fetches >= self.max_pages {
                    tracing::warn!(
                        "Reached the page ceiling ({}); stopping pagination",
                        self.max_pages
                    );
                } else if !seen.insert(next.token.clone()) {
                    tracing::warn!("Continuation {:?} repeats; stopping pagination", next.token);
                } else {
                    in_flight = Some(self.spawn_fetch(next));
                }
            }

            self.forward(page);
        }

        tracing::debug!("Main chain ended after {} fetches", self.main_fetches);
    }

    fn spawn_fetch(&mut self, continuation: Continuation) -> JoinHandle<Option<ParsedPage>> {
        self.main_fetches += 1;
        let source = Arc::clone(&self.source);
        tokio::spawn(async move { source.fetch(&continuation).await })
    }

    fn forward(&self, page: ParsedPage) {
        let batch = self.source.resolve(page, None);
        tracing::debug!(
            "Page resolved: {} records, {} reply collections",
            batch.records.len(),
            batch.replies.len()
        );

        self.source.persist(batch.records);
        for descriptor in batch.replies {
            self.replies.enqueue(descriptor);
        }
    }

    async fn drain(&mut self) -> WalkOutcome {
        self.replies.on_idle().await;
        DurableSink::await_all(self.source.pending()).await;

        // An unreadable store may still hold the harvest; never let the
        // fallback write over it.
        let records = match self.source.sink().read_all().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Failed to read harvested records; skipping fallback: {}", e);
                return WalkOutcome {
                    records: Vec::new(),
                    main_fetches: self.main_fetches,
                    used_fallback: false,
                };
            }
        };

        if !records.is_empty() {
            return WalkOutcome {
                records,
                main_fetches: self.main_fetches,
                used_fallback: false,
            };
        }

        let fallback = self.fallback.extract();
        if fallback.is_empty() {
            tracing::info!("Harvest produced no records");
        } else {
            tracing::info!("Network harvest was empty; using {} fallback records", fallback.len());
            self.source.persist(fallback.clone());
            DurableSink::await_all(self.source.pending()).await;
        }

        WalkOutcome {
            used_fallback: !fallback.is_empty(),
            records: fallback,
            main_fetches: self.main_fetches,
        }
    }
}
