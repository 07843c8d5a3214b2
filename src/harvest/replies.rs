//! Reply harvester: bounded-concurrency fetching of reply collections
//!
//! This module handles:
//! - Deduplicating reply tokens across the whole session
//! - Limiting concurrently running reply tasks via a semaphore
//! - Walking nested reply collections up to a depth limit
//! - The idle barrier that resolves once no task is queued or running

use crate::harvest::source::PageSource;
use crate::model::{Continuation, DedupKey, ReplyTokenDescriptor};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};

/// Reply tokens already accepted this session
type ProcessedTokenSet = Mutex<HashSet<DedupKey>>;

/// Reply harvester shared by the walker and its own tasks
///
/// Cloning is cheap; every clone feeds the same queue and idle barrier.
#[derive(Clone)]
pub struct ReplyHarvester {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<PageSource>,

    /// Caps concurrently running reply tasks
    semaphore: Arc<Semaphore>,

    processed: ProcessedTokenSet,

    /// Tasks queued or running
    outstanding: watch::Sender<usize>,

    max_depth: u32,
    max_pages: u32,

    running: AtomicUsize,
    peak_running: AtomicUsize,
    fetches: AtomicU32,
    records: AtomicUsize,
}

/// One reply page waiting to be fetched inside a task
struct ReplyWork {
    continuation: Continuation,
    parent_id: String,
    depth: u32,
}

/// Decrements the outstanding count when a task ends, even by panic
struct TaskGuard(Arc<Inner>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl ReplyHarvester {
    pub(crate) fn new(source: Arc<PageSource>, limit: usize, max_depth: u32, max_pages: u32) -> Self {
        let (outstanding, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                source,
                semaphore: Arc::new(Semaphore::new(limit.max(1))),
                processed: Mutex::new(HashSet::new()),
                outstanding,
                max_depth: max_depth.max(1),
                max_pages: max_pages.max(1),
                running: AtomicUsize::new(0),
                peak_running: AtomicUsize::new(0),
                fetches: AtomicU32::new(0),
                records: AtomicUsize::new(0),
            }),
        }
    }

    /// Queues a reply collection
    ///
    /// Returns `false` when an equal token was already accepted this session;
    /// nothing is scheduled in that case. Must be called from within a Tokio
    /// runtime.
    pub fn enqueue(&self, descriptor: ReplyTokenDescriptor) -> bool {
        if !self.inner.mark_processed(descriptor.dedup_key()) {
            tracing::trace!("Skipping duplicate reply token for {}", descriptor.parent_id);
            return false;
        }

        // Counted before spawning so an idle barrier created earlier sees it
        self.inner.outstanding.send_modify(|n| *n += 1);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let guard = TaskGuard(Arc::clone(&inner));

            let Ok(_permit) = Arc::clone(&inner.semaphore).acquire_owned().await else {
                return;
            };

            let running = inner.running.fetch_add(1, Ordering::SeqCst) + 1;
            inner.peak_running.fetch_max(running, Ordering::SeqCst);

            inner.harvest_subtree(descriptor).await;

            inner.running.fetch_sub(1, Ordering::SeqCst);
            drop(guard);
        });

        true
    }

    /// Resolves once no reply task is queued or running
    ///
    /// Tasks enqueued after this future was created, but before it resolves,
    /// are waited for as well.
    pub async fn on_idle(&self) {
        let mut idle = self.inner.outstanding.subscribe();
        // The sender lives in `inner`, so the channel cannot close under us
        let _ = idle.wait_for(|outstanding| *outstanding == 0).await;
    }

    /// Tasks currently queued or running
    pub fn outstanding(&self) -> usize {
        *self.inner.outstanding.borrow()
    }

    /// Highest number of tasks observed running at once
    pub fn peak_running(&self) -> usize {
        self.inner.peak_running.load(Ordering::SeqCst)
    }

    /// Reply pages requested so far
    pub fn fetches_issued(&self) -> u32 {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Reply records handed to the sink so far
    pub fn records_harvested(&self) -> usize {
        self.inner.records.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn mark_processed(&self, key: DedupKey) -> bool {
        self.processed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key)
    }

    /// Fetches one reply collection, its later pages, and nested collections
    async fn harvest_subtree(&self, descriptor: ReplyTokenDescriptor) {
        let Some(continuation) = descriptor.continuation() else {
            tracing::debug!(
                "Reply token for {} has no canonical form; nothing to request",
                descriptor.parent_id
            );
            return;
        };

        let mut worklist = vec![ReplyWork {
            continuation,
            parent_id: descriptor.parent_id,
            depth: 0,
        }];
        let mut pages = 0u32;

        while let Some(work) = worklist.pop() {
            if pages >= self.max_pages {
                tracing::warn!(
                    "Reply collection for {} hit the page ceiling ({}); {} pages left unfetched",
                    work.parent_id,
                    self.max_pages,
                    worklist.len() + 1
                );
                break;
            }
            pages += 1;
            self.fetches.fetch_add(1, Ordering::SeqCst);

            let Some(page) = self.source.fetch(&work.continuation).await else {
                continue;
            };
            let batch = self.source.resolve(page, Some(&work.parent_id));

            self.records.fetch_add(batch.records.len(), Ordering::SeqCst);
            self.source.persist(batch.records);

            if let Some(next) = batch.next {
                let key = ReplyTokenDescriptor::new(next.clone(), &work.parent_id).dedup_key();
                if self.mark_processed(key) {
                    worklist.push(ReplyWork {
                        continuation: next,
                        parent_id: work.parent_id.clone(),
                        depth: work.depth,
                    });
                } else {
                    tracing::debug!("Reply pagination for {} repeats a token", work.parent_id);
                }
            }

            for nested in batch.replies {
                if work.depth + 1 >= self.max_depth {
                    tracing::warn!(
                        "Reply nesting under {} exceeds depth {}; not following",
                        nested.parent_id,
                        self.max_depth
                    );
                    continue;
                }
                if !self.mark_processed(nested.dedup_key()) {
                    continue;
                }
                if let Some(continuation) = nested.continuation() {
                    worklist.push(ReplyWork {
                        continuation,
                        parent_id: nested.parent_id,
                        depth: work.depth + 1,
                    });
                }
            }
        }
    }
}
