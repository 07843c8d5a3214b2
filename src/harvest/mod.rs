//! Harvest engine
//!
//! This module contains:
//! - `session`: the single-flight [`Harvester`] entry point
//! - `walker`: the pipelined main token walk and the drain phase
//! - `replies`: bounded-concurrency reply collection fetching
//! - `fallback`: rendered-page extraction used when nothing was harvested
//! - `source`: the fetch/resolve/persist plumbing shared by the above

mod fallback;
mod replies;
mod session;
mod source;
mod walker;

#[cfg(test)]
mod testing;

pub use fallback::{FallbackExtractor, HtmlFallback, NoFallback};
pub use replies::ReplyHarvester;
pub use session::Harvester;
pub use walker::WalkerPhase;

use crate::model::{Continuation, Record};
use crate::transport::ClientContext;

/// Everything needed to start a session
#[derive(Debug, Clone)]
pub struct SeedRequest {
    pub session_id: String,

    /// First continuation of the top-level sequence
    pub continuation: Option<Continuation>,

    /// Client context; when absent the harvester waits on its readiness channel
    pub context: Option<ClientContext>,
}

impl SeedRequest {
    pub fn new(session_id: impl Into<String>, continuation: Continuation) -> Self {
        Self {
            session_id: session_id.into(),
            continuation: Some(continuation),
            context: None,
        }
    }

    pub fn with_context(mut self, context: ClientContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Result of one session, handed to the exporter
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    pub session_id: String,

    /// Final store snapshot, or the fallback's records
    pub records: Vec<Record>,

    pub main_count: usize,
    pub reply_count: usize,
    pub main_fetches: u32,
    pub reply_fetches: u32,
    pub used_fallback: bool,
}

impl HarvestReport {
    pub(crate) fn empty(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
