//! Harvest statistics
//!
//! Built either from a finished session's report or, for `--stats`, from what
//! the store currently holds.

use crate::harvest::HarvestReport;
use crate::storage::{DurableSink, SessionRecord, StorageResult};

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestStatistics {
    pub session_id: Option<String>,

    /// Top-level comments
    pub main_count: u64,

    pub reply_count: u64,

    /// Present only when built from a report
    pub main_fetches: Option<u32>,
    pub reply_fetches: Option<u32>,

    pub used_fallback: bool,
}

impl HarvestStatistics {
    pub fn total_records(&self) -> u64 {
        self.main_count + self.reply_count
    }
}

impl From<&HarvestReport> for HarvestStatistics {
    fn from(report: &HarvestReport) -> Self {
        Self {
            session_id: Some(report.session_id.clone()),
            main_count: report.main_count as u64,
            reply_count: report.reply_count as u64,
            main_fetches: Some(report.main_fetches),
            reply_fetches: Some(report.reply_fetches),
            used_fallback: report.used_fallback,
        }
    }
}

impl From<&SessionRecord> for HarvestStatistics {
    fn from(session: &SessionRecord) -> Self {
        Self {
            session_id: Some(session.id.clone()),
            main_count: session.counts.main,
            reply_count: session.counts.replies,
            ..Self::default()
        }
    }
}

/// Loads statistics for the records currently stored
pub async fn load_statistics(sink: &DurableSink) -> StorageResult<HarvestStatistics> {
    let counts = sink.counts().await?;

    Ok(HarvestStatistics {
        main_count: counts.main,
        reply_count: counts.replies,
        ..HarvestStatistics::default()
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    if let Some(session_id) = &stats.session_id {
        println!("Session: {}\n", session_id);
    }

    println!("Records:");
    println!("  Comments: {}", stats.main_count);
    println!("  Replies: {}", stats.reply_count);
    println!("  Total: {}", stats.total_records());
    println!();

    if let (Some(main), Some(replies)) = (stats.main_fetches, stats.reply_fetches) {
        println!("Fetches:");
        println!("  Main pages: {}", main);
        println!("  Reply pages: {}", replies);
        println!();
    }

    if stats.used_fallback {
        println!("Network harvest was empty; records came from the rendered page.");
    }
}
