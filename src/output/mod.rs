//! Output module for harvest summaries and exports
//!
//! This module handles:
//! - Harvest statistics, from a session report or from the store
//! - Exporting stored records as JSON

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::model::Record;
use std::io::Write;

/// Writes `records` to `writer` as a pretty-printed JSON array
pub fn write_records_json<W: Write>(records: &[Record], mut writer: W) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    Ok(())
}
