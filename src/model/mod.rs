//! Data model shared by every harvest component
//!
//! - `Record`: one harvested comment or reply
//! - `ContinuationToken` / `EntityKey`: opaque identifiers with equality-only semantics
//! - `Batch`: the yield of a single fetch
//! - `ReplyTokenDescriptor`: a reply collection waiting to be fetched

mod record;
mod token;

pub use record::Record;
pub use token::{Continuation, ContinuationToken, DedupKey, EntityKey, ReplyTokenDescriptor};

/// The yield of one fetch
#[derive(Debug, Default)]
pub struct Batch {
    /// Records resolved from the page
    pub records: Vec<Record>,

    /// Next position in the same sequence, if any
    pub next: Option<Continuation>,

    /// Reply collections discovered on the page
    pub replies: Vec<ReplyTokenDescriptor>,
}
