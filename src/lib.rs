//! Thread-Harvest: an incremental paginated comment-thread harvester
//!
//! This crate walks a paginated, hierarchical remote dataset using opaque
//! continuation tokens, resolves normalized entity records split across pages,
//! fetches nested reply collections under bounded concurrency, and persists the
//! results incrementally.

pub mod config;
pub mod harvest;
pub mod model;
pub mod output;
pub mod resolver;
pub mod storage;
pub mod transport;

use thiserror::Error;

/// Main error type for Thread-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("A harvest session is already in progress")]
    SessionConflict,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Thread-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{HarvestReport, Harvester, SeedRequest};
pub use model::{ContinuationToken, EntityKey, Record, ReplyTokenDescriptor};
