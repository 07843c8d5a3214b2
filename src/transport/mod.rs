//! Transport layer for remote continuation requests
//!
//! This module contains:
//! - The `RemoteClient` seam and its `reqwest` implementation
//! - Request body construction for continuation fetches
//! - The retry transport with bounded exponential backoff

mod client;
mod retry;

pub use client::{build_http_client, build_request, ClientContext, HttpClient, RemoteClient};
pub use retry::{FetchOutcome, RetryPolicy, RetryTransport};

use thiserror::Error;

/// Errors produced by a single remote call
///
/// Every variant is treated as retryable by [`RetryTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Response body is not valid JSON: {0}")]
    Decode(String),
}
