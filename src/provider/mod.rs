//! Provider adapters
//!
//! One logical vocabulary over both backing services: search, create
//! playlist, append items, get/set description, list items. The concrete
//! adapters live in [`spotify`] and [`youtube`]; this module owns the
//! shared trait, the uniform retry policy and the provider error
//! envelope.
//!
//! # Retry policy
//!
//! Applied identically to every operation, before which the cancellation
//! token is checked:
//! - 429: honor `Retry-After` + 1 s when present, else 5 s; plus
//!   0–999 ms jitter; retry indefinitely. YouTube additionally treats
//!   403 this way (quota exhaustion surfaces there).
//! - 502/503: 1 s, retry indefinitely.
//! - other non-2xx: decode the provider error JSON, surface terminally.
//! - network errors: log and retry at 1 s cadence until cancelled.
//!
//! Append retries are not idempotent; a retry after a request that in
//! fact landed will duplicate items. The reader decodes the literal
//! stream present in the playlist, so duplicates corrupt the payload.
//! Accepted.

pub mod spotify;
pub mod youtube;

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::transport::RateLimitedClient;

pub use spotify::SpotifyProvider;
pub use youtube::YouTubeProvider;

/// Description text marking the terminal playlist of a chain
pub const CHAIN_END: &str = "null";

/// Default wait for a 429 without a `Retry-After` header
const RATE_LIMIT_WAIT: Duration = Duration::from_secs(5);
/// Wait between retries of transient failures (network, 502/503)
const TRANSIENT_WAIT: Duration = Duration::from_secs(1);

/// Adapter errors that escape the retry loop
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Terminal non-2xx answer, already decoded from the provider's
    /// error envelope
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Operation abandoned because the shared token was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Response did not have the expected shape
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// One page of playlist items
#[derive(Debug, Clone)]
pub struct ItemPage {
    /// Resource ids in playlist order
    pub ids: Vec<String>,
    /// Cursor for the next page, if any
    pub next: Option<String>,
}

/// Batch geometry of a provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderLimits {
    /// Read-buffer / append-batch size in bytes
    pub chunk_bytes: usize,
    /// Soft cap on bytes stored per playlist
    pub playlist_cap: usize,
    /// Length of generated codebook search queries
    pub query_len: usize,
}

/// Logical playlist operations against one backing service
#[async_trait]
pub trait PlaylistProvider: Send + Sync {
    /// Stable account id (Spotify user id / YouTube channel id)
    async fn identify(&self, cancel: &CancellationToken) -> Result<String, ProviderError>;

    /// Ordered candidate resource ids for a query
    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError>;

    /// Create a playlist; returns its id
    async fn create_playlist(
        &self,
        title: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError>;

    /// Append resource ids to a playlist, preserving order
    async fn append(
        &self,
        playlist_id: &str,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;

    /// Overwrite a playlist's description
    async fn set_description(
        &self,
        playlist_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;

    /// Read a playlist's description
    async fn get_description(
        &self,
        playlist_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError>;

    /// One page of a playlist's items
    async fn list_items(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ItemPage, ProviderError>;

    fn limits(&self) -> ProviderLimits;
}

/// Title of the `index`-th playlist in a chain
pub fn playlist_title(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{}{}", base, index)
    }
}

/// Interpret a description as a chain pointer.
///
/// The terminal playlist carries the literal `"null"`; an empty or
/// missing description is treated the same way.
pub fn chain_next(description: &str) -> Option<String> {
    if description.is_empty() || description == CHAIN_END {
        None
    } else {
        Some(description.to_string())
    }
}

/// Base wait for a rate-limit answer, before jitter
fn rate_limit_wait(retry_after_secs: Option<u64>) -> Duration {
    match retry_after_secs {
        Some(secs) => Duration::from_secs(secs + 1),
        None => RATE_LIMIT_WAIT,
    }
}

/// Uniform JSON error envelope: Spotify nests `status`, YouTube `code`
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Execute a request under the uniform retry policy.
///
/// Success statuses return the response for the caller to decode.
/// `retry_403` opts 403 into the rate-limit ladder (YouTube).
pub(crate) async fn execute_with_retry(
    transport: &RateLimitedClient,
    request: reqwest::RequestBuilder,
    retry_403: bool,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, ProviderError> {
    loop {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let attempt = request
            .try_clone()
            .ok_or_else(|| ProviderError::UnexpectedResponse("unclonable request".to_string()))?
            .build()
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        let response = match transport.execute(attempt).await {
            Ok(response) => response,
            Err(e) => {
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }
                tracing::warn!(error = %e, "request failed, retrying in 1s");
                tokio::time::sleep(TRANSIENT_WAIT).await;
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        if code == 429 || (retry_403 && code == 403) {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());

            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
            let wait = rate_limit_wait(retry_after) + jitter;
            tracing::warn!(status = code, "rate limited, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
            continue;
        }

        if code == 502 || code == 503 {
            tracing::warn!(status = code, "transient server error, retrying in 1s");
            tokio::time::sleep(TRANSIENT_WAIT).await;
            continue;
        }

        let message = match response.json::<ApiErrorEnvelope>().await {
            Ok(envelope) => envelope
                .error
                .message
                .unwrap_or_else(|| "no message".to_string()),
            Err(e) => format!("undecodable error body: {}", e),
        };

        return Err(ProviderError::Api {
            status: code,
            message,
        });
    }
}
