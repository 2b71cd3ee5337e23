//! Common error types for tunefs

use thiserror::Error;

use crate::provider::ProviderError;

/// Common result type for tunefs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error taxonomy
///
/// Transport-level failures (network, 429, 502/503) never appear here:
/// the provider adapter retries them internally and only surfaces
/// cancellation or a terminal API error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authorization error: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Vault decryption failed: wrong password or tampered data")]
    VaultAuthentication,

    #[error("Unknown resource id `{id}` in playlist {playlist_id}; refusing to write a corrupted file")]
    Integrity { playlist_id: String, id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
