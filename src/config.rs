//! Provider configuration and credential resolution
//!
//! Everything that varies between Spotify and YouTube lives in one
//! `ProviderConfig` record: endpoints, pacing, batch geometry and the
//! OAuth parameters. Nothing in the rest of the crate branches on the
//! provider kind outside of the adapter implementations.

use std::time::Duration;

use crate::error::{Error, Result};

/// Loopback port shared by both OAuth callback paths
pub const CALLBACK_PORT: u16 = 8080;

/// Which media-hosting service backs the playlist store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Spotify,
    YouTube,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Spotify => "spotify",
            ProviderKind::YouTube => "youtube",
        }
    }

    pub fn config(&self) -> ProviderConfig {
        match self {
            ProviderKind::Spotify => ProviderConfig::spotify(),
            ProviderKind::YouTube => ProviderConfig::youtube(),
        }
    }
}

/// OAuth client credentials, resolved from the environment
#[derive(Clone, Debug)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Load the credential pair for `kind`; absence is a startup failure.
    pub fn from_env(kind: ProviderKind) -> Result<Self> {
        let (id_var, secret_var) = match kind {
            ProviderKind::Spotify => ("SPOTIFY_CLIENTID", "SPOTIFY_CLIENTSECRET"),
            ProviderKind::YouTube => ("YOUTUBE_CLIENTID", "YOUTUBE_CLIENTSECRET"),
        };

        let client_id = std::env::var(id_var)
            .map_err(|_| Error::Config(format!("{} system env var not found", id_var)))?;
        let client_secret = std::env::var(secret_var)
            .map_err(|_| Error::Config(format!("{} system env var not found", secret_var)))?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

/// Per-provider endpoints, pacing and batch geometry
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// API base URL
    pub api_base: String,
    /// OAuth authorization endpoint
    pub auth_url: String,
    /// OAuth token endpoint
    pub token_url: String,
    /// Space-separated OAuth scopes
    pub scopes: &'static str,

    /// Minimum interval between outgoing requests
    pub tick: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// How long to wait for the OAuth callback
    pub auth_wait: Duration,
    /// Grace period for callback-server shutdown
    pub shutdown_grace: Duration,

    /// Read-buffer size; also the append batch ceiling per request
    pub chunk_bytes: usize,
    /// Soft cap on bytes stored in one playlist
    pub playlist_cap: usize,
    /// Items returned per list page
    pub page_size: usize,
    /// Length of the generated search query
    pub query_len: usize,
}

impl ProviderConfig {
    pub fn spotify() -> Self {
        Self {
            kind: ProviderKind::Spotify,
            api_base: "https://api.spotify.com/v1".to_string(),
            auth_url: "https://accounts.spotify.com/authorize".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            scopes: "playlist-read-private playlist-read-collaborative \
                     playlist-modify-private playlist-modify-public",
            tick: Duration::from_millis(200),
            request_timeout: Duration::from_secs(10),
            auth_wait: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
            chunk_bytes: 100,
            playlist_cap: 10_000,
            page_size: 50,
            query_len: 3,
        }
    }

    pub fn youtube() -> Self {
        Self {
            kind: ProviderKind::YouTube,
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: "https://www.googleapis.com/auth/youtube",
            tick: Duration::from_millis(300),
            request_timeout: Duration::from_secs(10),
            auth_wait: Duration::from_secs(120),
            shutdown_grace: Duration::from_secs(5),
            chunk_bytes: 50,
            playlist_cap: 5_000,
            page_size: 50,
            query_len: 5,
        }
    }

    /// Loopback redirect URI registered with the provider
    pub fn redirect_uri(&self) -> String {
        format!(
            "http://127.0.0.1:{}/callback/{}",
            CALLBACK_PORT,
            self.kind.name()
        )
    }
}
