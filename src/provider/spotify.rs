//! Spotify adapter
//!
//! Tracks are the stored resource; ids are full track URIs
//! (`spotify:track:...`). Appends batch up to 100 URIs per request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::transport::RateLimitedClient;

use super::{
    execute_with_retry, ItemPage, PlaylistProvider, ProviderError, ProviderLimits,
};

pub struct SpotifyProvider {
    transport: RateLimitedClient,
    token: String,
    config: ProviderConfig,
    account_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TracksWrapper,
}

#[derive(Debug, Deserialize)]
struct TracksWrapper {
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistDetails {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    next: Option<String>,
    items: Vec<TrackPageEntry>,
}

#[derive(Debug, Deserialize)]
struct TrackPageEntry {
    track: Option<TrackRef>,
}

#[derive(Debug, Deserialize)]
struct TrackRef {
    uri: String,
}

#[derive(Debug, Serialize)]
struct CreatePlaylistBody<'a> {
    name: &'a str,
    public: bool,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    uris: &'a [String],
}

#[derive(Debug, Serialize)]
struct DescriptionBody<'a> {
    description: &'a str,
}

impl SpotifyProvider {
    pub fn new(config: ProviderConfig, token: String) -> Result<Self> {
        let transport = RateLimitedClient::new(config.tick, config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            transport,
            token,
            config,
            account_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    async fn account_id(&self, cancel: &CancellationToken) -> std::result::Result<&str, ProviderError> {
        self.account_id
            .get_or_try_init(|| async {
                let request = self
                    .transport
                    .http()
                    .get(self.url("/me"))
                    .bearer_auth(&self.token);

                let response = execute_with_retry(&self.transport, request, false, cancel).await?;
                let user: UserResponse = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;
                Ok(user.id)
            })
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl PlaylistProvider for SpotifyProvider {
    async fn identify(&self, cancel: &CancellationToken) -> std::result::Result<String, ProviderError> {
        self.account_id(cancel).await.map(str::to_string)
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<String>, ProviderError> {
        let request = self
            .transport
            .http()
            .get(self.url("/search"))
            .bearer_auth(&self.token)
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", "1"),
                ("market", "US"),
            ]);

        let response = execute_with_retry(&self.transport, request, false, cancel).await?;
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        Ok(body.tracks.items.into_iter().map(|t| t.uri).collect())
    }

    async fn create_playlist(
        &self,
        title: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ProviderError> {
        let user = self.account_id(cancel).await?;
        let request = self
            .transport
            .http()
            .post(self.url(&format!("/users/{}/playlists", user)))
            .bearer_auth(&self.token)
            .json(&CreatePlaylistBody {
                name: title,
                public: true,
            });

        let response = execute_with_retry(&self.transport, request, false, cancel).await?;
        let created: CreatedPlaylist = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        tracing::info!(playlist_id = %created.id, title = %title, "playlist created");
        Ok(created.id)
    }

    async fn append(
        &self,
        playlist_id: &str,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> std::result::Result<(), ProviderError> {
        // Up to 100 URIs per request; jobs never exceed chunk_bytes == 100
        for batch in ids.chunks(self.config.chunk_bytes) {
            let request = self
                .transport
                .http()
                .post(self.url(&format!("/playlists/{}/tracks", playlist_id)))
                .bearer_auth(&self.token)
                .json(&AppendBody { uris: batch });

            execute_with_retry(&self.transport, request, false, cancel).await?;
        }
        Ok(())
    }

    async fn set_description(
        &self,
        playlist_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), ProviderError> {
        let request = self
            .transport
            .http()
            .put(self.url(&format!("/playlists/{}", playlist_id)))
            .bearer_auth(&self.token)
            .json(&DescriptionBody { description: text });

        execute_with_retry(&self.transport, request, false, cancel).await?;
        Ok(())
    }

    async fn get_description(
        &self,
        playlist_id: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ProviderError> {
        let request = self
            .transport
            .http()
            .get(self.url(&format!("/playlists/{}", playlist_id)))
            .bearer_auth(&self.token)
            .query(&[("fields", "description")]);

        let response = execute_with_retry(&self.transport, request, false, cancel).await?;
        let details: PlaylistDetails = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        Ok(details.description.unwrap_or_default())
    }

    async fn list_items(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> std::result::Result<ItemPage, ProviderError> {
        // The cursor is the absolute `next` URL Spotify hands back
        let request = match cursor {
            Some(next_url) => self.transport.http().get(next_url).bearer_auth(&self.token),
            None => self
                .transport
                .http()
                .get(self.url(&format!("/playlists/{}/tracks", playlist_id)))
                .bearer_auth(&self.token)
                .query(&[
                    ("fields", "next,items(track(uri))"),
                    ("limit", "50"),
                    ("market", "US"),
                ]),
        };

        let response = execute_with_retry(&self.transport, request, false, cancel).await?;
        let page: TrackPage = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        // A removed track decodes as an empty id; the reader rejects it
        // rather than silently dropping a byte.
        let ids = page
            .items
            .into_iter()
            .map(|entry| entry.track.map(|t| t.uri).unwrap_or_default())
            .collect();

        Ok(ItemPage {
            ids,
            next: page.next,
        })
    }

    fn limits(&self) -> ProviderLimits {
        ProviderLimits {
            chunk_bytes: self.config.chunk_bytes,
            playlist_cap: self.config.playlist_cap,
            query_len: self.config.query_len,
        }
    }
}
