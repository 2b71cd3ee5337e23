//! YouTube adapter
//!
//! Videos are the stored resource; ids are plain video ids. The API only
//! accepts one playlist-item insert per request, and updating a
//! playlist's description requires resubmitting its current title, so
//! the adapter reads the title back before every description update.
//! Quota exhaustion surfaces as 403, which joins the rate-limit ladder.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::transport::RateLimitedClient;

use super::{
    execute_with_retry, ItemPage, PlaylistProvider, ProviderError, ProviderLimits, CHAIN_END,
};

pub struct YouTubeProvider {
    transport: RateLimitedClient,
    token: String,
    config: ProviderConfig,
    channel_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(default, rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistListResponse {
    items: Vec<PlaylistResourceOut>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResourceOut {
    #[serde(default)]
    id: String,
    snippet: SnippetOut,
}

#[derive(Debug, Deserialize)]
struct SnippetOut {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ItemListResponse {
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
    items: Vec<ItemEntry>,
}

#[derive(Debug, Deserialize)]
struct ItemEntry {
    snippet: ItemSnippetOut,
}

#[derive(Debug, Deserialize)]
struct ItemSnippetOut {
    #[serde(rename = "resourceId")]
    resource_id: ResourceIdOut,
}

#[derive(Debug, Deserialize)]
struct ResourceIdOut {
    #[serde(default, rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Serialize)]
struct PlaylistInsertBody<'a> {
    snippet: SnippetBody<'a>,
    status: StatusBody<'a>,
}

#[derive(Debug, Serialize)]
struct PlaylistUpdateBody<'a> {
    id: &'a str,
    snippet: SnippetBody<'a>,
}

#[derive(Debug, Serialize)]
struct SnippetBody<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct StatusBody<'a> {
    #[serde(rename = "privacyStatus")]
    privacy_status: &'a str,
}

#[derive(Debug, Serialize)]
struct ItemInsertBody<'a> {
    snippet: ItemSnippetBody<'a>,
}

#[derive(Debug, Serialize)]
struct ItemSnippetBody<'a> {
    #[serde(rename = "playlistId")]
    playlist_id: &'a str,
    #[serde(rename = "resourceId")]
    resource_id: ResourceIdBody<'a>,
}

#[derive(Debug, Serialize)]
struct ResourceIdBody<'a> {
    kind: &'a str,
    #[serde(rename = "videoId")]
    video_id: &'a str,
}

impl YouTubeProvider {
    pub fn new(config: ProviderConfig, token: String) -> Result<Self> {
        let transport = RateLimitedClient::new(config.tick, config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            transport,
            token,
            config,
            channel_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    /// Fetch one playlist resource by id; `None` when it does not exist
    async fn get_playlist(
        &self,
        playlist_id: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<PlaylistResourceOut>, ProviderError> {
        let request = self
            .transport
            .http()
            .get(self.url("/playlists"))
            .bearer_auth(&self.token)
            .query(&[("part", "snippet"), ("id", playlist_id)]);

        let response = execute_with_retry(&self.transport, request, true, cancel).await?;
        let body: PlaylistListResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        Ok(body.items.into_iter().next())
    }
}

#[async_trait]
impl PlaylistProvider for YouTubeProvider {
    async fn identify(&self, cancel: &CancellationToken) -> std::result::Result<String, ProviderError> {
        self.channel_id
            .get_or_try_init(|| async {
                let request = self
                    .transport
                    .http()
                    .get(self.url("/channels"))
                    .bearer_auth(&self.token)
                    .query(&[("part", "snippet"), ("mine", "true")]);

                let response = execute_with_retry(&self.transport, request, true, cancel).await?;
                let body: ChannelListResponse = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

                body.items.into_iter().next().map(|c| c.id).ok_or_else(|| {
                    ProviderError::UnexpectedResponse(
                        "no channel found for authenticated user".to_string(),
                    )
                })
            })
            .await
            .cloned()
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
                ("part", "id"),
                ("q", query),
                ("type", "video"),
                ("maxResults", "50"),
            ]);

        let response = execute_with_retry(&self.transport, request, true, cancel).await?;
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        Ok(body
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    async fn create_playlist(
        &self,
        title: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ProviderError> {
        let request = self
            .transport
            .http()
            .post(self.url("/playlists"))
            .bearer_auth(&self.token)
            .query(&[("part", "snippet,status")])
            .json(&PlaylistInsertBody {
                // New playlists are born terminal; linking rewrites the
                // description once the successor exists.
                snippet: SnippetBody {
                    title,
                    description: CHAIN_END,
                },
                status: StatusBody {
                    privacy_status: "unlisted",
                },
            });

        let response = execute_with_retry(&self.transport, request, true, cancel).await?;
        let created: PlaylistResourceOut = response
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
        // One insert per video; the API has no batch form
        for video_id in ids {
            let request = self
                .transport
                .http()
                .post(self.url("/playlistItems"))
                .bearer_auth(&self.token)
                .query(&[("part", "snippet")])
                .json(&ItemInsertBody {
                    snippet: ItemSnippetBody {
                        playlist_id,
                        resource_id: ResourceIdBody {
                            kind: "youtube#video",
                            video_id,
                        },
                    },
                });

            execute_with_retry(&self.transport, request, true, cancel).await?;
        }
        Ok(())
    }

    async fn set_description(
        &self,
        playlist_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), ProviderError> {
        // The update PUT requires snippet.title, so read it back first
        let current = self.get_playlist(playlist_id, cancel).await?.ok_or_else(|| {
            ProviderError::UnexpectedResponse(format!("playlist not found: {}", playlist_id))
        })?;

        let request = self
            .transport
            .http()
            .put(self.url("/playlists"))
            .bearer_auth(&self.token)
            .query(&[("part", "snippet")])
            .json(&PlaylistUpdateBody {
                id: playlist_id,
                snippet: SnippetBody {
                    title: &current.snippet.title,
                    description: text,
                },
            });

        execute_with_retry(&self.transport, request, true, cancel).await?;
        Ok(())
    }

    async fn get_description(
        &self,
        playlist_id: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ProviderError> {
        // A vanished playlist reads as an empty description, which the
        // chain walk treats as terminal.
        Ok(self
            .get_playlist(playlist_id, cancel)
            .await?
            .map(|p| p.snippet.description)
            .unwrap_or_default())
    }

    async fn list_items(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> std::result::Result<ItemPage, ProviderError> {
        let mut request = self
            .transport
            .http()
            .get(self.url("/playlistItems"))
            .bearer_auth(&self.token)
            .query(&[
                ("part", "snippet"),
                ("playlistId", playlist_id),
                ("maxResults", "50"),
            ]);
        if let Some(token) = cursor {
            request = request.query(&[("pageToken", token)]);
        }

        let response = execute_with_retry(&self.transport, request, true, cancel).await?;
        let page: ItemListResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        let ids = page
            .items
            .into_iter()
            .map(|entry| entry.snippet.resource_id.video_id)
            .collect();

        Ok(ItemPage {
            ids,
            next: page.next_page_token,
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
