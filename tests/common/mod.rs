//! In-memory provider stub shared by integration tests
//!
//! Behaves like a well-behaved provider: search results are a pure
//! function of the query (so codebook rebuilds are reproducible),
//! playlists keep insertion order, and list pages honor a configurable
//! page size. A single append call can be scripted to fail terminally.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tunefs::provider::{ItemPage, PlaylistProvider, ProviderError, ProviderLimits};

pub struct StubPlaylist {
    pub title: String,
    pub description: String,
    pub items: Vec<String>,
}

#[derive(Default)]
struct StubState {
    playlists: HashMap<String, StubPlaylist>,
    order: Vec<String>,
    next_playlist: usize,
    append_calls: usize,
    fail_append_for: Option<String>,
}

pub struct StubProvider {
    state: Mutex<StubState>,
    limits: ProviderLimits,
    page_size: usize,
}

impl StubProvider {
    /// Spotify-shaped geometry: 100-byte chunks, 10 000-byte playlists
    pub fn spotify_caps() -> Self {
        Self::with_geometry(100, 10_000, 50)
    }

    pub fn with_geometry(chunk_bytes: usize, playlist_cap: usize, page_size: usize) -> Self {
        Self {
            state: Mutex::new(StubState::default()),
            limits: ProviderLimits {
                chunk_bytes,
                playlist_cap,
                query_len: 3,
            },
            page_size,
        }
    }

    /// Script the next append to `playlist_id` to fail terminally.
    pub fn fail_append_for(&self, playlist_id: &str) {
        self.state.lock().unwrap().fail_append_for = Some(playlist_id.to_string());
    }

    pub fn append_calls(&self) -> usize {
        self.state.lock().unwrap().append_calls
    }

    pub fn playlist_count(&self) -> usize {
        self.state.lock().unwrap().order.len()
    }

    pub fn playlist_ids_in_order(&self) -> Vec<String> {
        self.state.lock().unwrap().order.clone()
    }

    pub fn playlist(&self, playlist_id: &str) -> Option<StubPlaylist> {
        self.state
            .lock()
            .unwrap()
            .playlists
            .get(playlist_id)
            .map(|p| StubPlaylist {
                title: p.title.clone(),
                description: p.description.clone(),
                items: p.items.clone(),
            })
    }

    fn check(cancel: &CancellationToken) -> Result<(), ProviderError> {
        if cancel.is_cancelled() {
            Err(ProviderError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn not_found(playlist_id: &str) -> ProviderError {
        ProviderError::Api {
            status: 404,
            message: format!("playlist not found: {}", playlist_id),
        }
    }
}

#[async_trait]
impl PlaylistProvider for StubProvider {
    async fn identify(&self, cancel: &CancellationToken) -> Result<String, ProviderError> {
        Self::check(cancel)?;
        Ok("stub-account".to_string())
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProviderError> {
        Self::check(cancel)?;
        // Pure function of the query: rebuilding a codebook from the
        // same password sees the same ids.
        Ok((0..50).map(|i| format!("{}-{}", query, i)).collect())
    }

    async fn create_playlist(
        &self,
        title: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        Self::check(cancel)?;
        let mut state = self.state.lock().unwrap();
        let id = format!("pl-{}", state.next_playlist);
        state.next_playlist += 1;
        state.playlists.insert(
            id.clone(),
            StubPlaylist {
                title: title.to_string(),
                description: String::new(),
                items: Vec::new(),
            },
        );
        state.order.push(id.clone());
        Ok(id)
    }

    async fn append(
        &self,
        playlist_id: &str,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        Self::check(cancel)?;
        let mut state = self.state.lock().unwrap();
        state.append_calls += 1;

        if state.fail_append_for.as_deref() == Some(playlist_id) {
            state.fail_append_for = None;
            return Err(ProviderError::Api {
                status: 500,
                message: "scripted append failure".to_string(),
            });
        }

        let playlist = state
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| Self::not_found(playlist_id))?;
        playlist.items.extend(ids.iter().cloned());
        Ok(())
    }

    async fn set_description(
        &self,
        playlist_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        Self::check(cancel)?;
        let mut state = self.state.lock().unwrap();
        let playlist = state
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| Self::not_found(playlist_id))?;
        playlist.description = text.to_string();
        Ok(())
    }

    async fn get_description(
        &self,
        playlist_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        Self::check(cancel)?;
        let state = self.state.lock().unwrap();
        state
            .playlists
            .get(playlist_id)
            .map(|p| p.description.clone())
            .ok_or_else(|| Self::not_found(playlist_id))
    }

    async fn list_items(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ItemPage, ProviderError> {
        Self::check(cancel)?;
        let state = self.state.lock().unwrap();
        let playlist = state
            .playlists
            .get(playlist_id)
            .ok_or_else(|| Self::not_found(playlist_id))?;

        let offset: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (offset + self.page_size).min(playlist.items.len());
        let next = if end < playlist.items.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(ItemPage {
            ids: playlist.items[offset..end].to_vec(),
            next,
        })
    }

    fn limits(&self) -> ProviderLimits {
        self.limits
    }
}
