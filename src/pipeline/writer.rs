//! Writer pipeline: byte stream → linked playlist chain
//!
//! The producer path owns all ordering: it creates each playlist, links
//! the previous one to it via the description field, and only then hands
//! the playlist's chunks to the worker pool. One job is one playlist, so
//! appends within a playlist stay in input order while playlists fill in
//! parallel.
//!
//! Chain-commit ordering is deliberate: the link to a playlist is
//! published before any append to it, so a crash mid-append still
//! leaves a walkable chain ending in a short final playlist.

use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::codebook::Codebook;
use crate::error::{Error, Result};
use crate::provider::{playlist_title, PlaylistProvider, ProviderError, CHAIN_END};
use crate::vault;

use super::{WriteJob, NUM_WORKERS};

/// Encode `input` onto a fresh playlist chain.
///
/// Builds the codebook and writes it to `vault_file` before any playlist
/// exists, streams the file through the worker pool, then finalizes the
/// terminal sentinel. Returns the head playlist id, or `None` for empty
/// input.
pub async fn write_file(
    provider: Arc<dyn PlaylistProvider>,
    input: &Path,
    password: &str,
    base_name: &str,
    vault_file: &Path,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    let codebook = Arc::new(Codebook::build(provider.as_ref(), password, cancel).await?);
    vault::save(vault_file, codebook.reverse(), password)?;

    let file = tokio::fs::File::open(input).await?;

    let (jobs_tx, jobs_rx) = mpsc::channel::<WriteJob>(NUM_WORKERS);
    let jobs_rx = Arc::new(Mutex::new(jobs_rx));

    let mut workers = Vec::with_capacity(NUM_WORKERS);
    for worker_id in 0..NUM_WORKERS {
        workers.push(tokio::spawn(append_worker(
            provider.clone(),
            codebook.clone(),
            jobs_rx.clone(),
            cancel.clone(),
            worker_id,
        )));
    }

    // `jobs_tx` moves into the producer and is dropped there, closing
    // the channel for the workers even on an early error return.
    let produced = produce(provider.as_ref(), file, base_name, jobs_tx, cancel).await;

    for worker in workers {
        worker
            .await
            .map_err(|e| Error::Internal(format!("append worker panicked: {}", e)))?;
    }

    let chain = produced?;
    if let Some(last_id) = &chain.last {
        provider.set_description(last_id, CHAIN_END, cancel).await?;
    }

    match &chain.head {
        Some(head) => tracing::info!(head = %head, "all playlists written and linked"),
        None => tracing::info!("input was empty; no playlists created"),
    }
    Ok(chain.head)
}

struct ChainEnds {
    head: Option<String>,
    last: Option<String>,
}

/// Chunk the input and emit one linked playlist per soft-cap worth of
/// bytes. Runs on the producer path; strictly ordered.
async fn produce(
    provider: &dyn PlaylistProvider,
    mut file: tokio::fs::File,
    base_name: &str,
    jobs_tx: mpsc::Sender<WriteJob>,
    cancel: &CancellationToken,
) -> Result<ChainEnds> {
    let limits = provider.limits();
    let mut buf = vec![0u8; limits.chunk_bytes];

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut pending_bytes = 0usize;
    let mut playlist_count = 0usize;
    let mut head: Option<String> = None;
    let mut last: Option<String> = None;

    loop {
        let n = file.read(&mut buf).await?;
        let eof = n == 0;
        if n > 0 {
            chunks.push(buf[..n].to_vec());
            pending_bytes += n;
        }

        if (pending_bytes >= limits.playlist_cap || eof) && !chunks.is_empty() {
            let title = playlist_title(base_name, playlist_count);
            let playlist_id = provider.create_playlist(&title, cancel).await?;

            // Link before any append touches the new playlist
            match &last {
                Some(prev) => provider.set_description(prev, &playlist_id, cancel).await?,
                None => head = Some(playlist_id.clone()),
            }

            jobs_tx
                .send(WriteJob {
                    playlist_id: playlist_id.clone(),
                    chunks: std::mem::take(&mut chunks),
                })
                .await
                .map_err(|_| Error::Internal("append workers stopped unexpectedly".to_string()))?;

            last = Some(playlist_id);
            pending_bytes = 0;
            playlist_count += 1;
        }

        if eof {
            break;
        }
    }

    Ok(ChainEnds { head, last })
}

/// Drain jobs until the channel closes; each job is one playlist.
async fn append_worker(
    provider: Arc<dyn PlaylistProvider>,
    codebook: Arc<Codebook>,
    jobs: Arc<Mutex<mpsc::Receiver<WriteJob>>>,
    cancel: CancellationToken,
    worker_id: usize,
) {
    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else { break };

        let mut abandoned = false;
        for chunk in &job.chunks {
            let ids: Vec<String> = chunk
                .iter()
                .map(|b| {
                    codebook
                        .forward()
                        .get(b)
                        .cloned()
                        .expect("codebook covers all 256 byte values")
                })
                .collect();

            match provider.append(&job.playlist_id, &ids, &cancel).await {
                Ok(()) => {}
                Err(ProviderError::Cancelled) => {
                    tracing::warn!(worker_id, playlist_id = %job.playlist_id, "append cancelled");
                    return;
                }
                Err(e) => {
                    // Terminal API failure: abandon this playlist, keep
                    // the pipeline going for the rest of the chain.
                    tracing::error!(
                        worker_id,
                        playlist_id = %job.playlist_id,
                        error = %e,
                        "append failed terminally, abandoning playlist"
                    );
                    abandoned = true;
                    break;
                }
            }
        }

        if !abandoned {
            tracing::info!(worker_id, playlist_id = %job.playlist_id, "all chunks appended");
        }
    }
}
