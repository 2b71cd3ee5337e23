//! Reader pipeline: playlist chain → byte stream
//!
//! The driver walks the chain through the description fields, assigning
//! each playlist a sequence number at dispatch time. Workers fetch and
//! decode playlists in parallel and may complete out of order; a reorder
//! buffer keyed on the sequence number restores chain order before
//! anything reaches the output file.
//!
//! An item id missing from the reverse map aborts the whole read. The
//! output file is left truncated at the last contiguous write; it never
//! contains wrong bytes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::codebook::{Codebook, ReverseMap};
use crate::error::{Error, Result};
use crate::provider::{chain_next, PlaylistProvider};
use crate::vault;

use super::{ReadJob, ReadResult, IDLE_CHECK, NUM_WORKERS};

/// Reconstruct the byte stream starting at `head_id` into `output`.
///
/// The reverse map comes from the vault when a path is given, otherwise
/// it is rebuilt online from the password (best-effort; the chain may
/// have drifted away from what a fresh search returns).
pub async fn read_chain(
    provider: Arc<dyn PlaylistProvider>,
    head_id: &str,
    output: &Path,
    password: &str,
    vault_file: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<()> {
    let reverse: Arc<ReverseMap> = Arc::new(match vault_file {
        Some(path) => vault::load(path, password)?,
        None => Codebook::build(provider.as_ref(), password, cancel)
            .await?
            .into_reverse(),
    });

    let mut out = tokio::fs::File::create(output).await?;

    let (jobs_tx, jobs_rx) = mpsc::channel::<ReadJob>(NUM_WORKERS);
    let jobs_rx = Arc::new(Mutex::new(jobs_rx));
    let (results_tx, mut results_rx) = mpsc::channel::<Result<ReadResult>>(NUM_WORKERS);

    for _ in 0..NUM_WORKERS {
        tokio::spawn(list_worker(
            provider.clone(),
            jobs_rx.clone(),
            results_tx.clone(),
            reverse.clone(),
            cancel.clone(),
        ));
    }
    drop(results_tx);

    let mut next_id = Some(head_id.to_string());
    let mut jobs_sent = 0usize;
    let mut done_sending = false;
    let mut pending: HashMap<usize, ReadResult> = HashMap::new();
    let mut next_to_write = 0usize;

    loop {
        // Fill the dispatch window while the chain continues
        while !done_sending && jobs_tx.capacity() > 0 {
            match next_id.take() {
                Some(id) => {
                    jobs_tx
                        .send(ReadJob {
                            sequence: jobs_sent,
                            playlist_id: id.clone(),
                        })
                        .await
                        .map_err(|_| {
                            Error::Internal("list workers stopped unexpectedly".to_string())
                        })?;
                    jobs_sent += 1;

                    let description = provider.get_description(&id, cancel).await?;
                    match chain_next(&description) {
                        Some(successor) => next_id = Some(successor),
                        None => done_sending = true,
                    }
                }
                None => done_sending = true,
            }
        }

        if done_sending && next_to_write == jobs_sent {
            break;
        }

        tokio::select! {
            received = results_rx.recv() => match received {
                Some(Ok(result)) => {
                    if let Some(next) = &result.next_id {
                        tracing::trace!(sequence = result.sequence, next = %next,
                            "worker reported successor");
                    }
                    pending.insert(result.sequence, result);

                    while let Some(ready) = pending.remove(&next_to_write) {
                        out.write_all(&ready.data).await?;
                        tracing::info!(sequence = next_to_write, "chain segment written");
                        next_to_write += 1;
                    }
                }
                Some(Err(e)) => {
                    // Integrity or adapter-fatal: stop the whole read
                    cancel.cancel();
                    return Err(e);
                }
                None => {
                    if done_sending && next_to_write == jobs_sent {
                        break;
                    }
                    return Err(Error::Internal(
                        "list workers exited with results outstanding".to_string(),
                    ));
                }
            },
            _ = tokio::time::sleep(IDLE_CHECK) => {
                if done_sending && next_to_write == jobs_sent {
                    break;
                }
                tracing::debug!(next_to_write, jobs_sent, "reader idle, still waiting");
            }
        }
    }

    out.flush().await?;
    tracing::info!(playlists = jobs_sent, "read complete");
    Ok(())
}

/// Drain jobs until the channel closes; one job is one playlist.
async fn list_worker(
    provider: Arc<dyn PlaylistProvider>,
    jobs: Arc<Mutex<mpsc::Receiver<ReadJob>>>,
    results: mpsc::Sender<Result<ReadResult>>,
    reverse: Arc<ReverseMap>,
    cancel: CancellationToken,
) {
    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else { break };

        let outcome = decode_playlist(provider.as_ref(), &job, &reverse, &cancel).await;
        let fatal = outcome.is_err();
        if results.send(outcome).await.is_err() || fatal {
            break;
        }
    }
}

/// Page through one playlist and decode every item.
async fn decode_playlist(
    provider: &dyn PlaylistProvider,
    job: &ReadJob,
    reverse: &ReverseMap,
    cancel: &CancellationToken,
) -> Result<ReadResult> {
    let mut data = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = provider
            .list_items(&job.playlist_id, cursor.as_deref(), cancel)
            .await?;

        for id in page.ids {
            match reverse.get(&id) {
                Some(byte) => data.push(*byte),
                None => {
                    return Err(Error::Integrity {
                        playlist_id: job.playlist_id.clone(),
                        id,
                    })
                }
            }
        }

        match page.next {
            Some(next_cursor) => cursor = Some(next_cursor),
            None => break,
        }
    }

    // Redundant with the driver's own walk; conveys termination
    let description = provider.get_description(&job.playlist_id, cancel).await?;

    Ok(ReadResult {
        sequence: job.sequence,
        data,
        next_id: chain_next(&description),
    })
}
