//! Writer/reader pipeline tests against the in-memory stub provider

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::StubProvider;
use tunefs::error::Error;
use tunefs::pipeline::{read_chain, write_file};
use tunefs::provider::chain_next;

struct Fixture {
    _dir: tempfile::TempDir,
    input: PathBuf,
    output: PathBuf,
    vault: PathBuf,
}

fn fixture(payload: &[u8]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.bin");
    std::fs::write(&input, payload).unwrap();
    Fixture {
        input,
        output: dir.path().join("out.bin"),
        vault: dir.path().join("T_Decoder.gob"),
        _dir: dir,
    }
}

#[tokio::test]
async fn test_write_small_payload_single_playlist() {
    let provider = Arc::new(StubProvider::spotify_caps());
    let cancel = CancellationToken::new();
    let fx = fixture(b"hello\n");

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .expect("non-empty input must produce a head");

    assert_eq!(provider.playlist_count(), 1);
    let playlist = provider.playlist(&head).unwrap();
    assert_eq!(playlist.title, "T");
    assert_eq!(playlist.items.len(), 6);
    assert_eq!(playlist.description, "null");

    let vault_len = std::fs::metadata(&fx.vault).unwrap().len();
    assert!(vault_len >= 60);
}

#[tokio::test]
async fn test_read_back_with_vault() {
    let provider = Arc::new(StubProvider::spotify_caps());
    let cancel = CancellationToken::new();
    let fx = fixture(b"hello\n");

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .unwrap();

    read_chain(provider, &head, &fx.output, "pw", Some(&fx.vault), &cancel)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&fx.output).unwrap(), b"hello\n");
}

#[tokio::test]
async fn test_round_trip_multi_playlist_without_vault() {
    // Small geometry: 4-byte chunks, 10-byte playlists, 3-item pages.
    // 30 bytes make a 3-playlist chain and exercise list pagination.
    let provider = Arc::new(StubProvider::with_geometry(4, 10, 3));
    let cancel = CancellationToken::new();
    let payload: Vec<u8> = (0u8..30).collect();
    let fx = fixture(&payload);

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(provider.playlist_count(), 3);

    // The rebuilt-online path: same password, same stub search results
    read_chain(provider, &head, &fx.output, "pw", None, &cancel)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&fx.output).unwrap(), payload);
}

#[tokio::test]
async fn test_chain_links_every_playlist_exactly_once() {
    let provider = Arc::new(StubProvider::with_geometry(4, 10, 50));
    let cancel = CancellationToken::new();
    let payload: Vec<u8> = (0u8..30).collect();
    let fx = fixture(&payload);

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .unwrap();

    let created = provider.playlist_ids_in_order();
    assert_eq!(created[0], head);

    // Walk the chain through the description fields
    let mut visited = Vec::new();
    let mut current = Some(head);
    while let Some(id) = current {
        visited.push(id.clone());
        let playlist = provider.playlist(&id).unwrap();
        current = chain_next(&playlist.description);
    }

    assert_eq!(visited, created);
    let last = provider.playlist(visited.last().unwrap()).unwrap();
    assert_eq!(last.description, "null");

    // Titles follow base, base1, base2, ...
    let titles: Vec<String> = visited
        .iter()
        .map(|id| provider.playlist(id).unwrap().title)
        .collect();
    assert_eq!(titles, vec!["T", "T1", "T2"]);
}

#[tokio::test]
async fn test_payload_at_cap_boundary_is_one_playlist() {
    let provider = Arc::new(StubProvider::with_geometry(4, 10, 50));
    let cancel = CancellationToken::new();
    let payload: Vec<u8> = (0u8..10).collect();
    let fx = fixture(&payload);

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(provider.playlist_count(), 1);
    let playlist = provider.playlist(&head).unwrap();
    assert_eq!(playlist.items.len(), 10);
    assert_eq!(playlist.description, "null");
}

#[tokio::test]
async fn test_large_payload_splits_at_cap() {
    let provider = Arc::new(StubProvider::spotify_caps());
    let cancel = CancellationToken::new();
    let payload: Vec<u8> = (0..10_050).map(|i| (i % 251) as u8).collect();
    let fx = fixture(&payload);

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .unwrap();

    let ids = provider.playlist_ids_in_order();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], head);

    let first = provider.playlist(&ids[0]).unwrap();
    let second = provider.playlist(&ids[1]).unwrap();
    assert_eq!(first.items.len(), 10_000);
    assert_eq!(second.items.len(), 50);
    assert_eq!(first.description, ids[1]);
    assert_eq!(second.description, "null");

    // 100 full appends for the first playlist plus one for the tail
    assert_eq!(provider.append_calls(), 101);

    read_chain(provider, &head, &fx.output, "pw", Some(&fx.vault), &cancel)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&fx.output).unwrap(), payload);
}

#[tokio::test]
async fn test_empty_input_writes_vault_only() {
    let provider = Arc::new(StubProvider::spotify_caps());
    let cancel = CancellationToken::new();
    let fx = fixture(b"");

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap();

    assert!(head.is_none());
    assert_eq!(provider.playlist_count(), 0);
    assert!(fx.vault.exists());
}

#[tokio::test]
async fn test_unknown_id_aborts_read_without_partial_garbage() {
    let provider = Arc::new(StubProvider::with_geometry(4, 10, 50));
    let cancel = CancellationToken::new();
    let payload: Vec<u8> = (0u8..30).collect();
    let fx = fixture(&payload);

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .unwrap();

    // Rebuilding the codebook under a different password yields a map
    // that knows none of the chain's ids.
    let err = read_chain(provider, &head, &fx.output, "wrong", None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }));

    // Nothing past the last committed write; here, nothing at all
    assert_eq!(std::fs::metadata(&fx.output).unwrap().len(), 0);
}

#[tokio::test]
async fn test_read_is_idempotent_on_output() {
    let provider = Arc::new(StubProvider::with_geometry(4, 10, 50));
    let cancel = CancellationToken::new();
    let payload: Vec<u8> = (0u8..25).collect();
    let fx = fixture(&payload);

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .unwrap();

    read_chain(
        provider.clone(),
        &head,
        &fx.output,
        "pw",
        Some(&fx.vault),
        &cancel,
    )
    .await
    .unwrap();
    let first = std::fs::read(&fx.output).unwrap();

    read_chain(provider, &head, &fx.output, "pw", Some(&fx.vault), &cancel)
        .await
        .unwrap();
    let second = std::fs::read(&fx.output).unwrap();

    assert_eq!(first, payload);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_terminal_append_failure_abandons_playlist_not_chain() {
    let provider = Arc::new(StubProvider::with_geometry(4, 10, 50));
    let cancel = CancellationToken::new();
    let payload: Vec<u8> = (0u8..30).collect();
    let fx = fixture(&payload);

    // Playlist ids are deterministic: the second one will be pl-1
    provider.fail_append_for("pl-1");

    let head = write_file(provider.clone(), &fx.input, "pw", "T", &fx.vault, &cancel)
        .await
        .unwrap()
        .unwrap();

    // The chain is still complete and walkable
    let mut visited = 0;
    let mut current = Some(head);
    while let Some(id) = current {
        visited += 1;
        current = chain_next(&provider.playlist(&id).unwrap().description);
    }
    assert_eq!(visited, 3);

    // The scripted playlist lost its first chunk's append and was
    // abandoned; the others are intact
    assert!(provider.playlist("pl-1").unwrap().items.is_empty());
    assert_eq!(provider.playlist("pl-0").unwrap().items.len(), 10);
    assert_eq!(provider.playlist("pl-2").unwrap().items.len(), 10);
}
