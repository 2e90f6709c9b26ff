//! Integration tests for packaging a settled batch into a zip archive

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{acquirer_with, serve_bytes, serve_error, serve_slow_bytes};
use mediaproc::config::ArchiveConfig;
use mediaproc::{ArchivePackager, BlobStore, Error};
use std::io::{Cursor, Read};
use std::time::Duration;
use wiremock::MockServer;
use zip::ZipArchive;

fn image_body(seed: u8) -> Vec<u8> {
    vec![seed; 256]
}

fn packager_for(blobs: &BlobStore) -> ArchivePackager {
    ArchivePackager::new(blobs.clone(), ArchiveConfig::default())
}

/// Read an archive blob back into (entry name, entry bytes) pairs
fn unzip(blobs: &BlobStore, handle: mediaproc::BlobHandle) -> Vec<(String, Vec<u8>)> {
    let bytes = blobs.bytes(handle).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        entries.push((entry.name().to_string(), content));
    }
    entries
}

#[tokio::test]
async fn three_successes_produce_three_named_entries() {
    let server = MockServer::start().await;
    for i in 0..3u8 {
        serve_bytes(&server, &format!("/img/{i}.jpg"), image_body(i)).await;
    }

    let blobs = BlobStore::new();
    let acquirer = acquirer_with(&blobs);
    acquirer.start(
        (0..3)
            .map(|i| format!("{}/img/{i}.jpg", server.uri()))
            .collect(),
    );
    let batch = acquirer.settled().await;

    let packager = packager_for(&blobs);
    let artifact = packager.package(&batch, "My Note").await.unwrap();

    assert_eq!(artifact.filename, "My Note.zip");
    assert_eq!(artifact.entry_count, 3);
    assert!(artifact.size_bytes > 0);

    let entries = unzip(&blobs, artifact.handle);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["My Note-1.jpg", "My Note-2.jpg", "My Note-3.jpg"]);
    for (i, (_, content)) in entries.iter().enumerate() {
        assert_eq!(content.as_slice(), image_body(i as u8).as_slice());
    }
}

#[tokio::test]
async fn failed_slot_is_skipped_but_keeps_its_siblings_numbering() {
    let server = MockServer::start().await;
    serve_bytes(&server, "/img/0.jpg", image_body(0)).await;
    serve_error(&server, "/img/1.jpg", 500).await;
    serve_bytes(&server, "/img/2.jpg", image_body(2)).await;

    let blobs = BlobStore::new();
    let acquirer = acquirer_with(&blobs);
    acquirer.start(
        (0..3)
            .map(|i| format!("{}/img/{i}.jpg", server.uri()))
            .collect(),
    );
    let batch = acquirer.settled().await;
    assert_eq!(batch.fail_count(), 1);

    let packager = packager_for(&blobs);
    let artifact = packager.package(&batch, "note").await.unwrap();

    // Entry numbers follow slot positions, not a compacted sequence
    assert_eq!(artifact.entry_count, 2);
    let entries = unzip(&blobs, artifact.handle);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["note-1.jpg", "note-3.jpg"]);
}

#[tokio::test]
async fn all_failed_batch_is_rejected() {
    let server = MockServer::start().await;
    for i in 0..2u8 {
        serve_error(&server, &format!("/img/{i}.jpg"), 404).await;
    }

    let blobs = BlobStore::new();
    let acquirer = acquirer_with(&blobs);
    acquirer.start(
        (0..2)
            .map(|i| format!("{}/img/{i}.jpg", server.uri()))
            .collect(),
    );
    let batch = acquirer.settled().await;
    assert!(batch.is_settled());
    assert_eq!(batch.success_count(), 0);

    let err = packager_for(&blobs)
        .package(&batch, "note")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AllItemsFailed));
    assert_eq!(err.kind(), "all_items_failed");
    // No partial archive was registered
    assert_eq!(blobs.stats().active_handles, 0);
}

#[tokio::test]
async fn unsettled_batch_is_rejected() {
    let server = MockServer::start().await;
    serve_slow_bytes(
        &server,
        "/img/slow.jpg",
        image_body(7),
        Duration::from_millis(500),
    )
    .await;

    let blobs = BlobStore::new();
    let acquirer = acquirer_with(&blobs);
    acquirer.start(vec![format!("{}/img/slow.jpg", server.uri())]);

    let in_flight = acquirer.snapshot();
    assert!(!in_flight.is_settled());

    let err = packager_for(&blobs)
        .package(&in_flight, "early")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));

    acquirer.dispose();
}

#[tokio::test]
async fn entries_revoked_after_settlement_leave_nothing_to_archive() {
    let server = MockServer::start().await;
    serve_bytes(&server, "/img/0.jpg", image_body(0)).await;

    let blobs = BlobStore::new();
    let acquirer = acquirer_with(&blobs);
    acquirer.start(vec![format!("{}/img/0.jpg", server.uri())]);
    let batch = acquirer.settled().await;

    // The snapshot still claims success, but the bytes are gone
    blobs.revoke(batch.items[0].handle.unwrap());

    let err = packager_for(&blobs)
        .package(&batch, "stale")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AllItemsFailed));
}

#[tokio::test]
async fn disposing_the_batch_also_revokes_its_archive() {
    let server = MockServer::start().await;
    serve_bytes(&server, "/img/0.jpg", image_body(0)).await;

    let blobs = BlobStore::new();
    let acquirer = acquirer_with(&blobs);
    acquirer.start(vec![format!("{}/img/0.jpg", server.uri())]);
    let batch = acquirer.settled().await;

    let artifact = packager_for(&blobs).package(&batch, "note").await.unwrap();
    assert!(blobs.bytes(artifact.handle).is_some());

    // The archive shares the batch's scope, so one dispose releases both
    acquirer.dispose();
    assert!(blobs.bytes(artifact.handle).is_none());

    let stats = blobs.stats();
    assert_eq!(stats.created_total, stats.revoked_total);
    assert_eq!(stats.active_handles, 0);
}

#[tokio::test]
async fn job_channel_reports_terminal_counts() {
    let server = MockServer::start().await;
    serve_bytes(&server, "/img/0.jpg", image_body(0)).await;
    serve_error(&server, "/img/1.jpg", 500).await;

    let blobs = BlobStore::new();
    let acquirer = acquirer_with(&blobs);
    acquirer.start(
        (0..2)
            .map(|i| format!("{}/img/{i}.jpg", server.uri()))
            .collect(),
    );
    let batch = acquirer.settled().await;

    let packager = packager_for(&blobs);
    let rx = packager.subscribe();
    packager.package(&batch, "note").await.unwrap();

    let job = *rx.borrow();
    assert_eq!(job.processed, 2);
    assert_eq!(job.total, 2);
    assert_eq!(job.succeeded, 1);
    assert_eq!(job.failed, 1);
    assert_eq!(job.percent(), 100);
}

#[tokio::test]
async fn label_is_sanitized_into_entry_and_archive_names() {
    let server = MockServer::start().await;
    serve_bytes(&server, "/img/0.jpg", image_body(0)).await;

    let blobs = BlobStore::new();
    let acquirer = acquirer_with(&blobs);
    acquirer.start(vec![format!("{}/img/0.jpg", server.uri())]);
    let batch = acquirer.settled().await;

    let artifact = packager_for(&blobs)
        .package(&batch, "a/b: c?")
        .await
        .unwrap();
    assert_eq!(artifact.filename, "a_b_ c.zip");

    let entries = unzip(&blobs, artifact.handle);
    assert_eq!(entries[0].0, "a_b_ c-1.jpg");
}
