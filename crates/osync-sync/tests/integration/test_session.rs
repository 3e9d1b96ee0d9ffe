//! Session behavior against a mocked server

use osync_core::domain::LibraryMode;
use osync_sync::{DatabaseStatus, SyncError, SyncOutcome, SyncRequest};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, list_files, mount, write, RecordingSink};

async fn run(server: &MockServer, root: &TempDir, mode: LibraryMode) -> (SyncOutcome, RecordingSink) {
    let sink = RecordingSink::default();
    let outcome = common::client()
        .sync(
            &SyncRequest::new(server.uri(), root.path(), mode),
            &sink,
            &CancellationToken::new(),
        )
        .await;
    (outcome, sink)
}

#[tokio::test]
async fn test_lazer_sync_fetches_database_and_missing_files() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "LAZER", 1).await;
    mount(&server, "/realm", 200, "realm-bytes", 1).await;
    mount(&server, "/manifest", 200, "abcdef\nabc123", 1).await;
    mount(&server, "/file/abcdef", 200, "X", 1).await;
    mount(&server, "/file/abc123", 200, "Y", 1).await;
    let root = TempDir::new().unwrap();

    let (outcome, sink) = run(&server, &root, LibraryMode::Lazer).await;

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(report.database, DatabaseStatus::Replaced);
    assert_eq!(report.remote_count, 2);
    assert_eq!(report.to_fetch, 2);
    assert_eq!(report.fetched, 2);
    assert!(report.failures.is_empty());
    assert!(!report.requires_library_refresh);

    assert_eq!(
        list_files(root.path()),
        vec!["client.realm", "files/a/ab/abc123", "files/a/ab/abcdef"]
    );
    assert_eq!(
        std::fs::read(root.path().join("files/a/ab/abcdef")).unwrap(),
        b"X"
    );
    assert_eq!(sink.last().as_deref(), Some("Done"));
    assert!(sink.contains("Downloaded: 2 / 2"));
}

#[tokio::test]
async fn test_mode_mismatch_aborts_before_any_transfer() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "STABLE", 1).await;
    mount(&server, "/realm", 200, "realm-bytes", 0).await;
    mount(&server, "/manifest", 200, "abcdef", 0).await;
    let root = TempDir::new().unwrap();

    let (outcome, sink) = run(&server, &root, LibraryMode::Lazer).await;

    assert!(matches!(
        outcome,
        SyncOutcome::Failed {
            error: SyncError::ModeMismatch {
                remote: LibraryMode::Stable,
                local: LibraryMode::Lazer
            },
            ..
        }
    ));
    assert!(sink.last().unwrap().starts_with("Error: Mode mismatch"));
    assert!(list_files(root.path()).is_empty());
}

#[tokio::test]
async fn test_unknown_ping_answer_is_protocol_error() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "hello", 1).await;
    mount(&server, "/manifest", 200, "", 0).await;
    let root = TempDir::new().unwrap();

    let (outcome, _) = run(&server, &root, LibraryMode::Lazer).await;

    assert!(matches!(
        outcome,
        SyncOutcome::Failed {
            error: SyncError::Protocol(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_database_is_skipped() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "LAZER", 1).await;
    mount(&server, "/realm", 404, "DB not found", 1).await;
    mount(&server, "/manifest", 200, "", 1).await;
    let root = TempDir::new().unwrap();
    write(root.path(), "client.realm", b"local");

    let (outcome, sink) = run(&server, &root, LibraryMode::Lazer).await;

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(report.database, DatabaseStatus::NotOnServer);
    assert_eq!(
        std::fs::read(root.path().join("client.realm")).unwrap(),
        b"local"
    );
    assert!(sink.contains("All files already in place"));
    assert_eq!(sink.last().as_deref(), Some("Done"));
}

#[tokio::test]
async fn test_database_replacement_keeps_backup() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "LAZER", 1).await;
    mount(&server, "/realm", 200, "new-realm", 1).await;
    mount(&server, "/manifest", 200, "", 1).await;
    let root = TempDir::new().unwrap();
    write(root.path(), "client.realm", b"old-realm");
    write(root.path(), "client.realm.bak", b"ancient-realm");

    let (outcome, _) = run(&server, &root, LibraryMode::Lazer).await;

    assert!(outcome.is_success());
    assert_eq!(
        std::fs::read(root.path().join("client.realm")).unwrap(),
        b"new-realm"
    );
    assert_eq!(
        std::fs::read(root.path().join("client.realm.bak")).unwrap(),
        b"old-realm"
    );
    assert!(!root.path().join("client.realm.tmp").exists());
}

#[tokio::test]
async fn test_manifest_failure_is_terminal() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "LAZER", 1).await;
    mount(&server, "/realm", 404, "DB not found", 1).await;
    mount(&server, "/manifest", 500, "", 1).await;
    let root = TempDir::new().unwrap();

    let (outcome, sink) = run(&server, &root, LibraryMode::Lazer).await;

    assert!(matches!(
        outcome,
        SyncOutcome::Failed {
            error: SyncError::ManifestUnavailable(_),
            ..
        }
    ));
    assert!(sink.last().unwrap().starts_with("Error: "));
}

#[tokio::test]
async fn test_item_failures_do_not_stop_the_session() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "LAZER", 1).await;
    mount(&server, "/realm", 404, "DB not found", 1).await;
    mount(&server, "/manifest", 200, "aaa111\nbbb222\nccc333", 1).await;
    mount(&server, "/file/aaa111", 200, "ok", 1).await;
    mount(&server, "/file/bbb222", 500, "boom", 1).await;
    mount(&server, "/file/ccc333", 404, "File not found", 1).await;
    let root = TempDir::new().unwrap();

    let (outcome, sink) = run(&server, &root, LibraryMode::Lazer).await;

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(report.fetched, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id.as_str(), "bbb222");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id.as_str(), "ccc333");

    assert_eq!(list_files(root.path()), vec!["files/a/aa/aaa111"]);
    assert!(sink.contains("Failed bbb222"));
    assert_eq!(sink.last().as_deref(), Some("Done"));
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "LAZER", 2).await;
    mount(&server, "/realm", 404, "DB not found", 2).await;
    mount(&server, "/manifest", 200, "abcdef", 2).await;
    mount(&server, "/file/abcdef", 200, "X", 1).await;
    let root = TempDir::new().unwrap();

    let (first, _) = run(&server, &root, LibraryMode::Lazer).await;
    assert_eq!(first.report().fetched, 1);

    let (second, sink) = run(&server, &root, LibraryMode::Lazer).await;
    let SyncOutcome::Completed(report) = second else {
        panic!("expected completion, got {second:?}");
    };
    assert_eq!(report.to_fetch, 0);
    assert_eq!(report.fetched, 0);
    assert!(sink.contains("All files already in place"));
    assert_eq!(sink.last().as_deref(), Some("Done"));
}

#[tokio::test]
async fn test_stable_sync_uses_path_routes() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "STABLE", 1).await;
    mount(&server, "/realm", 200, "never", 0).await;
    mount(&server, "/manifest", 200, "Pack 1/a.osu\nPack 1/audio.mp3", 1).await;
    for (entry, body) in [("Pack 1/a.osu", "beatmap"), ("Pack 1/audio.mp3", "audio")] {
        Mock::given(method("GET"))
            .and(path("/stable-file"))
            .and(query_param("path", entry))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
    }
    let root = TempDir::new().unwrap();

    let (outcome, sink) = run(&server, &root, LibraryMode::Stable).await;

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(report.database, DatabaseStatus::NotApplicable);
    assert!(report.requires_library_refresh);
    assert_eq!(
        list_files(root.path()),
        vec!["Songs/Pack 1/a.osu", "Songs/Pack 1/audio.mp3"]
    );
    assert!(sink.contains("Refresh the song list"));
    assert_eq!(sink.last().as_deref(), Some("Done"));
}

#[tokio::test]
async fn test_traversal_entries_are_rejected_locally() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "STABLE", 1).await;
    mount(&server, "/manifest", 200, "../escape.txt\nok/map.osu", 1).await;
    Mock::given(method("GET"))
        .and(path("/stable-file"))
        .and(query_param("path", "ok/map.osu"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .expect(1)
        .mount(&server)
        .await;
    let outer = TempDir::new().unwrap();
    let root = outer.path().join("library");

    let sink = RecordingSink::default();
    let outcome = common::client()
        .sync(
            &SyncRequest::new(server.uri(), &root, LibraryMode::Stable),
            &sink,
            &CancellationToken::new(),
        )
        .await;

    let report = outcome.report();
    assert_eq!(report.fetched, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id.as_str(), "../escape.txt");
    assert!(!outer.path().join("escape.txt").exists());
    assert!(!root.join("escape.txt").exists());
    assert!(sink.contains("Created library folder"));
}

#[tokio::test]
async fn test_alias_entries_are_never_fetched_or_rewritten() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "STABLE", 2).await;
    mount(&server, "/manifest", 200, "Pack//a.osu\nPack/b.osu/\nPack/c.osu", 2).await;
    for (entry, times) in [("Pack//a.osu", 0), ("Pack/b.osu/", 0), ("Pack/c.osu", 1)] {
        Mock::given(method("GET"))
            .and(path("/stable-file"))
            .and(query_param("path", entry))
            .respond_with(ResponseTemplate::new(200).set_body_string("map"))
            .expect(times)
            .mount(&server)
            .await;
    }
    let root = TempDir::new().unwrap();

    let (first, _) = run(&server, &root, LibraryMode::Stable).await;
    assert_eq!(first.report().fetched, 1);
    assert_eq!(first.report().failures.len(), 2);

    let (second, sink) = run(&server, &root, LibraryMode::Stable).await;
    let SyncOutcome::Completed(report) = second else {
        panic!("expected completion, got {second:?}");
    };
    assert_eq!(report.fetched, 0);
    assert_eq!(report.failures.len(), 2);
    let failed: Vec<String> = sink
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("Failed "))
        .collect();
    assert_eq!(failed.len(), 2);
    assert_eq!(list_files(root.path()), vec!["Songs/Pack/c.osu"]);
}

#[tokio::test]
async fn test_spawned_session_can_be_cancelled() {
    let server = MockServer::start().await;
    mount(&server, "/ping", 200, "LAZER", 1).await;
    mount(&server, "/realm", 404, "DB not found", 1).await;
    mount(&server, "/manifest", 200, "abcdef", 1).await;
    Mock::given(method("GET"))
        .and(path("/file/abcdef"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    let root = TempDir::new().unwrap();
    let sink = RecordingSink::default();

    let handle = common::client().spawn(
        SyncRequest::new(server.uri(), root.path(), LibraryMode::Lazer),
        std::sync::Arc::new(sink.clone()),
    );
    while !sink.contains("Files to download") {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    handle.cancel();
    let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), handle.join())
        .await
        .expect("cancellation should end the session promptly");

    let SyncOutcome::Cancelled(report) = outcome else {
        panic!("expected cancellation, got {outcome:?}");
    };
    assert_eq!(report.fetched, 0);
    assert_eq!(sink.last().as_deref(), Some("Stopped by user"));
    assert!(!root.path().join("files/a/ab/abcdef").exists());
}
