//! Full round trips between a real server and the client

use std::net::SocketAddr;
use std::path::Path;

use osync_core::config::ServerConfig;
use osync_core::domain::LibraryMode;
use osync_server::{ServerHandle, SyncServer};
use osync_sync::{DatabaseStatus, SyncOutcome, SyncRequest};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::{self, list_files, write, RecordingSink};

async fn start(root: &Path, mode: LibraryMode) -> ServerHandle {
    let loopback: SocketAddr = "127.0.0.1:0".parse().unwrap();
    SyncServer::new(root.to_path_buf(), mode, &ServerConfig::default())
        .with_addr(loopback)
        .start()
        .await
        .unwrap()
}

async fn sync(handle: &ServerHandle, root: &Path, mode: LibraryMode) -> (SyncOutcome, RecordingSink) {
    let sink = RecordingSink::default();
    let endpoint = handle.local_addr().to_string();
    let outcome = common::client()
        .sync(
            &SyncRequest::new(endpoint, root, mode),
            &sink,
            &CancellationToken::new(),
        )
        .await;
    (outcome, sink)
}

#[tokio::test]
async fn test_single_file_without_database() {
    let server_root = TempDir::new().unwrap();
    write(server_root.path(), "files/a/ab/abcdef", b"X");
    let client_root = TempDir::new().unwrap();
    let mut server = start(server_root.path(), LibraryMode::Lazer).await;

    let (outcome, sink) = sync(&server, client_root.path(), LibraryMode::Lazer).await;

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(report.database, DatabaseStatus::NotOnServer);
    assert_eq!(list_files(client_root.path()), vec!["files/a/ab/abcdef"]);
    assert_eq!(
        std::fs::read(client_root.path().join("files/a/ab/abcdef")).unwrap(),
        b"X"
    );
    assert_eq!(sink.last().as_deref(), Some("Done"));

    server.stop().await;
}

#[tokio::test]
async fn test_lazer_library_mirrors_server() {
    let server_root = TempDir::new().unwrap();
    write(server_root.path(), "client.realm", b"server-db");
    write(server_root.path(), "files/1/12/123456", b"one");
    write(server_root.path(), "files/f/fe/fedcba", b"two");
    write(server_root.path(), "files/9/98/987654", &vec![7u8; 256 * 1024]);
    let client_root = TempDir::new().unwrap();
    write(client_root.path(), "client.realm", b"client-db");
    write(client_root.path(), "files/1/12/123456", b"one");
    let mut server = start(server_root.path(), LibraryMode::Lazer).await;

    let (outcome, _) = sync(&server, client_root.path(), LibraryMode::Lazer).await;

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(report.remote_count, 3);
    assert_eq!(report.local_count, 1);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.database, DatabaseStatus::Replaced);
    assert_eq!(
        list_files(client_root.path()),
        vec![
            "client.realm",
            "client.realm.bak",
            "files/1/12/123456",
            "files/9/98/987654",
            "files/f/fe/fedcba",
        ]
    );
    assert_eq!(
        std::fs::read(client_root.path().join("files/9/98/987654"))
            .unwrap()
            .len(),
        256 * 1024
    );
    assert_eq!(
        std::fs::read(client_root.path().join("client.realm.bak")).unwrap(),
        b"client-db"
    );

    let (again, _) = sync(&server, client_root.path(), LibraryMode::Lazer).await;
    assert_eq!(again.report().to_fetch, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_stable_library_with_spaces_and_unicode() {
    let server_root = TempDir::new().unwrap();
    write(server_root.path(), "Songs/123 Artist - Title/map [Hard].osu", b"osu");
    write(server_root.path(), "Songs/456 Ärtist/audio.mp3", b"mp3");
    let client_root = TempDir::new().unwrap();
    let mut server = start(server_root.path(), LibraryMode::Stable).await;

    let (outcome, sink) = sync(&server, client_root.path(), LibraryMode::Stable).await;

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(report.fetched, 2);
    assert!(report.requires_library_refresh);
    assert_eq!(
        list_files(client_root.path()),
        vec![
            "Songs/123 Artist - Title/map [Hard].osu",
            "Songs/456 Ärtist/audio.mp3",
        ]
    );
    assert!(sink.contains("Refresh the song list"));

    server.stop().await;
}

#[tokio::test]
async fn test_mode_mismatch_between_real_peers() {
    let server_root = TempDir::new().unwrap();
    write(server_root.path(), "Songs/1 a/x.osu", b"x");
    let client_root = TempDir::new().unwrap();
    let mut server = start(server_root.path(), LibraryMode::Stable).await;

    let (outcome, _) = sync(&server, client_root.path(), LibraryMode::Lazer).await;

    assert!(matches!(outcome, SyncOutcome::Failed { .. }));
    assert!(list_files(client_root.path()).is_empty());

    server.stop().await;
}
