//! Shared test helpers

use std::path::Path;
use std::sync::{Arc, Mutex};

use osync_core::config::ClientConfig;
use osync_core::ports::ProgressSink;
use osync_sync::SyncClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Progress sink that keeps every line
#[derive(Debug, Default, Clone)]
pub struct RecordingSink(Arc<Mutex<Vec<String>>>);

impl ProgressSink for RecordingSink {
    fn log(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.0.lock().unwrap().last().cloned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

pub fn client() -> SyncClient {
    SyncClient::new(ClientConfig {
        concurrency: 4,
        ..ClientConfig::default()
    })
    .unwrap()
}

/// Mounts `GET {route}` answering `status` with `body`, expected `times` times.
pub async fn mount(server: &MockServer, route: &str, status: u16, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

pub fn write(root: &Path, relative: &str, bytes: &[u8]) {
    let target = root.join(relative);
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(target, bytes).unwrap();
}

/// Every regular file under `root`, as sorted `/`-separated relative paths
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    files.sort();
    files
}
