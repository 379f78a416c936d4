//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kiosk_sync::config::{ResolvedConfig, SyncSettings};
use kiosk_sync::domain::ExtractionFailure;
use kiosk_sync::Extractor;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Extractor double that records invocation start times and writes
/// `<base_name>.mp4` into the output directory
#[derive(Default)]
pub struct RecordingExtractor {
    starts: Mutex<Vec<(String, Instant)>>,
    failures: HashMap<String, ExtractionFailure>,
}

impl RecordingExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make invocations for `url` fail with `failure`
    pub fn failing(mut self, url: &str, failure: ExtractionFailure) -> Self {
        self.failures.insert(url.to_string(), failure);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.starts
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn start_times(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl Extractor for RecordingExtractor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn extract(
        &self,
        url: &str,
        output_dir: &Path,
        base_name: &str,
        _timeout: Duration,
    ) -> Result<PathBuf, ExtractionFailure> {
        self.starts
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        if let Some(failure) = self.failures.get(url) {
            return Err(failure.clone());
        }

        let path = output_dir.join(format!("{}.mp4", base_name));
        tokio::fs::write(&path, b"extracted video")
            .await
            .map_err(|e| ExtractionFailure::Io(e.to_string()))?;
        Ok(path)
    }
}

/// Config rooted at `home` pulling the manifest from `source_url`, with the
/// connectivity probe and extraction pacing switched off
pub fn config(home: &Path, source_url: impl Into<String>) -> ResolvedConfig {
    let mut config = ResolvedConfig::with_home(home);
    config.sync = SyncSettings {
        connectivity_check_url: None,
        extraction_delay: Duration::ZERO,
        ..SyncSettings::for_source(source_url)
    };
    config
}

pub fn record(name: &str, kind: &str, url: &str) -> Value {
    json!({ "name": name, "type": kind, "url": url })
}

/// Serve `records` as the manifest at `/manifest.json`
pub async fn mount_manifest(server: &MockServer, records: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(records)))
        .mount(server)
        .await;
}

/// Serve `body` at `file_path`, expecting exactly `hits` requests
pub async fn mount_file(server: &MockServer, file_path: &str, body: &[u8], hits: u64) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(hits)
        .mount(server)
        .await;
}

pub fn manifest_url(server: &MockServer) -> String {
    format!("{}/manifest.json", server.uri())
}

/// Visible file names in a directory, sorted
pub fn visible_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| !n.starts_with('.'))
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
