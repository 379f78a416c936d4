//! Remote manifest retrieval and parsing.
//!
//! The manifest is a JSON array of records:
//!
//! ```json
//! [
//!   { "name": "algebra", "type": "book", "url": "https://example.org/algebra.pdf" },
//!   { "name": "civics-101", "type": "video", "url": "https://youtu.be/abc" }
//! ]
//! ```
//!
//! A body that is not an array fails the whole fetch. Individual records that
//! are malformed are rejected one by one so they never block valid entries.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::domain::item::validate_name;
use crate::domain::{Category, ContentItem, SyncError};

/// Items parsed from one fetch, in manifest order
#[derive(Debug, Clone, Default)]
pub struct ManifestSnapshot {
    pub items: Vec<ContentItem>,

    /// Records that were skipped (`SyncError::RecordInvalid`)
    pub rejected: Vec<SyncError>,
}

impl ManifestSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Raw record shape; extra fields are ignored
#[derive(Debug, Deserialize)]
struct RawRecord {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
}

fn invalid(index: usize, reason: impl Into<String>) -> SyncError {
    SyncError::RecordInvalid {
        index,
        reason: reason.into(),
    }
}

fn parse_record(index: usize, value: serde_json::Value) -> Result<ContentItem, SyncError> {
    let raw: RawRecord = serde_json::from_value(value)
        .map_err(|e| invalid(index, format!("not a manifest record: {}", e)))?;

    let name = raw.name.ok_or_else(|| invalid(index, "missing 'name'"))?;
    validate_name(&name).map_err(|reason| invalid(index, reason))?;

    let kind = raw.kind.ok_or_else(|| invalid(index, "missing 'type'"))?;
    let category = Category::from_manifest_type(&kind)
        .ok_or_else(|| invalid(index, format!("unknown type '{}'", kind)))?;

    let raw_url = raw.url.ok_or_else(|| invalid(index, "missing 'url'"))?;
    let source_url = Url::parse(raw_url.trim())
        .map_err(|e| invalid(index, format!("invalid url '{}': {}", raw_url, e)))?;
    if !matches!(source_url.scheme(), "http" | "https") {
        return Err(invalid(
            index,
            format!("unsupported url scheme '{}'", source_url.scheme()),
        ));
    }

    Ok(ContentItem::new(name, category, source_url))
}

/// Parse a manifest body
pub fn parse_manifest(body: &str) -> Result<ManifestSnapshot, SyncError> {
    let records: Vec<serde_json::Value> = serde_json::from_str(body)
        .map_err(|e| SyncError::ManifestFormat(e.to_string()))?;

    let mut snapshot = ManifestSnapshot::default();
    for (index, value) in records.into_iter().enumerate() {
        match parse_record(index, value) {
            Ok(item) => snapshot.items.push(item),
            Err(e) => {
                warn!(error = %e, "Skipping manifest record");
                snapshot.rejected.push(e);
            }
        }
    }

    Ok(snapshot)
}

/// Fetches the manifest over HTTP
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    client: reqwest::Client,
}

impl ManifestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch and parse the manifest with a single bounded request
    pub async fn fetch(
        &self,
        source_url: &str,
        timeout: Duration,
    ) -> Result<ManifestSnapshot, SyncError> {
        let network = |e: reqwest::Error| {
            if e.is_timeout() {
                SyncError::Network(format!("manifest request timed out after {:?}", timeout))
            } else {
                SyncError::Network(e.to_string())
            }
        };

        let response = self
            .client
            .get(source_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Network(format!(
                "manifest request returned HTTP {}",
                status
            )));
        }

        let body = response.text().await.map_err(network)?;
        let snapshot = parse_manifest(&body)?;
        debug!(
            items = snapshot.items.len(),
            rejected = snapshot.rejected.len(),
            "Fetched manifest"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_manifest() {
        let body = r#"[
            {"name": "algebra", "type": "book", "url": "https://x/algebra.pdf", "hash": "abc"},
            {"name": "civics-101", "type": "videos", "url": "https://youtu.be/xyz"}
        ]"#;

        let snapshot = parse_manifest(body).unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.rejected.is_empty());

        assert_eq!(snapshot.items[0].name, "algebra");
        assert_eq!(snapshot.items[0].category, Category::Book);
        assert_eq!(snapshot.items[1].category, Category::Video);
    }

    #[test]
    fn test_malformed_records_are_skipped_individually() {
        let body = r#"[
            {"name": "algebra", "type": "book", "url": "https://x/algebra.pdf"},
            {"type": "book", "url": "https://x/nameless.pdf"},
            {"name": "podcast", "type": "audio", "url": "https://x/p.mp3"},
            {"name": "relative", "type": "book", "url": "/files/r.pdf"},
            {"name": "../escape", "type": "book", "url": "https://x/e.pdf"},
            {"name": "", "type": "video", "url": "https://x/v.mp4"},
            42,
            {"name": "geometry", "type": "book", "url": "https://x/geometry.pdf"}
        ]"#;

        let snapshot = parse_manifest(body).unwrap();

        let names: Vec<&str> = snapshot.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["algebra", "geometry"]);
        assert_eq!(snapshot.rejected.len(), 6);
        assert!(snapshot
            .rejected
            .iter()
            .all(|e| matches!(e, SyncError::RecordInvalid { .. })));
        assert_eq!(
            snapshot.rejected[1],
            SyncError::RecordInvalid {
                index: 2,
                reason: "unknown type 'audio'".to_string()
            }
        );
    }

    #[test]
    fn test_unparsable_envelope() {
        assert!(matches!(
            parse_manifest("<html>oops</html>"),
            Err(SyncError::ManifestFormat(_))
        ));
        assert!(matches!(
            parse_manifest(r#"{"items": []}"#),
            Err(SyncError::ManifestFormat(_))
        ));
    }

    #[test]
    fn test_empty_manifest() {
        let snapshot = parse_manifest("[]").unwrap();
        assert!(snapshot.is_empty());
    }
}
