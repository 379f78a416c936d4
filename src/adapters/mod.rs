//! Download strategies and the external systems behind them.
//!
//! - `http`: streaming direct downloads and the connectivity probe
//! - `extractor`: paced extraction downloads into the content store
//! - `ytdlp`: the production `Extractor`, backed by the yt-dlp CLI

pub mod extractor;
pub mod http;
pub mod ytdlp;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ExtractionFailure;

pub use extractor::ExtractionDownloader;
pub use http::{http_client, HttpDownloader, Transfer};
pub use ytdlp::YtDlpExtractor;

/// External capability that resolves a media page into a local file.
///
/// The tool picks the final extension, so callers only know the base name
/// up front.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable extractor name
    fn name(&self) -> &str;

    /// Download `url` into `output_dir` as `<base_name>.<ext>` and return the
    /// produced file
    async fn extract(
        &self,
        url: &str,
        output_dir: &Path,
        base_name: &str,
        timeout: Duration,
    ) -> Result<PathBuf, ExtractionFailure>;
}
