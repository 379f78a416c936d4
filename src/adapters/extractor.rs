//! Extraction downloads.
//!
//! The tool writes into a hidden staging directory inside the category root.
//! Only the finished file is renamed into the root itself, so a killed or
//! timed-out invocation never leaves a visible partial asset.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::Extractor;
use crate::core::limits::ExtractionPacer;
use crate::domain::{ExtractionFailure, SyncError};
use crate::library::store;

/// Paced downloader delegating to an `Extractor`
pub struct ExtractionDownloader {
    extractor: Arc<dyn Extractor>,
    pacer: Mutex<ExtractionPacer>,
}

impl ExtractionDownloader {
    pub fn new(extractor: Arc<dyn Extractor>, delay: Duration) -> Self {
        Self {
            extractor,
            pacer: Mutex::new(ExtractionPacer::new(delay)),
        }
    }

    /// Fetch `url` into `root` as `<base_name>.<ext>`.
    ///
    /// Waits out the pacing delay first. `timeout` bounds the tool invocation
    /// alone.
    pub async fn download(
        &self,
        url: &str,
        root: &Path,
        base_name: &str,
        timeout: Duration,
    ) -> Result<PathBuf, SyncError> {
        let staging = store::staging_dir(root)?;

        self.pacer.lock().await.pace().await;
        info!(extractor = self.extractor.name(), url, name = base_name, "Starting extraction");

        let produced = tokio::time::timeout(
            timeout,
            self.extractor.extract(url, staging.path(), base_name, timeout),
        )
        .await
        .map_err(|_| ExtractionFailure::TimedOut(timeout))??;

        if !tokio::fs::metadata(&produced)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Err(ExtractionFailure::NoOutput(base_name.to_string()).into());
        }

        let file_name = produced
            .file_name()
            .ok_or_else(|| ExtractionFailure::NoOutput(base_name.to_string()))?;
        let final_path = root.join(file_name);

        tokio::fs::rename(&produced, &final_path)
            .await
            .map_err(|e| SyncError::filesystem(&final_path, e))?;
        debug!(path = %final_path.display(), "Extraction committed");

        // `staging` is removed on drop along with any leftovers
        Ok(final_path)
    }
}
