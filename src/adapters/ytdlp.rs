//! yt-dlp extractor.
//!
//! Spawns the `yt-dlp` CLI with a bounded wait. The child is killed if the
//! wait is abandoned.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::Extractor;
use crate::config::ExtractionSettings;
use crate::domain::ExtractionFailure;
use crate::library::store::find_by_stem;

/// Socket timeout passed to the tool, independent of the overall deadline
const SOCKET_TIMEOUT_SECS: u64 = 30;

/// Extractor backed by the yt-dlp CLI
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    /// Path to the yt-dlp binary (default: "yt-dlp")
    binary_path: String,

    /// Highest video height requested
    max_height: u32,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::from_settings(&ExtractionSettings::default())
    }
}

impl YtDlpExtractor {
    pub fn new(binary_path: impl Into<String>, max_height: u32) -> Self {
        Self {
            binary_path: binary_path.into(),
            max_height,
        }
    }

    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self::new(settings.binary.clone(), settings.max_height)
    }

    /// Command-line arguments for one invocation
    fn build_args(&self, url: &str, output_dir: &Path, base_name: &str) -> Vec<String> {
        // '%' starts an output-template field
        let template = output_dir.join(format!("{}.%(ext)s", base_name.replace('%', "%%")));
        let format = format!(
            "bestvideo[height<={h}]+bestaudio/best[height<={h}]",
            h = self.max_height
        );

        vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "-f".to_string(),
            format,
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--socket-timeout".to_string(),
            SOCKET_TIMEOUT_SECS.to_string(),
            "--retries".to_string(),
            "2".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }

    /// Check that the binary runs
    pub async fn health_check(&self) -> Result<String> {
        let output = Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("Failed to run {} --version", self.binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} health check failed: {}", self.binary_path, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        url: &str,
        output_dir: &Path,
        base_name: &str,
        step_timeout: Duration,
    ) -> Result<PathBuf, ExtractionFailure> {
        let args = self.build_args(url, output_dir, base_name);
        debug!(binary = %self.binary_path, url, "Spawning extractor");

        let child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExtractionFailure::ToolMissing(format!(
                    "'{}' not found in PATH",
                    self.binary_path
                )),
                _ => ExtractionFailure::Io(e.to_string()),
            })?;

        let output = timeout(step_timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractionFailure::TimedOut(step_timeout))?
            .map_err(|e| ExtractionFailure::Io(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionFailure::from_exit(
                output.status.code().unwrap_or(-1),
                &stderr,
            ));
        }

        find_by_stem(output_dir, base_name)
            .await
            .map_err(|e| ExtractionFailure::Io(e.to_string()))?
            .ok_or_else(|| ExtractionFailure::NoOutput(base_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let extractor = YtDlpExtractor::new("yt-dlp", 480);
        let args = extractor.build_args(
            "https://youtu.be/abc",
            Path::new("/content/videos/.extract-1"),
            "civics 100%",
        );

        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"bestvideo[height<=480]+bestaudio/best[height<=480]".to_string()));
        assert!(args.contains(&"/content/videos/.extract-1/civics 100%%.%(ext)s".to_string()));
        // URL always comes last, after the option terminator
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let extractor = YtDlpExtractor::new("kiosk-sync-no-such-binary", 720);
        let temp = tempfile::TempDir::new().unwrap();

        let result = extractor
            .extract("https://youtu.be/abc", temp.path(), "civics", Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(ExtractionFailure::ToolMissing(_))));
    }

    #[tokio::test]
    async fn test_health_check_reports_missing_binary() {
        let extractor = YtDlpExtractor::new("kiosk-sync-no-such-binary", 720);
        let err = extractor.health_check().await.unwrap_err();
        assert!(err.to_string().contains("kiosk-sync-no-such-binary"));
    }

    #[test]
    fn test_from_settings() {
        let extractor = YtDlpExtractor::default();
        assert_eq!(extractor.name(), "yt-dlp");
        assert_eq!(extractor.max_height, 720);
    }
}
