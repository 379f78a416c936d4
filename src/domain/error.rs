//! Failure taxonomy for synchronization passes.
//!
//! Every error is absorbed by the coordinator: run-level errors abort the
//! current pass, item-level errors are recorded and the pass moves on.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Errors produced while synchronizing content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Connectivity failure or timeout while reaching the manifest
    #[error("Network error: {0}")]
    Network(String),

    /// The manifest envelope could not be parsed
    #[error("Invalid manifest: {0}")]
    ManifestFormat(String),

    /// One manifest record is malformed
    #[error("Invalid manifest record #{index}: {reason}")]
    RecordInvalid { index: usize, reason: String },

    /// Streaming transfer failed
    #[error("Download failed: {0}")]
    Download(String),

    /// External extraction tool failed or was blocked upstream
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionFailure),

    /// Directory creation, staging or rename failed
    #[error("Filesystem error at {}: {message}", path.display())]
    Filesystem { path: PathBuf, message: String },
}

impl SyncError {
    pub fn filesystem(path: &Path, err: impl Display) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Whether this error ends the whole pass rather than a single item
    pub fn aborts_run(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ManifestFormat(_))
    }

    /// Whether this error points at a misconfigured environment
    pub fn is_environmental(&self) -> bool {
        matches!(self, Self::Filesystem { .. })
    }
}

/// Why an extraction invocation did not produce a file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("extraction tool not available: {0}")]
    ToolMissing(String),

    /// Rate limiting or anti-automation response; not retried within the pass
    #[error("blocked by upstream: {0}")]
    Blocked(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("tool exited with code {code}: {stderr}")]
    Exited { code: i32, stderr: String },

    #[error("no output file named '{0}.*' was produced")]
    NoOutput(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ExtractionFailure {
    /// Classify a failed tool exit by its stderr
    pub fn from_exit(code: i32, stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let blocked = lower.contains("http error 429")
            || lower.contains("too many requests")
            || lower.contains("sign in to confirm")
            || lower.contains("not a bot")
            || lower.contains("http error 403");

        let stderr = stderr.trim().to_string();
        if blocked {
            Self::Blocked(stderr)
        } else {
            Self::Exited { code, stderr }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_level_errors() {
        assert!(SyncError::Network("down".into()).aborts_run());
        assert!(SyncError::ManifestFormat("not json".into()).aborts_run());
        assert!(!SyncError::Download("reset".into()).aborts_run());
        assert!(!SyncError::Extraction(ExtractionFailure::NoOutput("a".into())).aborts_run());
    }

    #[test]
    fn test_filesystem_is_environmental() {
        let err = SyncError::filesystem(Path::new("/content/books"), "permission denied");
        assert!(err.is_environmental());
        assert_eq!(
            err.to_string(),
            "Filesystem error at /content/books: permission denied"
        );
    }

    #[test]
    fn test_blocked_detection() {
        let failure = ExtractionFailure::from_exit(
            1,
            "ERROR: [youtube] abc: Sign in to confirm you're not a bot\n",
        );
        assert!(matches!(failure, ExtractionFailure::Blocked(_)));

        let failure = ExtractionFailure::from_exit(1, "ERROR: HTTP Error 429: Too Many Requests");
        assert!(matches!(failure, ExtractionFailure::Blocked(_)));

        let failure = ExtractionFailure::from_exit(2, "ERROR: Unsupported URL");
        assert_eq!(
            failure,
            ExtractionFailure::Exited {
                code: 2,
                stderr: "ERROR: Unsupported URL".to_string()
            }
        );
    }
}
