//! Tracker for content the user deleted on the kiosk.
//!
//! Deleted items stay in the manifest, so without this list the next pass
//! would download them again. The file is shared with the UI process:
//! readers take a shared lock on a sidecar lock file, writers an exclusive
//! one, and the JSON document is replaced atomically.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::Category;

/// Deleted item names keyed by category (`book`, `video`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeletedContent(BTreeMap<String, Vec<String>>);

impl DeletedContent {
    /// Whether `name` was deleted.
    ///
    /// The UI records the file names it lists (`civics-101.mp4`) while the
    /// manifest carries base names (`civics-101`), so an entry also matches
    /// by its stem.
    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.names(category).iter().any(|entry| entry_matches(entry, name))
    }

    pub fn names(&self, category: Category) -> &[String] {
        self.0
            .get(category.key())
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    fn insert(&mut self, category: Category, name: &str) -> bool {
        let names = self.0.entry(category.key().to_string()).or_default();
        if names.iter().any(|n| n == name) {
            return false;
        }
        names.push(name.to_string());
        true
    }

    /// Drop every entry matching `name`, including file names with its stem
    fn remove(&mut self, category: Category, name: &str) -> bool {
        match self.0.get_mut(category.key()) {
            Some(names) => {
                let before = names.len();
                names.retain(|entry| !entry_matches(entry, name));
                names.len() != before
            }
            None => false,
        }
    }
}

fn entry_matches(entry: &str, name: &str) -> bool {
    entry == name
        || Path::new(entry)
            .file_stem()
            .map(|stem| stem == name)
            .unwrap_or(false)
}

/// File-backed list of deleted items
#[derive(Debug, Clone)]
pub struct DeletedContentTracker {
    path: PathBuf,
}

impl DeletedContentTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())
            .with_context(|| format!("Failed to open lock file for {}", self.path.display()))
    }

    /// Read the current list.
    ///
    /// A missing file is an empty list; a corrupt file is logged and treated
    /// as empty.
    pub fn load(&self) -> Result<DeletedContent> {
        if !self.path.exists() {
            return Ok(DeletedContent::default());
        }

        let lock = self.open_lock()?;
        lock.lock_shared()
            .context("Failed to acquire shared lock on deleted-content tracker")?;
        let content = self.read_unlocked();
        lock.unlock().ok();

        content
    }

    fn read_unlocked(&self) -> Result<DeletedContent> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DeletedContent::default())
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        match serde_json::from_str(&raw) {
            Ok(content) => Ok(content),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt deleted-content tracker, ignoring");
                Ok(DeletedContent::default())
            }
        }
    }

    fn write_unlocked(&self, content: &DeletedContent) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

        let json = serde_json::to_string_pretty(content)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }

    /// Read-modify-write under the exclusive lock
    fn update(&self, f: impl FnOnce(&mut DeletedContent) -> bool) -> Result<bool> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()
            .context("Failed to acquire exclusive lock on deleted-content tracker")?;

        let result = (|| -> Result<bool> {
            let mut content = self.read_unlocked()?;
            let changed = f(&mut content);
            if changed {
                self.write_unlocked(&content)?;
            }
            Ok(changed)
        })();

        lock.unlock().ok();
        result
    }

    /// Mark an item as deleted; returns false if it already was
    pub fn mark_deleted(&self, category: Category, name: &str) -> Result<bool> {
        let changed = self.update(|c| c.insert(category, name))?;
        if changed {
            info!(%category, name, "Marked as deleted");
        }
        Ok(changed)
    }

    /// Remove an item from the deleted list so it is fetched again
    pub fn mark_restored(&self, category: Category, name: &str) -> Result<bool> {
        let changed = self.update(|c| c.remove(category, name))?;
        if changed {
            info!(%category, name, "Removed from deleted list");
        }
        Ok(changed)
    }

    /// Every deleted item, by category
    pub fn all(&self) -> Result<DeletedContent> {
        self.load()
    }

    pub fn is_deleted(&self, category: Category, name: &str) -> Result<bool> {
        Ok(self.load()?.contains(category, name))
    }

    pub fn deleted(&self, category: Category) -> Result<Vec<String>> {
        Ok(self.load()?.names(category).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tracker(temp: &TempDir) -> DeletedContentTracker {
        DeletedContentTracker::new(temp.path().join("state").join("deleted_content.json"))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let tracker = tracker(&temp);

        assert_eq!(tracker.load().unwrap(), DeletedContent::default());
        assert!(!tracker.is_deleted(Category::Book, "algebra").unwrap());
    }

    #[test]
    fn test_mark_and_restore() {
        let temp = TempDir::new().unwrap();
        let tracker = tracker(&temp);

        assert!(tracker.mark_deleted(Category::Video, "civics-101").unwrap());
        assert!(!tracker.mark_deleted(Category::Video, "civics-101").unwrap());
        assert!(tracker.is_deleted(Category::Video, "civics-101").unwrap());
        // Categories are independent
        assert!(!tracker.is_deleted(Category::Book, "civics-101").unwrap());
        assert_eq!(tracker.deleted(Category::Video).unwrap(), vec!["civics-101"]);

        assert!(tracker.mark_restored(Category::Video, "civics-101").unwrap());
        assert!(!tracker.mark_restored(Category::Video, "civics-101").unwrap());
        assert!(!tracker.is_deleted(Category::Video, "civics-101").unwrap());
    }

    #[test]
    fn test_listed_file_name_covers_manifest_name() {
        let temp = TempDir::new().unwrap();
        let tracker = tracker(&temp);

        tracker.mark_deleted(Category::Video, "civics-101.mp4").unwrap();
        assert!(tracker.is_deleted(Category::Video, "civics-101").unwrap());
        assert!(tracker.is_deleted(Category::Video, "civics-101.mp4").unwrap());
        assert!(!tracker.is_deleted(Category::Video, "civics").unwrap());

        // Restoring by manifest name clears the file-name entry
        assert!(tracker.mark_restored(Category::Video, "civics-101").unwrap());
        assert!(tracker.deleted(Category::Video).unwrap().is_empty());
    }

    #[test]
    fn test_reads_ui_written_format() {
        let temp = TempDir::new().unwrap();
        let tracker = tracker(&temp);
        fs::create_dir_all(tracker.path().parent().unwrap()).unwrap();
        fs::write(
            tracker.path(),
            r#"{ "book": ["algebra"], "video": [] }"#,
        )
        .unwrap();

        assert!(tracker.is_deleted(Category::Book, "algebra").unwrap());
        assert!(tracker.deleted(Category::Video).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let tracker = tracker(&temp);
        fs::create_dir_all(tracker.path().parent().unwrap()).unwrap();
        fs::write(tracker.path(), "not json").unwrap();

        assert_eq!(tracker.load().unwrap(), DeletedContent::default());
        // Writing recovers the file
        assert!(tracker.mark_deleted(Category::Book, "algebra").unwrap());
        assert!(tracker.is_deleted(Category::Book, "algebra").unwrap());
    }
}
