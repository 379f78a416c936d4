//! Local content store and existence tracking.
//!
//! Assets live directly under a category root, named after the manifest
//! `name`. Transfers are staged in hidden files next to their destination
//! and renamed into place once complete, so neither the existence checks nor
//! the listing scans ever see a partial file.

use std::path::{Path, PathBuf};

use tempfile::{TempDir, TempPath};
use tokio::fs;
use url::Url;

use crate::config::paths::{MAX_STAGED_STEM, PARTIAL_SUFFIX, STAGING_PREFIX};
use crate::config::ResolvedConfig;
use crate::core::classifier::Strategy;
use crate::domain::{Category, ContentItem, SyncError};

/// Category roots on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    books: PathBuf,
    videos: PathBuf,
}

impl ContentLayout {
    pub fn new(books: impl Into<PathBuf>, videos: impl Into<PathBuf>) -> Self {
        Self {
            books: books.into(),
            videos: videos.into(),
        }
    }

    /// Default category directories under `content_root`
    pub fn under(content_root: &Path) -> Self {
        Self::new(
            content_root.join(Category::Book.default_dir()),
            content_root.join(Category::Video.default_dir()),
        )
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(
            config.category_dir(Category::Book),
            config.category_dir(Category::Video),
        )
    }

    pub fn root(&self, category: Category) -> &Path {
        match category {
            Category::Book => &self.books,
            Category::Video => &self.videos,
        }
    }
}

/// The on-disk name an item is expected to have
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetName {
    /// Full file name is known up front
    Exact(String),

    /// Only the base name is known; the extension is decided later
    Stem(String),
}

/// Extension implied by the last path segment of a URL (lowercased)
pub fn implied_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if is_plausible_extension(ext) {
        Some(ext.to_lowercase())
    } else {
        None
    }
}

fn is_plausible_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extension for a response Content-Type, used when the URL implies none
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let ext = match mime.as_str() {
        "application/pdf" => "pdf",
        "application/epub+zip" => "epub",
        "text/plain" => "txt",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/x-ms-wmv" => "wmv",
        "video/x-flv" => "flv",
        _ => return None,
    };
    Some(ext)
}

/// Expected file name of a directly downloaded item
pub fn asset_file_name(item: &ContentItem) -> AssetName {
    if let Some(ext) = implied_extension(&item.source_url) {
        let suffix = format!(".{}", ext);
        if item.name.to_lowercase().ends_with(&suffix) {
            return AssetName::Exact(item.name.clone());
        }
        return AssetName::Exact(format!("{}{}", item.name, suffix));
    }

    let own_ext = Path::new(&item.name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| is_plausible_extension(e));
    match own_ext {
        Some(_) => AssetName::Exact(item.name.clone()),
        None => AssetName::Stem(item.name.clone()),
    }
}

/// Final file name once the response content type is known
pub fn resolve_file_name(item: &ContentItem, content_type: Option<&str>) -> String {
    match asset_file_name(item) {
        AssetName::Exact(name) => name,
        AssetName::Stem(stem) => match content_type.and_then(extension_for_content_type) {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        },
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

/// Find a committed file under `root` whose name without extension is `stem`
pub async fn find_by_stem(root: &Path, stem: &str) -> std::io::Result<Option<PathBuf>> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if is_hidden(&file_name) {
            continue;
        }

        let matches = file_name == stem
            || path
                .file_stem()
                .map(|s| s.to_string_lossy() == stem)
                .unwrap_or(false);
        if !matches {
            continue;
        }

        if entry.file_type().await?.is_file() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Decide whether an item still has to be fetched.
///
/// Presence is the only versioning signal: an item whose asset is on disk is
/// never fetched again, even if the remote content changed.
pub async fn should_download(
    item: &ContentItem,
    root: &Path,
    strategy: Strategy,
) -> Result<bool, SyncError> {
    let present = match (strategy, asset_file_name(item)) {
        (Strategy::Direct, AssetName::Exact(file_name)) => is_file(&root.join(file_name)).await,
        (Strategy::Direct, AssetName::Stem(_)) | (Strategy::Extraction, _) => {
            find_by_stem(root, &item.name)
                .await
                .map_err(|e| SyncError::filesystem(root, e))?
                .is_some()
        }
    };

    Ok(!present)
}

/// An in-flight direct download.
///
/// The file is removed on drop unless committed.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create a hidden temporary file for `name` inside `root`
pub fn stage(root: &Path, name: &str) -> Result<StagedFile, SyncError> {
    let stem: String = name.chars().take(MAX_STAGED_STEM).collect();
    let prefix = format!("{}{}.", STAGING_PREFIX, stem);
    let file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(root)
        .map_err(|e| SyncError::filesystem(root, e))?;

    Ok(StagedFile {
        path: file.into_temp_path(),
    })
}

/// Atomically move a completed transfer to its final path
pub fn commit(staged: StagedFile, final_path: &Path) -> Result<PathBuf, SyncError> {
    staged
        .path
        .persist(final_path)
        .map_err(|e| SyncError::filesystem(final_path, e.error))?;

    Ok(final_path.to_path_buf())
}

/// Create a hidden staging directory inside `root` for an extraction tool
pub fn staging_dir(root: &Path) -> Result<TempDir, SyncError> {
    tempfile::Builder::new()
        .prefix(&format!("{}extract-", STAGING_PREFIX))
        .tempdir_in(root)
        .map_err(|e| SyncError::filesystem(root, e))
}

/// Create a category root if it does not exist yet
pub async fn ensure_root(root: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(root)
        .await
        .map_err(|e| SyncError::filesystem(root, e))
}

/// Names of committed files under `root` with an allowed extension, sorted.
///
/// An empty allowlist accepts every extension.
pub async fn scan_listing(root: &Path, extensions: &[String]) -> std::io::Result<Vec<String>> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&name) || !entry.file_type().await?.is_file() {
            continue;
        }

        let allowed = extensions.is_empty()
            || Path::new(&name)
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
                .unwrap_or(false);
        if allowed {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}
