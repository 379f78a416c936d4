//! Content items as described by the remote manifest.

use serde::{Deserialize, Serialize};
use url::Url;

/// Category of a content item, which decides its destination root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Books (PDF, EPUB, plain text...)
    Book,

    /// Videos
    Video,
}

impl Category {
    /// Every category, in listing order
    pub const ALL: [Category; 2] = [Category::Book, Category::Video];

    /// Key used in config files and the deleted-content tracker
    pub fn key(&self) -> &'static str {
        match self {
            Category::Book => "book",
            Category::Video => "video",
        }
    }

    /// Default subdirectory under the content root
    pub fn default_dir(&self) -> &'static str {
        match self {
            Category::Book => "books",
            Category::Video => "videos",
        }
    }

    /// Map a manifest `type` value onto a category
    pub fn from_manifest_type(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "book" | "books" => Some(Category::Book),
            "video" | "videos" => Some(Category::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Self::from_manifest_type(s).ok_or_else(|| anyhow::anyhow!("Unknown category: {}", s))
    }
}

/// Check that an item name is usable as a file name.
///
/// It must stay inside its category root and must not collide with hidden
/// staging files.
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("empty name");
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err("name contains a path separator");
    }
    if name.starts_with('.') {
        return Err("name starts with a dot");
    }
    Ok(())
}

/// One validated manifest entry.
///
/// Items live for a single sync pass and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// Display name, also the base filename on disk
    pub name: String,

    /// Destination category
    pub category: Category,

    /// Absolute source URL
    pub source_url: Url,
}

impl ContentItem {
    pub fn new(name: impl Into<String>, category: Category, source_url: Url) -> Self {
        Self {
            name: name.into(),
            category,
            source_url,
        }
    }

    /// Lowercased host of the source URL, if any
    pub fn host(&self) -> Option<String> {
        self.source_url.host_str().map(|h| h.to_lowercase())
    }
}
