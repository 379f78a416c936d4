//! Item classification: destination root and download strategy.

use std::path::PathBuf;

use glob::Pattern;
use tracing::warn;
use url::Url;

use crate::domain::{ContentItem, SyncError};
use crate::library::store::{self, ContentLayout};

/// How an item is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Plain HTTP(S) stream of the file
    Direct,

    /// External tool resolves the real media URL (video hosting sites)
    Extraction,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Direct => write!(f, "direct"),
            Strategy::Extraction => write!(f, "extraction"),
        }
    }
}

/// Where an item goes and how it gets there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub destination_root: PathBuf,
    pub strategy: Strategy,
}

/// Classifies manifest items
#[derive(Debug, Clone)]
pub struct Classifier {
    layout: ContentLayout,
    extraction_hosts: Vec<Pattern>,
}

impl Classifier {
    /// Create a classifier from category roots and host glob patterns.
    ///
    /// Invalid patterns are logged and ignored.
    pub fn new(layout: ContentLayout, extraction_hosts: &[String]) -> Self {
        let extraction_hosts = extraction_hosts
            .iter()
            .filter_map(|raw| match Pattern::new(&raw.to_lowercase()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %raw, error = %e, "Ignoring invalid extraction host pattern");
                    None
                }
            })
            .collect();

        Self {
            layout,
            extraction_hosts,
        }
    }

    pub fn layout(&self) -> &ContentLayout {
        &self.layout
    }

    /// Pick the download strategy from the URL host alone
    pub fn strategy_for(&self, url: &Url) -> Strategy {
        let host = match url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return Strategy::Direct,
        };

        if self.extraction_hosts.iter().any(|p| p.matches(&host)) {
            Strategy::Extraction
        } else {
            Strategy::Direct
        }
    }

    /// Classify an item, creating its destination root if needed
    pub async fn classify(&self, item: &ContentItem) -> Result<Classification, SyncError> {
        let destination_root = self.layout.root(item.category).to_path_buf();
        store::ensure_root(&destination_root).await?;

        Ok(Classification {
            destination_root,
            strategy: self.strategy_for(&item.source_url),
        })
    }
}
