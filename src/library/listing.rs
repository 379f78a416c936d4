//! UI-facing listing cache.
//!
//! The coordinator publishes a complete, immutable snapshot after each pass;
//! readers load the current snapshot without taking a lock and therefore see
//! either the previous or the new listing, never a mix of both.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::ListingSettings;
use crate::domain::Category;

use super::store::{scan_listing, ContentLayout};

/// Asset names per category at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSnapshot {
    entries: BTreeMap<Category, Vec<String>>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl ListingSnapshot {
    pub fn new(entries: BTreeMap<Category, Vec<String>>) -> Self {
        Self {
            entries,
            refreshed_at: Some(Utc::now()),
        }
    }

    /// Scan every category root.
    ///
    /// A root that cannot be read is listed as empty.
    pub async fn scan(layout: &ContentLayout, settings: &ListingSettings) -> Self {
        let mut entries = BTreeMap::new();

        for category in Category::ALL {
            let root = layout.root(category);
            let names = match scan_listing(root, settings.extensions(category)).await {
                Ok(names) => names,
                Err(e) => {
                    warn!(%category, root = %root.display(), error = %e, "Failed to scan content directory");
                    Vec::new()
                }
            };
            entries.insert(category, names);
        }

        Self::new(entries)
    }

    /// Asset names of a category, in listing order
    pub fn get(&self, category: Category) -> &[String] {
        self.entries
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    /// When the snapshot was taken (None for the initial empty snapshot)
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}

/// Atomically swapped pointer to the current snapshot
#[derive(Debug)]
pub struct ListingCache {
    current: ArcSwap<ListingSnapshot>,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingCache {
    /// Create a cache holding an empty snapshot
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ListingSnapshot::default()),
        }
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<ListingSnapshot> {
        self.current.load_full()
    }

    /// Asset names of one category from the current snapshot
    pub fn current_listing(&self, category: Category) -> Vec<String> {
        self.current.load().get(category).to_vec()
    }

    /// Replace the current snapshot
    pub fn publish(&self, snapshot: ListingSnapshot) {
        self.current.store(Arc::new(snapshot));
    }
}
