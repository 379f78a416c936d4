//! kiosk-sync - Content synchronization engine for offline kiosks
//!
//! Keeps a local content store in step with a remote manifest so a kiosk UI
//! can browse books and videos without a network connection.
//!
//! # Architecture
//!
//! One background worker runs synchronization passes; the UI only ever
//! touches two things:
//! - An immutable listing snapshot, swapped atomically after each pass
//! - A non-blocking trigger that requests an on-demand pass
//!
//! Transfers are staged in hidden files and renamed into place on success,
//! so the listing never shows a partial asset.
//!
//! # Modules
//!
//! - `adapters`: Download strategies (streaming HTTP, yt-dlp extraction)
//! - `core`: Manifest fetching, classification, the coordinator
//! - `domain`: Data structures (ContentItem, SyncRun, SyncError)
//! - `library`: Content store, listing cache, deleted-content tracker
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the background worker
//! KIOSK_SOURCE_URL=https://example.org/manifest.json kiosk-sync daemon
//!
//! # One pass with the on-demand timeouts
//! kiosk-sync sync --on-demand
//!
//! # What the UI would show
//! kiosk-sync list video
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{Extractor, YtDlpExtractor};
pub use config::ResolvedConfig;
pub use crate::core::{Coordinator, SyncHandle, SyncTrigger};
pub use domain::{Category, ContentItem, ItemOutcome, SyncError, SyncRun, Trigger};
pub use library::{DeletedContentTracker, ListingCache, ListingSnapshot};
