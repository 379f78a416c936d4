//! Domain types for the synchronization engine.
//!
//! This module contains the core data structures:
//! - Item: Manifest entries and their content category
//! - Run: A single synchronization pass and its per-item outcomes
//! - Error: The failure taxonomy shared by every engine component

pub mod error;
pub mod item;
pub mod run;

// Re-export commonly used types
pub use error::{ExtractionFailure, SyncError};
pub use item::{Category, ContentItem};
pub use run::{ItemOutcome, ItemReport, SkipReason, SyncRun, Trigger};
