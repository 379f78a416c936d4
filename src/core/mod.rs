//! Core synchronization logic.
//!
//! This module contains:
//! - Manifest: remote manifest retrieval and parsing
//! - Classifier: destination root and download strategy per item
//! - Limits: single-flight guard and extraction pacing
//! - Coordinator: run lifecycle, timer and on-demand triggers

pub mod classifier;
pub mod coordinator;
pub mod limits;
pub mod manifest;

// Re-export commonly used types
pub use classifier::{Classification, Classifier, Strategy};
pub use coordinator::{Coordinator, SyncHandle, SyncTrigger};
pub use limits::{ExtractionPacer, SingleFlight, SingleFlightPermit};
pub use manifest::{parse_manifest, ManifestFetcher, ManifestSnapshot};
