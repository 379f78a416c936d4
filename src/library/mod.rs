//! Local content library.
//!
//! Committed assets live in one directory per category; the UI reads them
//! through the listing cache.
//!
//! # Storage Layout
//!
//! ```text
//! <content>/
//! ├── books/
//! │   ├── algebra.pdf
//! │   └── .geometry.x7Qa.part    # in-flight transfer, never listed
//! └── videos/
//!     ├── civics-101.mp4         # extension chosen by the extraction tool
//!     └── .extract-Zt2c/         # extraction staging directory
//! <home>/
//! └── deleted_content.json       # items the user removed
//! ```

pub mod deleted;
pub mod listing;
pub mod store;

pub use deleted::{DeletedContent, DeletedContentTracker};
pub use listing::{ListingCache, ListingSnapshot};
pub use store::{AssetName, ContentLayout, StagedFile};
