//! Canonical content paths.
//!
//! Directories come from `ResolvedConfig::category_dir` and
//! `ResolvedConfig::deleted_tracker_path`; this module holds the naming rules
//! for in-flight files that live next to committed assets.
//!
//! ## Layout
//!
//! | Location | Owner | Purpose |
//! |----------|-------|---------|
//! | `<content>/books` | sync engine | Committed book assets |
//! | `<content>/videos` | sync engine | Committed video assets |
//! | `<home>/deleted_content.json` | UI + engine | Items the user removed |

/// Prefix of in-flight files and staging directories inside a category root.
/// Listing scans skip anything starting with it.
pub const STAGING_PREFIX: &str = ".";

/// Suffix of in-flight direct downloads
pub const PARTIAL_SUFFIX: &str = ".part";

/// Characters of the item name kept in an in-flight file name, so staging
/// never needs a longer name than the committed file
pub const MAX_STAGED_STEM: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_names_are_hidden() {
        assert!(STAGING_PREFIX.starts_with('.'));
        assert!(PARTIAL_SUFFIX.starts_with('.'));
    }
}
