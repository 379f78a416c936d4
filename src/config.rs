//! Configuration for the sync engine.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (KIOSK_HOME, KIOSK_CONTENT_DIR, KIOSK_SOURCE_URL)
//! 2. Config file (.kiosk/config.yaml)
//! 3. Defaults (~/.kiosk-sync)
//!
//! Config file discovery:
//! - Searches current directory and parents for .kiosk/config.yaml
//! - `paths.home` is relative to the .kiosk/ directory, `paths.content` to
//!   the project root (the parent of .kiosk/)

pub mod paths;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::{Category, Trigger};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub content: Option<ContentConfig>,
    #[serde(default)]
    pub extraction: Option<ExtractionConfig>,
    #[serde(default)]
    pub listing: Option<ListingConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .kiosk/)
    pub home: Option<String>,
    /// Content root (relative to the project root)
    pub content: Option<String>,
    /// Category to subdirectory mapping
    #[serde(default)]
    pub categories: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentConfig {
    pub enabled: Option<bool>,
    pub source_url: Option<String>,
    pub check_interval_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub on_demand_timeout_seconds: Option<u64>,
    pub extraction_timeout_seconds: Option<u64>,
    pub on_demand_extraction_timeout_seconds: Option<u64>,
    pub extraction_delay_seconds: Option<u64>,
    pub check_connectivity: Option<bool>,
    pub connectivity_check_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionConfig {
    pub binary: Option<String>,
    pub max_height: Option<u32>,
    pub hosts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingConfig {
    pub book_extensions: Option<Vec<String>>,
    pub video_extensions: Option<Vec<String>>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Engine state directory (deleted-content tracker lives here)
    pub home: PathBuf,
    /// Root under which the category directories live
    pub content_root: PathBuf,
    /// Category key to subdirectory mapping
    pub categories: HashMap<String, String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Sync scheduling and timeouts
    pub sync: SyncSettings,
    /// External extraction tool settings
    pub extraction: ExtractionSettings,
    /// Listing filters
    pub listing: ListingSettings,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// When false the coordinator never leaves Idle
    pub enabled: bool,
    /// Manifest location
    pub source_url: Option<String>,
    pub check_interval: Duration,
    /// Per-request timeout for timer-driven passes
    pub timeout: Duration,
    /// Per-request timeout for on-demand passes
    pub on_demand_timeout: Duration,
    pub extraction_timeout: Duration,
    pub on_demand_extraction_timeout: Duration,
    /// Minimum gap between the starts of two extraction invocations
    pub extraction_delay: Duration,
    /// Probed with HEAD before each pass; None disables the probe
    pub connectivity_check_url: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            source_url: None,
            check_interval: Duration::from_secs(24 * 3600),
            timeout: Duration::from_secs(60),
            on_demand_timeout: Duration::from_secs(10),
            extraction_timeout: Duration::from_secs(1800),
            on_demand_extraction_timeout: Duration::from_secs(300),
            extraction_delay: Duration::from_secs(5),
            connectivity_check_url: Some(DEFAULT_CONNECTIVITY_URL.to_string()),
        }
    }
}

impl SyncSettings {
    /// Settings for a given manifest URL with every other value defaulted
    pub fn for_source(source_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            source_url: Some(source_url.into()),
            ..Default::default()
        }
    }

    /// Timeouts applied to the requests of a pass started by `trigger`
    pub fn timeouts(&self, trigger: Trigger) -> TimeoutProfile {
        match trigger {
            Trigger::Timer => TimeoutProfile {
                request: self.timeout,
                extraction: self.extraction_timeout,
            },
            Trigger::OnDemand => TimeoutProfile {
                request: self.on_demand_timeout,
                extraction: self.on_demand_extraction_timeout,
            },
        }
    }
}

/// Timeouts for one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutProfile {
    /// Connectivity probe, manifest fetch and each direct download
    pub request: Duration,
    /// Each extraction invocation
    pub extraction: Duration,
}

pub const DEFAULT_CONNECTIVITY_URL: &str = "https://dns.google";

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub binary: String,
    /// Highest video resolution requested from the extraction tool
    pub max_height: u32,
    /// Glob patterns for hosts that need the extraction strategy
    pub hosts: Vec<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            max_height: 720,
            hosts: default_extraction_hosts(),
        }
    }
}

fn default_extraction_hosts() -> Vec<String> {
    [
        "youtube.com",
        "*.youtube.com",
        "youtu.be",
        "youtube-nocookie.com",
        "*.youtube-nocookie.com",
        "vimeo.com",
        "*.vimeo.com",
        "dailymotion.com",
        "*.dailymotion.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub book_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            book_extensions: ["txt", "pdf", "epub", "docx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            video_extensions: ["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ListingSettings {
    /// Extensions (without dot) listed for a category
    pub fn extensions(&self, category: Category) -> &[String] {
        match category {
            Category::Book => &self.book_extensions,
            Category::Video => &self.video_extensions,
        }
    }
}

impl ResolvedConfig {
    /// Configuration rooted at `home`, with content under `home/content`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            content_root: home.join("content"),
            home,
            categories: HashMap::new(),
            config_file: None,
            sync: SyncSettings::default(),
            extraction: ExtractionSettings::default(),
            listing: ListingSettings::default(),
        }
    }

    /// Get the directory for a given category
    pub fn category_dir(&self, category: Category) -> PathBuf {
        match self.categories.get(category.key()) {
            Some(subdir) => self.content_root.join(subdir),
            None => self.content_root.join(category.default_dir()),
        }
    }

    /// Path of the deleted-content tracker file
    pub fn deleted_tracker_path(&self) -> PathBuf {
        self.home.join("deleted_content.json")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".kiosk").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

/// Build resolved settings from a parsed file (no environment overrides)
fn resolve_file(config: ConfigFile, config_path: &Path, default_home: &Path) -> ResolvedConfig {
    let kiosk_dir = config_path.parent().unwrap_or(Path::new("."));
    let base_dir = kiosk_dir.parent().unwrap_or(Path::new("."));

    let home = match config.paths.home {
        Some(ref home_path) => resolve_path(kiosk_dir, home_path),
        None => default_home.to_path_buf(),
    };

    let content_root = match config.paths.content {
        Some(ref content_path) => resolve_path(base_dir, content_path),
        None => home.join("content"),
    };

    let defaults = SyncSettings::default();
    let content = config.content.unwrap_or_default();
    let connectivity_check_url = if content.check_connectivity.unwrap_or(true) {
        content.connectivity_check_url.or(defaults.connectivity_check_url)
    } else {
        None
    };
    let sync = SyncSettings {
        enabled: content
            .enabled
            .unwrap_or_else(|| content.source_url.is_some()),
        source_url: content.source_url,
        check_interval: secs(content.check_interval_seconds, defaults.check_interval),
        timeout: secs(content.timeout_seconds, defaults.timeout),
        on_demand_timeout: secs(content.on_demand_timeout_seconds, defaults.on_demand_timeout),
        extraction_timeout: secs(content.extraction_timeout_seconds, defaults.extraction_timeout),
        on_demand_extraction_timeout: secs(
            content.on_demand_extraction_timeout_seconds,
            defaults.on_demand_extraction_timeout,
        ),
        extraction_delay: secs(content.extraction_delay_seconds, defaults.extraction_delay),
        connectivity_check_url,
    };

    let extraction_defaults = ExtractionSettings::default();
    let extraction = config.extraction.unwrap_or_default();
    let extraction = ExtractionSettings {
        binary: extraction.binary.unwrap_or(extraction_defaults.binary),
        max_height: extraction.max_height.unwrap_or(extraction_defaults.max_height),
        hosts: extraction.hosts.unwrap_or(extraction_defaults.hosts),
    };

    let listing_defaults = ListingSettings::default();
    let listing = config.listing.unwrap_or_default();
    let listing = ListingSettings {
        book_extensions: listing
            .book_extensions
            .unwrap_or(listing_defaults.book_extensions),
        video_extensions: listing
            .video_extensions
            .unwrap_or(listing_defaults.video_extensions),
    };

    ResolvedConfig {
        home,
        content_root,
        categories: config.paths.categories,
        config_file: Some(config_path.to_path_buf()),
        sync,
        extraction,
        listing,
    }
}

/// Apply environment variable overrides on top of resolved settings
fn apply_env(mut config: ResolvedConfig) -> ResolvedConfig {
    if let Ok(env_home) = std::env::var("KIOSK_HOME") {
        let home = PathBuf::from(env_home);
        // Content follows home unless set explicitly
        if config.config_file.is_none() {
            config.content_root = home.join("content");
        }
        config.home = home;
    }

    if let Ok(env_content) = std::env::var("KIOSK_CONTENT_DIR") {
        config.content_root = PathBuf::from(env_content);
    }

    if let Ok(source_url) = std::env::var("KIOSK_SOURCE_URL") {
        config.sync.source_url = Some(source_url);
        config.sync.enabled = true;
    }

    config
}

/// Load configuration from an explicit file, then apply environment overrides
pub fn load_config_from(path: &Path) -> Result<ResolvedConfig> {
    let default_home = default_home()?;
    let config = load_config_file(path)?;
    Ok(apply_env(resolve_file(config, path, &default_home)))
}

fn default_home() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".kiosk-sync"))
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    match find_config_file() {
        Some(config_path) => load_config_from(&config_path),
        None => Ok(apply_env(ResolvedConfig::with_home(default_home()?))),
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
