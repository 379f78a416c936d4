//! Command-line interface for kiosk-sync.
//!
//! Provides commands for running the background worker, one-off passes,
//! inspecting listings and managing the deleted-content list.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::YtDlpExtractor;
use crate::config::{self, ResolvedConfig};
use crate::core::Coordinator;
use crate::domain::item::validate_name;
use crate::domain::{Category, ItemOutcome, SyncRun, Trigger};
use crate::library::store::{self, ContentLayout};
use crate::library::{DeletedContentTracker, ListingSnapshot};

/// kiosk-sync - Content synchronization engine for offline kiosks
#[derive(Parser, Debug)]
#[command(name = "kiosk-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: search for .kiosk/config.yaml)
    #[arg(short, long, global = true, env = "KIOSK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the background worker until Ctrl-C
    ///
    /// Lines on stdin drive the UI-facing API: `sync` requests an on-demand
    /// pass, `list <book|video>` prints the current listing.
    Daemon,

    /// Run a single pass and print a summary
    Sync {
        /// Use the shorter on-demand timeouts
        #[arg(long)]
        on_demand: bool,
    },

    /// List committed assets of a category
    List {
        #[arg(value_enum)]
        category: CategoryArg,
    },

    /// Show resolved configuration (debug)
    Config,

    /// Delete an asset and stop it from being downloaded again
    Forget {
        #[arg(value_enum)]
        category: CategoryArg,

        /// Manifest name of the item
        name: String,
    },

    /// Allow a forgotten item to be downloaded again
    Restore {
        #[arg(value_enum)]
        category: CategoryArg,

        /// Manifest name of the item
        name: String,
    },

    /// Show items the user deleted
    Deleted,
}

/// Content category for CLI (maps to Category)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Book,
    Video,
}

impl From<CategoryArg> for Category {
    fn from(c: CategoryArg) -> Self {
        match c {
            CategoryArg::Book => Category::Book,
            CategoryArg::Video => Category::Video,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = load(self.config)?;

        match self.command {
            Commands::Daemon => run_daemon(&cfg).await,
            Commands::Sync { on_demand } => {
                let trigger = if on_demand {
                    Trigger::OnDemand
                } else {
                    Trigger::Timer
                };
                sync_once(&cfg, trigger).await
            }
            Commands::List { category } => list_category(&cfg, category.into()).await,
            Commands::Config => show_config(&cfg).await,
            Commands::Forget { category, name } => forget(&cfg, category.into(), &name).await,
            Commands::Restore { category, name } => restore(&cfg, category.into(), &name),
            Commands::Deleted => show_deleted(&cfg),
        }
    }
}

fn load(path: Option<PathBuf>) -> Result<ResolvedConfig> {
    match path {
        Some(path) => config::load_config_from(&path),
        None => Ok(config::config()?.clone()),
    }
}

/// Run the worker, forwarding stdin commands until Ctrl-C
async fn run_daemon(cfg: &ResolvedConfig) -> Result<()> {
    let coordinator = Coordinator::new(cfg)?;
    if coordinator.is_enabled() {
        // Reported once here instead of on every video item
        match YtDlpExtractor::from_settings(&cfg.extraction).health_check().await {
            Ok(version) => tracing::info!(%version, "Extraction tool available"),
            Err(e) => tracing::warn!(error = %e, "Extraction tool unavailable; video-site items will fail"),
        }
    } else {
        tracing::warn!("Content sync is disabled; serving the local listing only");
    }

    let handle = coordinator.spawn();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) => handle_command(&handle, line.trim()),
                    None => stdin_open = false,
                }
            }
        }
    }

    tracing::info!("Shutting down");
    handle.shutdown().await
}

fn handle_command(handle: &crate::core::SyncHandle, line: &str) {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (None, _) => {}
        (Some("sync"), _) => {
            if handle.request_sync() {
                println!("Sync requested");
            } else {
                println!("Sync already pending");
            }
        }
        (Some("list"), Some(category)) => match category.parse::<Category>() {
            Ok(category) => {
                for name in handle.current_listing(category) {
                    println!("{}", name);
                }
            }
            Err(e) => eprintln!("{}", e),
        },
        _ => eprintln!("Unknown command: {} (expected `sync` or `list <book|video>`)", line),
    }
}

/// Run one pass in the foreground
async fn sync_once(cfg: &ResolvedConfig, trigger: Trigger) -> Result<()> {
    let coordinator = Coordinator::new(cfg)?;

    match coordinator.run_once(trigger).await {
        Some(run) => {
            print_summary(&run);
            if run.aborted.is_some() {
                std::process::exit(1);
            }
        }
        None => {
            println!("Content sync is disabled (set content.source_url or KIOSK_SOURCE_URL)");
        }
    }

    Ok(())
}

fn print_summary(run: &SyncRun) {
    println!("Run {} ({})", run.id, run.trigger);
    if let Some(error) = &run.aborted {
        println!("  Aborted: {}", error);
        return;
    }

    for report in &run.items {
        let status = match &report.outcome {
            ItemOutcome::Downloaded { path } => format!("downloaded -> {}", path.display()),
            ItemOutcome::Skipped(reason) => format!("skipped ({:?})", reason).to_lowercase(),
            ItemOutcome::Failed(e) => format!("failed: {}", e),
        };
        println!("  [{}] {}: {}", report.category, report.name, status);
    }

    println!();
    println!(
        "Downloaded: {}  Skipped: {}  Failed: {}  Rejected records: {}  ({:.1}s)",
        run.downloaded(),
        run.skipped(),
        run.failed(),
        run.rejected_records,
        run.elapsed().as_secs_f64()
    );
}

/// Print the listing the UI would see for a category
async fn list_category(cfg: &ResolvedConfig, category: Category) -> Result<()> {
    let snapshot = ListingSnapshot::scan(&ContentLayout::from_config(cfg), &cfg.listing).await;
    let names = snapshot.get(category);

    if names.is_empty() {
        println!("No {} content in {}", category, cfg.category_dir(category).display());
        return Ok(());
    }

    for name in names {
        println!("{}", name);
    }
    Ok(())
}

async fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    let sync = &cfg.sync;

    println!("Config file: {}", cfg.config_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none - using defaults)".to_string()));
    println!();
    println!("Paths:");
    println!("  Home (engine state): {}", cfg.home.display());
    println!("  Content root:        {}", cfg.content_root.display());
    println!("  Deleted tracker:     {}", cfg.deleted_tracker_path().display());
    println!();
    println!("Category directories:");
    for category in Category::ALL {
        println!("  {}: {}", category, cfg.category_dir(category).display());
    }
    println!();
    println!("Sync:");
    println!("  Enabled:        {}", sync.enabled);
    println!("  Source URL:     {}", sync.source_url.as_deref().unwrap_or("(not set)"));
    println!("  Check interval: {}s", sync.check_interval.as_secs());
    println!("  Timeouts:       {}s (on demand {}s)", sync.timeout.as_secs(), sync.on_demand_timeout.as_secs());
    println!("  Extraction:     {}s (on demand {}s), {}s apart", sync.extraction_timeout.as_secs(), sync.on_demand_extraction_timeout.as_secs(), sync.extraction_delay.as_secs());
    println!("  Connectivity:   {}", sync.connectivity_check_url.as_deref().unwrap_or("(disabled)"));
    println!();
    println!("Extraction:");
    println!("  Binary:     {}", cfg.extraction.binary);
    println!("  Max height: {}", cfg.extraction.max_height);
    println!("  Hosts:      {}", cfg.extraction.hosts.join(", "));
    match YtDlpExtractor::from_settings(&cfg.extraction).health_check().await {
        Ok(version) => println!("  Version:    {}", version),
        Err(e) => println!("  Version:    (unavailable: {})", e),
    }

    Ok(())
}

/// Remove an item's asset and record it as deleted
async fn forget(cfg: &ResolvedConfig, category: Category, name: &str) -> Result<()> {
    validate_name(name).map_err(|reason| anyhow::anyhow!("Invalid name '{}': {}", name, reason))?;
    let root = cfg.category_dir(category);

    let exact = root.join(name);
    let asset = if exact.is_file() {
        Some(exact)
    } else {
        store::find_by_stem(&root, name)
            .await
            .with_context(|| format!("Failed to scan {}", root.display()))?
    };

    match asset {
        Some(path) => {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            println!("Removed {}", path.display());
        }
        None => println!("No asset named '{}' in {}", name, root.display()),
    }

    let tracker = DeletedContentTracker::new(cfg.deleted_tracker_path());
    if tracker.mark_deleted(category, name)? {
        println!("'{}' will not be downloaded again", name);
    }
    Ok(())
}

fn restore(cfg: &ResolvedConfig, category: Category, name: &str) -> Result<()> {
    let tracker = DeletedContentTracker::new(cfg.deleted_tracker_path());

    if tracker.mark_restored(category, name)? {
        println!("'{}' will be downloaded on the next sync", name);
    } else {
        println!("'{}' was not in the deleted list", name);
    }
    Ok(())
}

fn show_deleted(cfg: &ResolvedConfig) -> Result<()> {
    let deleted = DeletedContentTracker::new(cfg.deleted_tracker_path()).all()?;

    for category in Category::ALL {
        let names = deleted.names(category);
        println!("{} ({}):", category, names.len());
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["kiosk-sync", "sync", "--on-demand"]).unwrap();
        assert!(matches!(cli.command, Commands::Sync { on_demand: true }));

        let cli = Cli::try_parse_from(["kiosk-sync", "forget", "video", "civics-101"]).unwrap();
        match cli.command {
            Commands::Forget { category, name } => {
                assert_eq!(Category::from(category), Category::Video);
                assert_eq!(name, "civics-101");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["kiosk-sync", "list", "audio"]).is_err());
    }

    #[tokio::test]
    async fn test_forget_stays_inside_category_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let cfg = ResolvedConfig::with_home(temp.path());
        let books = cfg.category_dir(Category::Book);
        std::fs::create_dir_all(&books).unwrap();
        let outside = temp.path().join("content").join("secret.pdf");
        std::fs::write(&outside, b"keep").unwrap();

        assert!(forget(&cfg, Category::Book, "../secret.pdf").await.is_err());
        assert!(forget(&cfg, Category::Book, ".hidden").await.is_err());
        assert!(outside.exists());
        assert!(!cfg.deleted_tracker_path().exists());

        std::fs::write(books.join("algebra.pdf"), b"pdf").unwrap();
        forget(&cfg, Category::Book, "algebra").await.unwrap();
        assert!(!books.join("algebra.pdf").exists());
        assert!(DeletedContentTracker::new(cfg.deleted_tracker_path())
            .is_deleted(Category::Book, "algebra")
            .unwrap());
    }
}
