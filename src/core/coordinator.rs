//! Synchronization coordinator.
//!
//! Owns the run lifecycle: a periodic timer, an on-demand trigger from the
//! UI, the single-flight guard and publication of the listing cache.
//!
//! ```text
//! Idle ──(timer | request_sync)──▶ Running ──(done | manifest failure)──▶ Idle
//! ```
//!
//! A trigger that arrives while a pass is Running is dropped. Passes are never
//! cancelled midway; per-request timeouts bound how long one can take.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use super::classifier::{Classifier, Strategy};
use super::limits::SingleFlight;
use super::manifest::ManifestFetcher;
use crate::adapters::{http_client, ExtractionDownloader, Extractor, HttpDownloader, YtDlpExtractor};
use crate::config::{ListingSettings, ResolvedConfig, SyncSettings, TimeoutProfile};
use crate::domain::{
    Category, ContentItem, ItemOutcome, SkipReason, SyncError, SyncRun, Trigger,
};
use crate::library::store::{self, ContentLayout};
use crate::library::{DeletedContent, DeletedContentTracker, ListingCache, ListingSnapshot};

/// Shortest allowed timer period
const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

struct Inner {
    settings: SyncSettings,
    source_url: String,
    listing_settings: ListingSettings,
    classifier: Classifier,
    fetcher: ManifestFetcher,
    http: HttpDownloader,
    extraction: ExtractionDownloader,
    deleted: DeletedContentTracker,
    listing: Arc<ListingCache>,
    flight: SingleFlight,
    runs_started: AtomicU64,
}

/// Drives synchronization passes; cheap to clone
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Create a coordinator using the yt-dlp extractor
    pub fn new(config: &ResolvedConfig) -> Result<Self> {
        let extractor = Arc::new(YtDlpExtractor::from_settings(&config.extraction));
        Self::with_extractor(config, extractor)
    }

    /// Create a coordinator with a custom extractor
    pub fn with_extractor(config: &ResolvedConfig, extractor: Arc<dyn Extractor>) -> Result<Self> {
        let settings = config.sync.clone();
        let source_url = match (&settings.source_url, settings.enabled) {
            (Some(url), _) => url.clone(),
            (None, false) => String::new(),
            (None, true) => anyhow::bail!("Content sync is enabled but no source_url is set"),
        };

        let client = http_client()?;
        let layout = ContentLayout::from_config(config);

        Ok(Self {
            inner: Arc::new(Inner {
                extraction: ExtractionDownloader::new(extractor, settings.extraction_delay),
                settings,
                source_url,
                listing_settings: config.listing.clone(),
                classifier: Classifier::new(layout, &config.extraction.hosts),
                fetcher: ManifestFetcher::new(client.clone()),
                http: HttpDownloader::new(client),
                deleted: DeletedContentTracker::new(config.deleted_tracker_path()),
                listing: Arc::new(ListingCache::new()),
                flight: SingleFlight::new(),
                runs_started: AtomicU64::new(0),
            }),
        })
    }

    /// Shared listing cache read by the UI
    pub fn listing(&self) -> Arc<ListingCache> {
        Arc::clone(&self.inner.listing)
    }

    /// Number of passes that actually entered Running
    pub fn runs_started(&self) -> u64 {
        self.inner.runs_started.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.inner.flight.is_running()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.settings.enabled
    }

    /// Rescan the category roots and publish a new listing snapshot
    pub async fn refresh_listing(&self) {
        let snapshot =
            ListingSnapshot::scan(self.inner.classifier.layout(), &self.inner.listing_settings)
                .await;
        self.inner.listing.publish(snapshot);
    }

    /// Run one pass unless sync is disabled or a pass is already Running.
    ///
    /// Returns `None` when the trigger was a no-op.
    pub async fn run_once(&self, trigger: Trigger) -> Option<SyncRun> {
        if !self.inner.settings.enabled {
            debug!(%trigger, "Content sync disabled, ignoring trigger");
            return None;
        }

        let Some(_permit) = self.inner.flight.try_acquire() else {
            debug!(%trigger, "Sync already running, ignoring trigger");
            return None;
        };
        self.inner.runs_started.fetch_add(1, Ordering::SeqCst);

        Some(self.execute(SyncRun::new(trigger)).await)
    }

    #[instrument(skip_all, fields(run_id = %run.id, trigger = %run.trigger))]
    async fn execute(&self, mut run: SyncRun) -> SyncRun {
        let inner = &self.inner;
        let timeouts = inner.settings.timeouts(run.trigger);
        info!(source = %inner.source_url, "Sync pass started");

        if let Some(probe_url) = &inner.settings.connectivity_check_url {
            if let Err(e) = inner.http.probe(probe_url, timeouts.request).await {
                warn!(error = %e, "No connectivity, skipping pass");
                run.abort(e);
                return run;
            }
        }

        let manifest = match inner.fetcher.fetch(&inner.source_url, timeouts.request).await {
            Ok(manifest) => manifest,
            Err(e) => {
                error!(error = %e, "Manifest fetch failed, keeping previous listing");
                run.abort(e);
                return run;
            }
        };
        run.rejected_records = manifest.rejected.len();

        // File locks block; keep them off the async workers
        let tracker = inner.deleted.clone();
        let deleted = match tokio::task::spawn_blocking(move || tracker.load()).await {
            Ok(Ok(deleted)) => deleted,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read deleted-content tracker");
                DeletedContent::default()
            }
            Err(e) => {
                warn!(error = %e, "Deleted-content tracker task failed");
                DeletedContent::default()
            }
        };

        for item in &manifest.items {
            let outcome = self.process(item, &deleted, timeouts).await;
            log_outcome(item, &outcome);
            run.record(item.name.clone(), item.category, outcome);
        }

        run.finish();
        self.refresh_listing().await;

        info!(
            items = run.items.len(),
            downloaded = run.downloaded(),
            skipped = run.skipped(),
            failed = run.failed(),
            rejected = run.rejected_records,
            elapsed_ms = run.elapsed().as_millis() as u64,
            "Sync pass complete"
        );
        run
    }

    /// Classify, check and fetch one item
    async fn process(
        &self,
        item: &ContentItem,
        deleted: &DeletedContent,
        timeouts: TimeoutProfile,
    ) -> ItemOutcome {
        if deleted.contains(item.category, &item.name) {
            return ItemOutcome::Skipped(SkipReason::Deleted);
        }

        match self.fetch_item(item, timeouts).await {
            Ok(Some(path)) => ItemOutcome::Downloaded { path },
            Ok(None) => ItemOutcome::Skipped(SkipReason::Present),
            Err(e) => ItemOutcome::Failed(e),
        }
    }

    async fn fetch_item(
        &self,
        item: &ContentItem,
        timeouts: TimeoutProfile,
    ) -> Result<Option<std::path::PathBuf>, SyncError> {
        let inner = &self.inner;
        let classification = inner.classifier.classify(item).await?;
        let root = classification.destination_root.as_path();

        if !store::should_download(item, root, classification.strategy).await? {
            return Ok(None);
        }

        let path = match classification.strategy {
            Strategy::Direct => {
                let staged = store::stage(root, &item.name)?;
                let transfer = inner
                    .http
                    .download(item.source_url.as_str(), staged.path(), timeouts.request)
                    .await?;
                let file_name = store::resolve_file_name(item, transfer.content_type.as_deref());
                store::commit(staged, &root.join(file_name))?
            }
            Strategy::Extraction => {
                inner
                    .extraction
                    .download(item.source_url.as_str(), root, &item.name, timeouts.extraction)
                    .await?
            }
        };

        Ok(Some(path))
    }

    /// Start the background worker.
    ///
    /// The listing is published once before the first tick so the UI has
    /// something to show while the first pass runs.
    pub fn spawn(self) -> SyncHandle {
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<Trigger>(1);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let listing = self.listing();
        let period = self.inner.settings.check_interval.max(MIN_CHECK_INTERVAL);

        let task = tokio::spawn(async move {
            self.refresh_listing().await;

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = interval.tick() => self.dispatch(Trigger::Timer),
                    Some(trigger) = trigger_rx.recv() => self.dispatch(trigger),
                }
            }
            debug!("Sync worker stopped");
        });

        SyncHandle {
            trigger: SyncTrigger { tx: trigger_tx },
            listing,
            stop_tx,
            task,
        }
    }

    /// Start a pass without waiting for it; the worker keeps serving triggers
    fn dispatch(&self, trigger: Trigger) {
        if self.is_running() {
            debug!(%trigger, "Sync already running, ignoring trigger");
            return;
        }
        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.run_once(trigger).await;
        });
    }
}

fn log_outcome(item: &ContentItem, outcome: &ItemOutcome) {
    let category = item.category;
    let name = item.name.as_str();
    match outcome {
        ItemOutcome::Downloaded { path } => {
            info!(%category, name, path = %path.display(), "Downloaded")
        }
        ItemOutcome::Skipped(SkipReason::Present) => debug!(%category, name, "Already present"),
        ItemOutcome::Skipped(SkipReason::Deleted) => debug!(%category, name, "Deleted by user, skipping"),
        ItemOutcome::Failed(e) if e.is_environmental() => {
            error!(%category, name, error = %e, "Item failed")
        }
        ItemOutcome::Failed(e) => warn!(%category, name, error = %e, "Item failed"),
    }
}

/// Cloneable, non-blocking on-demand trigger for the UI
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    tx: mpsc::Sender<Trigger>,
}

impl SyncTrigger {
    /// Request an on-demand pass.
    ///
    /// Never waits. Returns false if a request is already pending or the
    /// worker has stopped.
    pub fn request_sync(&self) -> bool {
        self.tx.try_send(Trigger::OnDemand).is_ok()
    }
}

/// Handle to the running worker
pub struct SyncHandle {
    trigger: SyncTrigger,
    listing: Arc<ListingCache>,
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl SyncHandle {
    pub fn request_sync(&self) -> bool {
        self.trigger.request_sync()
    }

    pub fn trigger_handle(&self) -> SyncTrigger {
        self.trigger.clone()
    }

    pub fn listing(&self) -> Arc<ListingCache> {
        Arc::clone(&self.listing)
    }

    /// Asset names of a category from the latest published snapshot
    pub fn current_listing(&self, category: Category) -> Vec<String> {
        self.listing.current_listing(category)
    }

    /// Stop the worker loop. A pass already Running finishes on its own.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> ResolvedConfig {
        let mut config = ResolvedConfig::with_home(temp.path());
        config.sync.connectivity_check_url = None;
        config
    }

    #[tokio::test]
    async fn test_disabled_never_runs() {
        let temp = TempDir::new().unwrap();
        let coordinator = Coordinator::new(&config(&temp)).unwrap();

        assert!(!coordinator.is_enabled());
        assert!(coordinator.run_once(Trigger::OnDemand).await.is_none());
        assert_eq!(coordinator.runs_started(), 0);
    }

    #[test]
    fn test_enabled_requires_source() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp);
        config.sync.enabled = true;

        assert!(Coordinator::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_manifest_aborts_pass() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp);
        config.sync = SyncSettings {
            connectivity_check_url: None,
            on_demand_timeout: Duration::from_secs(2),
            ..SyncSettings::for_source("http://127.0.0.1:9/manifest.json")
        };
        let coordinator = Coordinator::new(&config).unwrap();

        let run = coordinator.run_once(Trigger::OnDemand).await.unwrap();
        assert!(matches!(run.aborted, Some(SyncError::Network(_))));
        assert!(run.items.is_empty());
        assert!(!coordinator.is_running());
        // Listing was never published
        assert!(coordinator.listing().snapshot().refreshed_at().is_none());
    }
}
