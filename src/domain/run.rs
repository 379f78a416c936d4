//! Sync run state and per-item outcomes.
//!
//! A SyncRun represents a single pass of the coordinator's pipeline. It is
//! summarized into a log line when the pass ends and then discarded.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SyncError;
use super::item::Category;

/// What started a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Periodic background timer
    Timer,

    /// The UI entered a content-browsing menu
    OnDemand,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Timer => write!(f, "timer"),
            Trigger::OnDemand => write!(f, "on_demand"),
        }
    }
}

/// Why an item was not downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A matching asset is already on disk
    Present,

    /// The user deleted this item; it is not fetched again automatically
    Deleted,
}

/// Outcome of processing one manifest item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Downloaded { path: PathBuf },
    Skipped(SkipReason),
    Failed(SyncError),
}

/// Outcome of one item, tagged with the item it belongs to
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub name: String,
    pub category: Category,
    pub outcome: ItemOutcome,
}

/// A single synchronization pass
#[derive(Debug, Clone)]
pub struct SyncRun {
    /// Unique identifier for this pass
    pub id: Uuid,

    /// What started the pass
    pub trigger: Trigger,

    /// When the pass started
    pub started_at: DateTime<Utc>,

    /// When the pass finished (if applicable)
    pub completed_at: Option<DateTime<Utc>>,

    /// Per-item outcomes in manifest order
    pub items: Vec<ItemReport>,

    /// Manifest records that were rejected during parsing
    pub rejected_records: usize,

    /// Run-level failure that ended the pass early
    pub aborted: Option<SyncError>,
}

impl SyncRun {
    /// Start a new pass
    pub fn new(trigger: Trigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            started_at: Utc::now(),
            completed_at: None,
            items: Vec::new(),
            rejected_records: 0,
            aborted: None,
        }
    }

    /// Record the outcome of one item
    pub fn record(&mut self, name: impl Into<String>, category: Category, outcome: ItemOutcome) {
        self.items.push(ItemReport {
            name: name.into(),
            category,
            outcome,
        });
    }

    /// End the pass because of a run-level failure
    pub fn abort(&mut self, error: SyncError) {
        self.aborted = Some(error);
        self.finish();
    }

    /// Mark the pass as finished
    pub fn finish(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Whether the manifest was fetched and every item was attempted
    pub fn completed_manifest(&self) -> bool {
        self.aborted.is_none()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    /// Wall-clock duration of the pass (zero while running)
    pub fn elapsed(&self) -> Duration {
        self.completed_at
            .and_then(|end| (end - self.started_at).to_std().ok())
            .unwrap_or_default()
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|r| pred(&r.outcome)).count()
    }
}
