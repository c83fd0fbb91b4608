//! Incremental Readwise → Notion reconciliation
//!
//! A run loads the watermark, fetches items with highlight activity since
//! the resolved lower bound, indexes the destination once, reconciles each
//! item and finally commits the new watermark. Nothing is committed when
//! the pass aborts.

mod engine;
mod index;
mod merge;
mod summary;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::*;
pub use index::*;
pub use merge::*;
pub use summary::*;

use crate::config::{CategoryMap, Config};
use crate::destination::Destination;
use crate::error::Result;
use crate::progress::{finish_progress, start_progress_bar};
use crate::source::Source;
use crate::state::StateDb;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Title reported for items whose listing entry could not be decoded
const UNREADABLE_TITLE: &str = "(unreadable item)";

/// How far back a run looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncWindow {
    /// Since the stored watermark, optionally capped by `days_to_sync`
    #[default]
    SinceWatermark,
    /// The last N days, ignoring the watermark
    Days(u32),
    /// Everything
    All,
}

impl SyncWindow {
    /// Lower bound for the item fetch
    pub fn lower_bound(
        &self,
        watermark: Option<DateTime<Utc>>,
        days_to_sync: Option<u32>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            SyncWindow::All => None,
            SyncWindow::Days(days) => Some(now - Duration::days(i64::from(*days))),
            SyncWindow::SinceWatermark => {
                let cap = days_to_sync.map(|days| now - Duration::days(i64::from(days)));
                match (watermark, cap) {
                    (Some(w), Some(c)) => Some(w.max(c)),
                    (w, c) => w.or(c),
                }
            }
        }
    }
}

/// Everything a run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub window: SyncWindow,
    pub days_to_sync: Option<u32>,
    pub initial_status: Option<String>,
    pub respect_deletions: bool,
    pub dedupe_against_page: bool,
    pub categories: CategoryMap,
    pub show_progress: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&Config::default(), SyncWindow::default())
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config, window: SyncWindow) -> Self {
        Self {
            window,
            days_to_sync: config.sync.days_to_sync,
            initial_status: config.initial_status().map(str::to_string),
            respect_deletions: config.sync.respect_deletions,
            dedupe_against_page: config.sync.dedupe_against_page,
            categories: config.categories.clone(),
            show_progress: false,
        }
    }
}

/// Result of a committed run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub lower_bound: Option<DateTime<Utc>>,
    pub watermark: DateTime<Utc>,
    pub stats: SyncStats,
}

/// Run one reconciliation pass and commit its outcome.
///
/// `now` is captured by the caller before anything is fetched and becomes
/// the next watermark. On a run-level error the run is marked failed and the
/// previous watermark stays in place.
pub async fn run_sync(
    source: &dyn Source,
    destination: &dyn Destination,
    db: &StateDb,
    options: &SyncOptions,
    now: DateTime<Utc>,
) -> Result<SyncReport> {
    let run = db.start_run(now).await?;

    let outcome = match reconcile_pass(source, destination, db, options, now).await {
        Ok((lower_bound, stats, synced)) => db
            .commit(&run.id, now, &synced, &stats)
            .await
            .map(|_| (lower_bound, stats)),
        Err(e) => Err(e),
    };

    match outcome {
        Ok((lower_bound, stats)) => {
            info!(
                created = stats.created,
                updated = stats.updated,
                skipped = stats.skipped,
                failed = stats.failed,
                "Sync complete"
            );
            Ok(SyncReport {
                run_id: run.id,
                lower_bound,
                watermark: now,
                stats,
            })
        }
        Err(e) => {
            if let Err(record_err) = db.fail_run(&run.id, &e.to_string()).await {
                warn!(error = %record_err, "Could not record failed run");
            }
            Err(e)
        }
    }
}

async fn reconcile_pass(
    source: &dyn Source,
    destination: &dyn Destination,
    db: &StateDb,
    options: &SyncOptions,
    now: DateTime<Utc>,
) -> Result<(Option<DateTime<Utc>>, SyncStats, Vec<String>)> {
    let watermark = db.load_watermark().await?;
    let lower_bound = options
        .window
        .lower_bound(watermark, options.days_to_sync, now);

    let ledger = if options.respect_deletions {
        db.synced_ids().await?
    } else {
        HashSet::new()
    };

    let listing = source.list_items_updated_since(lower_bound).await?;
    let mut stats = SyncStats {
        items_fetched: listing.entries.len() + listing.rejected.len(),
        ..Default::default()
    };
    for entry in &listing.rejected {
        let id = entry.id.as_deref().unwrap_or("?");
        warn!(item_id = id, error = %entry.error, "item could not be read");
        stats.record_failure(id, UNREADABLE_TITLE, &entry.error);
    }

    let items = listing.entries;
    info!(items = items.len(), "Fetched items to reconcile");

    if items.is_empty() {
        return Ok((lower_bound, stats, Vec::new()));
    }

    let (index, anomalies) = PageIndex::build(destination).await?;
    stats.anomalies.extend(anomalies);
    info!(pages = index.len(), "Indexed destination pages");

    let pb = if options.show_progress {
        start_progress_bar(items.len(), "Syncing")
    } else {
        None
    };

    let engine = Engine::new(source, destination, options, now);
    let result = engine
        .reconcile(&items, &index, &ledger, &mut stats, &pb)
        .await;
    finish_progress(pb, "Done");

    let synced = result?;
    Ok((lower_bound, stats, synced))
}
