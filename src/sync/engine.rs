//! Reconciliation engine
//!
//! Each fetched item moves through one transition chosen by [`plan_action`]:
//!
//! - no live page, previously synced, deletions respected: skip
//! - no live page: create with the full highlight list
//! - same count as recorded: metadata only, no highlight fetch
//! - fewer than recorded: metadata and count only
//! - more than recorded: append the new tail, then update properties
//!
//! Items are processed one at a time. An item error is recorded and the pass
//! continues; a run-level error stops the pass immediately.

use super::index::PageIndex;
use super::merge::{self, MergePlan};
use super::summary::SyncStats;
use super::SyncOptions;
use crate::destination::render::MAX_BLOCKS_PER_REQUEST;
use crate::destination::Destination;
use crate::error::Result;
use crate::models::{DestinationPageRef, Highlight, PageFields, SourceItem};
use crate::progress::advance_progress;
use crate::source::Source;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Transition chosen for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    MetadataOnly,
    CountRegressed,
    Merge,
    SkipDeleted,
}

/// Pick the transition for an item.
///
/// `existing` must already exclude archived pages. Only [`Action::Create`]
/// and [`Action::Merge`] fetch highlights.
pub fn plan_action(
    item: &SourceItem,
    existing: Option<&DestinationPageRef>,
    skip_if_deleted: bool,
) -> Action {
    match existing {
        None if skip_if_deleted => Action::SkipDeleted,
        None => Action::Create,
        Some(page) if item.num_highlights == page.highlight_count => Action::MetadataOnly,
        Some(page) if item.num_highlights < page.highlight_count => Action::CountRegressed,
        Some(_) => Action::Merge,
    }
}

/// Outcome of one successfully handled item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Created { appended: usize },
    Updated { appended: usize },
    Skipped,
}

pub struct Engine<'a> {
    source: &'a dyn Source,
    destination: &'a dyn Destination,
    options: &'a SyncOptions,
    now: DateTime<Utc>,
}

impl<'a> Engine<'a> {
    pub fn new(
        source: &'a dyn Source,
        destination: &'a dyn Destination,
        options: &'a SyncOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            destination,
            options,
            now,
        }
    }

    /// Reconcile every item against the index.
    ///
    /// Returns the ids of items now mirrored, for the synced-item ledger.
    pub async fn reconcile(
        &self,
        items: &[SourceItem],
        index: &PageIndex,
        ledger: &HashSet<String>,
        stats: &mut SyncStats,
        pb: &Option<ProgressBar>,
    ) -> Result<Vec<String>> {
        let mut synced = Vec::new();

        for item in items {
            if let Some(pb) = pb {
                pb.set_message(item.title.clone());
            }

            // Warnings only reach the summary once the item's writes went through
            let mut notes = Vec::new();
            match self.reconcile_item(item, index, ledger, &mut notes).await {
                Ok(outcome) => {
                    stats.anomalies.append(&mut notes);
                    match outcome {
                        ItemOutcome::Created { appended } => {
                            stats.created += 1;
                            stats.highlights_appended += appended;
                        }
                        ItemOutcome::Updated { appended } => {
                            stats.updated += 1;
                            stats.highlights_appended += appended;
                        }
                        ItemOutcome::Skipped => stats.skipped += 1,
                    }
                    if outcome != ItemOutcome::Skipped {
                        synced.push(item.id.clone());
                    }
                }
                Err(e) if e.is_run_level() => {
                    warn!(item_id = %item.id, title = %item.title, error = %e, "aborting run");
                    return Err(e);
                }
                Err(e) => {
                    warn!(item_id = %item.id, title = %item.title, error = %e, "item failed");
                    stats.record_failure(&item.id, &item.title, &e);
                }
            }

            advance_progress(pb);
        }

        Ok(synced)
    }

    async fn reconcile_item(
        &self,
        item: &SourceItem,
        index: &PageIndex,
        ledger: &HashSet<String>,
        notes: &mut Vec<String>,
    ) -> Result<ItemOutcome> {
        let existing = index.lookup(&item.id);
        let skip_if_deleted = self.options.respect_deletions && ledger.contains(&item.id);

        match (plan_action(item, existing, skip_if_deleted), existing) {
            (Action::SkipDeleted, _) => {
                info!(item_id = %item.id, title = %item.title, "page was deleted, not re-creating");
                Ok(ItemOutcome::Skipped)
            }
            (Action::Create, _) => self.create(item, notes).await,
            (Action::MetadataOnly, Some(page)) => {
                debug!(item_id = %item.id, count = page.highlight_count, "highlight count unchanged");
                let fields = self.metadata_fields(item, notes);
                self.destination
                    .update_page_properties(&page.page_id, &fields)
                    .await?;
                Ok(ItemOutcome::Updated { appended: 0 })
            }
            (Action::CountRegressed, Some(page)) => {
                warn!(
                    item_id = %item.id,
                    reported = item.num_highlights,
                    recorded = page.highlight_count,
                    "highlight count went down"
                );
                notes.push(format!(
                    "{} ({}): source reports {} highlights, page recorded {}; body left as is",
                    item.title, item.id, item.num_highlights, page.highlight_count
                ));
                let mut fields = self.metadata_fields(item, notes);
                fields.highlight_count = Some(item.num_highlights);
                self.destination
                    .update_page_properties(&page.page_id, &fields)
                    .await?;
                Ok(ItemOutcome::Updated { appended: 0 })
            }
            (Action::Merge, Some(page)) => self.merge(item, page, notes).await,
            (_, None) => self.create(item, notes).await,
        }
    }

    /// Create the page with at most one request's worth of highlights, then
    /// append the rest.
    ///
    /// The recorded count always matches what the body holds, so a failed
    /// append leaves a page the next merge resumes from.
    async fn create(&self, item: &SourceItem, notes: &mut Vec<String>) -> Result<ItemOutcome> {
        let highlights = self.fetch_highlights(item, notes).await?;
        let (first, rest) = highlights.split_at(highlights.len().min(MAX_BLOCKS_PER_REQUEST));

        let mut fields = self.metadata_fields(item, notes);
        fields.title = Some(item.title.clone());
        fields.highlight_count = Some(first.len() as u32);
        fields.view_url = Some(item.view_url.clone());
        fields.external_id = Some(item.id.clone());
        fields.status = self.options.initial_status.clone();

        let page_id = self
            .destination
            .create_page(&fields, &merge::render_highlights(first))
            .await?;

        if !rest.is_empty() {
            self.destination
                .append_blocks(&page_id, &merge::render_highlights(rest))
                .await?;
            let count = PageFields {
                highlight_count: Some(highlights.len() as u32),
                ..Default::default()
            };
            self.destination
                .update_page_properties(&page_id, &count)
                .await?;
        }

        info!(
            item_id = %item.id,
            title = %item.title,
            page_id = %page_id,
            highlights = highlights.len(),
            "created page"
        );

        Ok(ItemOutcome::Created {
            appended: highlights.len(),
        })
    }

    /// Decoded highlights of an item; unreadable ones are noted and left out
    async fn fetch_highlights(
        &self,
        item: &SourceItem,
        notes: &mut Vec<String>,
    ) -> Result<Vec<Highlight>> {
        let listing = self.source.list_highlights(&item.id).await?;
        for entry in &listing.rejected {
            let highlight_id = entry.id.as_deref().unwrap_or("?");
            warn!(item_id = %item.id, highlight_id, "skipping unreadable highlight");
            notes.push(format!(
                "{} ({}): highlight {} could not be read and was skipped: {}",
                item.title, item.id, highlight_id, entry.error
            ));
        }
        Ok(listing.entries)
    }

    async fn merge(
        &self,
        item: &SourceItem,
        page: &DestinationPageRef,
        notes: &mut Vec<String>,
    ) -> Result<ItemOutcome> {
        let highlights = self.fetch_highlights(item, notes).await?;

        let appended = match merge::plan_merge(&highlights, page.highlight_count) {
            MergePlan::Append(new) => {
                let new = if self.options.dedupe_against_page {
                    let existing = self.destination.list_quote_texts(&page.page_id).await?;
                    let kept = merge::drop_already_present(new, &existing);
                    if kept.len() < new.len() {
                        debug!(
                            item_id = %item.id,
                            dropped = new.len() - kept.len(),
                            "highlights already on page"
                        );
                    }
                    kept
                } else {
                    new.to_vec()
                };

                let blocks = merge::render_highlights(&new);
                if !blocks.is_empty() {
                    self.destination
                        .append_blocks(&page.page_id, &blocks)
                        .await?;
                }
                blocks.len()
            }
            MergePlan::NothingNew => {
                debug!(item_id = %item.id, "no highlights beyond the recorded count");
                0
            }
            MergePlan::Regressed { fetched, recorded } => {
                warn!(item_id = %item.id, fetched, recorded, "fewer highlights than recorded");
                notes.push(format!(
                    "{} ({}): {} highlights fetched, page recorded {}; body left as is",
                    item.title, item.id, fetched, recorded
                ));
                0
            }
        };

        let mut fields = self.metadata_fields(item, notes);
        fields.highlight_count = Some(highlights.len() as u32);
        self.destination
            .update_page_properties(&page.page_id, &fields)
            .await?;

        if appended > 0 {
            info!(item_id = %item.id, title = %item.title, appended, "appended highlights");
        }
        Ok(ItemOutcome::Updated { appended })
    }

    /// Fields refreshed on every touch of an existing page
    fn metadata_fields(&self, item: &SourceItem, notes: &mut Vec<String>) -> PageFields {
        PageFields {
            author: item.author.clone(),
            category: self.category_option(item, notes),
            last_highlighted: item.last_highlight_at,
            last_synced: Some(self.now),
            cover_url: item.cover_image_url.clone(),
            ..Default::default()
        }
    }

    fn category_option(&self, item: &SourceItem, notes: &mut Vec<String>) -> Option<String> {
        match self.options.categories.resolve(&item.category) {
            Some(option) => Some(option.to_string()),
            None => {
                warn!(item_id = %item.id, category = %item.category, "no category mapping");
                notes.push(format!(
                    "{} ({}): category '{}' has no mapping; left unset",
                    item.title, item.id, item.category
                ));
                None
            }
        }
    }
}
