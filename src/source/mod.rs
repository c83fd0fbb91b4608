//! Source side of the sync
//!
//! This module provides:
//! - The [`Source`] trait the reconciliation engine consumes
//! - The Readwise implementation

mod readwise;

pub use readwise::*;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Highlight, Listing, SourceItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for highlight sources
#[async_trait]
pub trait Source: Send + Sync {
    /// Items with highlight activity at or after `since` (all items when `None`).
    ///
    /// Entries that cannot be decoded are returned as rejected instead of
    /// failing the whole listing.
    async fn list_items_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Listing<SourceItem>>;

    /// Every highlight of one item, oldest first
    async fn list_highlights(&self, item_id: &str) -> Result<Listing<Highlight>>;
}

/// Create the source client from configuration
pub fn create_source(config: &Config) -> Result<Box<dyn Source>> {
    let token = config.readwise_token()?;
    let client = ReadwiseClient::new(&config.readwise, &config.http, &token)?;
    Ok(Box::new(client))
}
