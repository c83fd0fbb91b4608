//! In-memory index of destination pages keyed by external id

use crate::destination::Destination;
use crate::error::Result;
use crate::models::DestinationPageRef;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Destination pages by source item id. Read-only once built.
#[derive(Debug, Default)]
pub struct PageIndex {
    pages: HashMap<String, DestinationPageRef>,
}

impl PageIndex {
    /// Scan the destination once and index every live page.
    ///
    /// Returns the index together with one anomaly message per duplicate id.
    pub async fn build(destination: &dyn Destination) -> Result<(Self, Vec<String>)> {
        let pages = destination.query_all_pages().await?;
        Ok(Self::from_pages(pages))
    }

    /// Index pages in scan order; the first page seen for an id wins
    pub fn from_pages(pages: Vec<DestinationPageRef>) -> (Self, Vec<String>) {
        let mut index: HashMap<String, DestinationPageRef> = HashMap::with_capacity(pages.len());
        let mut anomalies = Vec::new();

        for page in pages {
            if page.archived {
                debug!(page_id = %page.page_id, "skipping archived page");
                continue;
            }

            if let Some(kept) = index.get(&page.external_id) {
                warn!(
                    external_id = %page.external_id,
                    kept = %kept.page_id,
                    ignored = %page.page_id,
                    "duplicate destination page"
                );
                anomalies.push(format!(
                    "item {} has more than one page; using {} and ignoring {}",
                    page.external_id, kept.page_id, page.page_id
                ));
                continue;
            }

            index.insert(page.external_id.clone(), page);
        }

        debug!(pages = index.len(), "built page index");
        (Self { pages: index }, anomalies)
    }

    pub fn lookup(&self, external_id: &str) -> Option<&DestinationPageRef> {
        self.pages.get(external_id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
