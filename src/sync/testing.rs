//! In-memory source and destination used by the sync tests

use crate::destination::Destination;
use crate::error::{Error, Result};
use crate::models::{
    Block, Category, DestinationPageRef, Highlight, Listing, PageFields, RejectedEntry, SourceItem,
};
use crate::source::Source;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub fn item(id: &str, count: u32) -> SourceItem {
    SourceItem {
        id: id.to_string(),
        title: format!("Item {}", id),
        author: Some("Author".to_string()),
        category: Category::Books,
        cover_image_url: None,
        num_highlights: count,
        last_highlight_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
        view_url: format!("https://readwise.io/bookreview/{}", id),
    }
}

pub fn highlight(n: i64) -> Highlight {
    Highlight {
        id: n,
        text: format!("highlight {}", n),
        note: None,
        highlighted_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        location: Some(n),
    }
}

pub fn unreadable(id: &str) -> RejectedEntry {
    RejectedEntry {
        id: Some(id.to_string()),
        error: "Malformed readwise response: invalid type: null, expected u32".to_string(),
    }
}

pub struct FakeSource {
    items: Mutex<Vec<SourceItem>>,
    rejected_items: Mutex<Vec<RejectedEntry>>,
    highlights: Mutex<HashMap<String, Listing<Highlight>>>,
    highlight_calls: Mutex<Vec<String>>,
    since_seen: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl FakeSource {
    pub fn new(items: Vec<SourceItem>) -> Self {
        Self {
            items: Mutex::new(items),
            rejected_items: Mutex::new(Vec::new()),
            highlights: Mutex::new(HashMap::new()),
            highlight_calls: Mutex::new(Vec::new()),
            since_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn set_items(&self, items: Vec<SourceItem>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn set_highlights(&self, item_id: &str, highlights: Vec<Highlight>) {
        self.highlights
            .lock()
            .unwrap()
            .insert(item_id.to_string(), Listing::new(highlights));
    }

    /// Make the item listing carry an entry that could not be decoded
    pub fn add_unreadable_item(&self, entry: RejectedEntry) {
        self.rejected_items.lock().unwrap().push(entry);
    }

    /// Make an item's highlight listing carry an entry that could not be decoded
    pub fn add_unreadable_highlight(&self, item_id: &str, entry: RejectedEntry) {
        self.highlights
            .lock()
            .unwrap()
            .entry(item_id.to_string())
            .or_default()
            .rejected
            .push(entry);
    }

    pub fn highlight_calls(&self) -> usize {
        self.highlight_calls.lock().unwrap().len()
    }

    pub fn last_since(&self) -> Option<DateTime<Utc>> {
        self.since_seen.lock().unwrap().last().copied().flatten()
    }
}

#[async_trait]
impl Source for FakeSource {
    async fn list_items_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Listing<SourceItem>> {
        self.since_seen.lock().unwrap().push(since);
        let items = self.items.lock().unwrap();
        Ok(Listing {
            entries: items
                .iter()
                .filter(|i| match since {
                    Some(since) => i.last_highlight_at.is_some_and(|at| at >= since),
                    None => true,
                })
                .cloned()
                .collect(),
            rejected: self.rejected_items.lock().unwrap().clone(),
        })
    }

    async fn list_highlights(&self, item_id: &str) -> Result<Listing<Highlight>> {
        self.highlight_calls
            .lock()
            .unwrap()
            .push(item_id.to_string());
        Ok(self
            .highlights
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub page_id: String,
    pub fields: PageFields,
    pub blocks: Vec<Block>,
    pub archived: bool,
}

impl FakePage {
    pub fn quote_texts(&self) -> Vec<&str> {
        self.blocks.iter().filter_map(Block::quote_text).collect()
    }
}

#[derive(Default)]
pub struct FakeDestination {
    pages: Mutex<Vec<FakePage>>,
    rejected: Mutex<HashSet<String>>,
    rejected_appends: Mutex<HashSet<String>>,
    revoked: Mutex<HashSet<String>>,
    append_calls: Mutex<usize>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing page with a recorded count and body
    pub fn seed_page(&self, external_id: &str, count: u32, blocks: Vec<Block>) {
        let mut pages = self.pages.lock().unwrap();
        let page_id = format!("page-{}-{}", external_id, pages.len());
        pages.push(FakePage {
            page_id,
            fields: PageFields {
                external_id: Some(external_id.to_string()),
                highlight_count: Some(count),
                ..Default::default()
            },
            blocks,
            archived: false,
        });
    }

    /// Simulate the user deleting the page for an item
    pub fn archive(&self, external_id: &str) {
        for page in self.pages.lock().unwrap().iter_mut() {
            if page.fields.external_id.as_deref() == Some(external_id) {
                page.archived = true;
            }
        }
    }

    /// Make writes for one item fail with a validation error
    pub fn reject_item(&self, external_id: &str) {
        self.rejected
            .lock()
            .unwrap()
            .insert(external_id.to_string());
    }

    /// Make only body appends for one item fail with a validation error
    pub fn reject_appends(&self, external_id: &str) {
        self.rejected_appends
            .lock()
            .unwrap()
            .insert(external_id.to_string());
    }

    /// Make writes for one item fail as if the token had been revoked
    pub fn revoke_for(&self, external_id: &str) {
        self.revoked
            .lock()
            .unwrap()
            .insert(external_id.to_string());
    }

    pub fn restore(&self) {
        self.revoked.lock().unwrap().clear();
        self.rejected.lock().unwrap().clear();
        self.rejected_appends.lock().unwrap().clear();
    }

    pub fn pages(&self) -> Vec<FakePage> {
        self.pages.lock().unwrap().clone()
    }

    /// First live page for an item
    pub fn page(&self, external_id: &str) -> Option<FakePage> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .find(|p| !p.archived && p.fields.external_id.as_deref() == Some(external_id))
            .cloned()
    }

    pub fn append_calls(&self) -> usize {
        *self.append_calls.lock().unwrap()
    }

    fn check_write(&self, external_id: Option<&str>) -> Result<()> {
        if let Some(id) = external_id {
            if self.revoked.lock().unwrap().contains(id) {
                return Err(Error::Unauthorized {
                    service: "notion",
                    status: 401,
                });
            }
            if self.rejected.lock().unwrap().contains(id) {
                return Err(Error::Api {
                    service: "notion",
                    status: 400,
                    body: "validation_error".to_string(),
                });
            }
        }
        Ok(())
    }

    fn external_id_of(&self, page_id: &str) -> Option<String> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.page_id == page_id)
            .and_then(|p| p.fields.external_id.clone())
    }
}

fn merge_fields(target: &mut PageFields, update: &PageFields) {
    macro_rules! take {
        ($($field:ident),*) => {
            $(if update.$field.is_some() {
                target.$field = update.$field.clone();
            })*
        };
    }
    take!(
        title,
        author,
        category,
        highlight_count,
        last_highlighted,
        last_synced,
        view_url,
        external_id,
        status,
        cover_url
    );
}

#[async_trait]
impl Destination for FakeDestination {
    async fn query_all_pages(&self) -> Result<Vec<DestinationPageRef>> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| {
                Some(DestinationPageRef {
                    external_id: p.fields.external_id.clone()?,
                    page_id: p.page_id.clone(),
                    highlight_count: p.fields.highlight_count.unwrap_or(0),
                    archived: p.archived,
                })
            })
            .collect())
    }

    async fn create_page(&self, fields: &PageFields, blocks: &[Block]) -> Result<String> {
        self.check_write(fields.external_id.as_deref())?;
        let mut pages = self.pages.lock().unwrap();
        let page_id = format!("created-{}", pages.len());
        pages.push(FakePage {
            page_id: page_id.clone(),
            fields: fields.clone(),
            blocks: blocks.to_vec(),
            archived: false,
        });
        Ok(page_id)
    }

    async fn update_page_properties(&self, page_id: &str, fields: &PageFields) -> Result<()> {
        self.check_write(self.external_id_of(page_id).as_deref())?;
        let mut pages = self.pages.lock().unwrap();
        let page = pages
            .iter_mut()
            .find(|p| p.page_id == page_id)
            .ok_or_else(|| Error::Other(format!("no page {}", page_id)))?;
        merge_fields(&mut page.fields, fields);
        Ok(())
    }

    async fn append_blocks(&self, page_id: &str, blocks: &[Block]) -> Result<()> {
        let external_id = self.external_id_of(page_id);
        self.check_write(external_id.as_deref())?;
        if let Some(id) = &external_id {
            if self.rejected_appends.lock().unwrap().contains(id) {
                return Err(Error::Api {
                    service: "notion",
                    status: 400,
                    body: "validation_error".to_string(),
                });
            }
        }
        *self.append_calls.lock().unwrap() += 1;
        let mut pages = self.pages.lock().unwrap();
        let page = pages
            .iter_mut()
            .find(|p| p.page_id == page_id)
            .ok_or_else(|| Error::Other(format!("no page {}", page_id)))?;
        page.blocks.extend_from_slice(blocks);
        Ok(())
    }

    async fn list_quote_texts(&self, page_id: &str) -> Result<Vec<String>> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.page_id == page_id)
            .map(|p| {
                p.blocks
                    .iter()
                    .filter_map(Block::quote_text)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}
