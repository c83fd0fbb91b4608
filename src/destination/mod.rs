//! Destination side of the sync
//!
//! This module provides:
//! - The [`Destination`] trait the reconciliation engine writes through
//! - The Notion database implementation
//! - JSON rendering for Notion properties and blocks

mod notion;
pub mod render;

pub use notion::*;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Block, DestinationPageRef, PageFields};
use async_trait::async_trait;

/// Trait for the database mirroring source items
#[async_trait]
pub trait Destination: Send + Sync {
    /// Every page in the database that carries an external id
    async fn query_all_pages(&self) -> Result<Vec<DestinationPageRef>>;

    /// Create a page with properties and body; returns the page id
    async fn create_page(&self, fields: &PageFields, blocks: &[Block]) -> Result<String>;

    /// Overwrite the properties that are set in `fields`
    async fn update_page_properties(&self, page_id: &str, fields: &PageFields) -> Result<()>;

    /// Append blocks to the end of a page body
    async fn append_blocks(&self, page_id: &str, blocks: &[Block]) -> Result<()>;

    /// Text of every top-level quote block on a page
    async fn list_quote_texts(&self, page_id: &str) -> Result<Vec<String>>;
}

/// Create the destination client from configuration
pub fn create_destination(config: &Config) -> Result<Box<dyn Destination>> {
    let token = config.notion_token()?;
    let database_id = config.database_id()?;
    let client = NotionClient::new(&config.notion, &config.http, &token, &database_id)?;
    Ok(Box::new(client))
}
