//! Domain types shared by the source client, the destination client and the
//! reconciliation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Content category as reported by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Books,
    Articles,
    Tweets,
    Podcasts,
    Supplementals,
    #[serde(other)]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Books => "books",
            Category::Articles => "articles",
            Category::Tweets => "tweets",
            Category::Podcasts => "podcasts",
            Category::Supplementals => "supplementals",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "books" => Category::Books,
            "articles" => Category::Articles,
            "tweets" => Category::Tweets,
            "podcasts" => Category::Podcasts,
            "supplementals" => Category::Supplementals,
            _ => Category::Other,
        })
    }
}

/// One highlighted unit of content (book, article, tweet, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    /// Stable source identifier, used as the join key
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub category: Category,
    pub cover_image_url: Option<String>,
    /// Highlight count as reported by the source
    pub num_highlights: u32,
    pub last_highlight_at: Option<DateTime<Utc>>,
    /// Where the item can be viewed at the source
    pub view_url: String,
}

/// One quoted passage plus an optional note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: i64,
    pub text: String,
    pub note: Option<String>,
    pub highlighted_at: Option<DateTime<Utc>>,
    /// Position inside the source document, when known
    pub location: Option<i64>,
}

impl Highlight {
    /// Chronological order: timestamp, then location, then id
    pub fn chronological(a: &Highlight, b: &Highlight) -> Ordering {
        a.highlighted_at
            .cmp(&b.highlighted_at)
            .then_with(|| a.location.cmp(&b.location))
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// A listing entry the source returned but that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEntry {
    /// Identifier found in the raw entry, if it had a readable one
    pub id: Option<String>,
    pub error: String,
}

/// Decoded entries of one source listing, plus the entries that were skipped
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub entries: Vec<T>,
    pub rejected: Vec<RejectedEntry>,
}

impl<T> Listing<T> {
    pub fn new(entries: Vec<T>) -> Self {
        Self {
            entries,
            rejected: Vec::new(),
        }
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// What the destination database knows about one mirrored item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPageRef {
    pub external_id: String,
    pub page_id: String,
    /// Last recorded highlight count (missing values read as 0)
    pub highlight_count: u32,
    /// Archived or trashed pages do not count as existing
    pub archived: bool,
}

/// Page properties to write. `None` leaves a property untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub highlight_count: Option<u32>,
    pub last_highlighted: Option<DateTime<Utc>>,
    pub last_synced: Option<DateTime<Utc>>,
    pub view_url: Option<String>,
    pub external_id: Option<String>,
    pub status: Option<String>,
    /// Used as both page icon and page cover
    pub cover_url: Option<String>,
}

/// Body content appended to a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Quote { text: String, children: Vec<Block> },
    Callout { text: String, emoji: String },
}

impl Block {
    pub fn quote_text(&self) -> Option<&str> {
        match self {
            Block::Quote { text, .. } => Some(text),
            Block::Callout { .. } => None,
        }
    }
}
