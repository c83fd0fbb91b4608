use super::Source;
use crate::config::{HttpConfig, ReadwiseConfig};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestRateLimiter};
use crate::models::{Category, Highlight, Listing, RejectedEntry, SourceItem};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

const BOOK_REVIEW_URL: &str = "https://readwise.io/bookreview";

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ReadwiseBook {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    num_highlights: u32,
    #[serde(default)]
    last_highlight_at: Option<DateTime<Utc>>,
    #[serde(default)]
    cover_image_url: Option<String>,
    #[serde(default)]
    highlights_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadwiseHighlight {
    id: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    location: Option<i64>,
    #[serde(default)]
    highlighted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
}

/// Decode raw listing entries one by one, keeping the ones that fail aside
fn decode_entries<T, U>(raw: Vec<Value>) -> Listing<U>
where
    T: DeserializeOwned,
    U: From<T>,
{
    let mut listing = Listing::default();

    for value in raw {
        let id = match value.get("id") {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };

        match serde_json::from_value::<T>(value) {
            Ok(entry) => listing.entries.push(U::from(entry)),
            Err(e) => {
                let error = Error::Malformed {
                    service: "readwise",
                    message: e.to_string(),
                };
                warn!(id = id.as_deref().unwrap_or("?"), error = %error, "skipping unreadable entry");
                listing.rejected.push(RejectedEntry {
                    id,
                    error: error.to_string(),
                });
            }
        }
    }

    listing
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<ReadwiseBook> for SourceItem {
    fn from(book: ReadwiseBook) -> Self {
        let view_url = non_empty(book.highlights_url)
            .unwrap_or_else(|| format!("{}/{}", BOOK_REVIEW_URL, book.id));
        let category = book
            .category
            .as_deref()
            .map(|c| c.parse().unwrap_or(Category::Other))
            .unwrap_or(Category::Books);

        SourceItem {
            id: book.id.to_string(),
            title: non_empty(book.title).unwrap_or_else(|| "Untitled".to_string()),
            author: non_empty(book.author),
            category,
            cover_image_url: non_empty(book.cover_image_url),
            num_highlights: book.num_highlights,
            last_highlight_at: book.last_highlight_at,
            view_url,
        }
    }
}

impl From<ReadwiseHighlight> for Highlight {
    fn from(h: ReadwiseHighlight) -> Self {
        Highlight {
            id: h.id,
            text: h.text,
            note: h.note,
            highlighted_at: h.highlighted_at.or(h.updated),
            location: h.location,
        }
    }
}

/// Readwise API (v2) client
pub struct ReadwiseClient {
    http: HttpClient,
    page_size: u32,
}

impl ReadwiseClient {
    pub fn new(config: &ReadwiseConfig, http: &HttpConfig, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Token {}", token))
            .map_err(|_| Error::Config("Readwise token contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let client = HttpClient::new("readwise", &config.base_url, headers, http)?
            .with_rate_limit(RequestRateLimiter::per_minute(config.requests_per_minute));

        Ok(Self {
            http: client,
            page_size: config.page_size,
        })
    }

    /// Follow `next` links until the listing is exhausted
    async fn collect_pages(&self, first: reqwest::RequestBuilder) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut request = first;

        loop {
            let page: Page = self.http.send_json(request).await?;
            all.extend(page.results);

            match page.next.filter(|n| !n.is_empty()) {
                Some(next) => request = self.http.get(self.http.absolute(&next)?),
                None => break,
            }
        }

        Ok(all)
    }
}

#[async_trait]
impl Source for ReadwiseClient {
    async fn list_items_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Listing<SourceItem>> {
        let url = self.http.endpoint("books/")?;
        let mut request = self
            .http
            .get(url)
            .query(&[("page_size", self.page_size.to_string())]);

        if let Some(since) = since {
            let bound = since.to_rfc3339_opts(SecondsFormat::Secs, true);
            info!("Fetching items with highlights since {}", bound);
            request = request.query(&[("last_highlight_at__gt", bound)]);
        } else {
            info!("Fetching all items");
        }

        let raw = self.collect_pages(request).await?;
        let mut listing = decode_entries::<ReadwiseBook, SourceItem>(raw);
        let returned = listing.entries.len();

        // The server-side filter is not always honoured; re-apply it here.
        listing.entries.retain(|item| match since {
            Some(since) => item.last_highlight_at.is_some_and(|at| at >= since),
            None => true,
        });

        if listing.entries.len() < returned {
            debug!(
                returned,
                kept = listing.entries.len(),
                "client-side date filter dropped items"
            );
        }

        Ok(listing)
    }

    async fn list_highlights(&self, item_id: &str) -> Result<Listing<Highlight>> {
        let url = self.http.endpoint("highlights/")?;
        let request = self.http.get(url).query(&[
            ("book_id", item_id.to_string()),
            ("page_size", self.page_size.to_string()),
        ]);

        let raw = self.collect_pages(request).await?;
        let mut listing = decode_entries::<ReadwiseHighlight, Highlight>(raw);
        listing.entries.sort_by(Highlight::chronological);

        debug!(
            item_id,
            count = listing.entries.len(),
            rejected = listing.rejected.len(),
            "fetched highlights"
        );
        Ok(listing)
    }
}
