//! Default values for configuration

use std::collections::BTreeMap;

/// Default Readwise API base URL (v2)
pub fn default_readwise_base_url() -> String {
    std::env::var("READWISE_API_BASE").unwrap_or_else(|_| "https://readwise.io/api/v2/".to_string())
}

/// Default environment variable holding the Readwise access token
pub fn default_readwise_token_env() -> String {
    "READWISE_TOKEN".to_string()
}

/// Default page size for Readwise list endpoints (API maximum)
pub fn default_readwise_page_size() -> u32 {
    1000
}

/// Default Notion API base URL
pub fn default_notion_base_url() -> String {
    std::env::var("NOTION_API_BASE").unwrap_or_else(|_| "https://api.notion.com/v1/".to_string())
}

/// Readwise allows 20 requests per minute on its list endpoints
pub fn default_readwise_requests_per_minute() -> u32 {
    20
}

/// Default environment variable holding the Notion integration token
pub fn default_notion_token_env() -> String {
    "NOTION_TOKEN".to_string()
}

/// Default environment variable holding the target database id
pub fn default_notion_database_id_env() -> String {
    "NOTION_DATABASE_ID".to_string()
}

/// Notion-Version header sent with every request
pub fn default_notion_api_version() -> String {
    "2022-06-28".to_string()
}

/// Notion's documented average rate limit
pub fn default_notion_requests_per_second() -> u32 {
    3
}

/// Default request timeout in seconds
pub fn default_http_timeout() -> u64 {
    30
}

/// Default number of retries for transient failures
pub fn default_http_max_retries() -> u32 {
    3
}

/// No day cap unless configured or DAYS_TO_SYNC is set at load time
pub fn default_days_to_sync() -> Option<u32> {
    None
}

/// Environment variable that overrides `sync.days_to_sync`
pub const DAYS_TO_SYNC_ENV: &str = "DAYS_TO_SYNC";

/// Status given to newly created pages
pub fn default_initial_status() -> Option<String> {
    Some("Not started".to_string())
}

/// Skip re-creating pages the user deleted
pub fn default_respect_deletions() -> bool {
    false
}

/// Compare new highlights against quote blocks already on the page
pub fn default_dedupe_against_page() -> bool {
    false
}

pub fn default_property_title() -> String {
    "Title".to_string()
}

pub fn default_property_author() -> String {
    "Author".to_string()
}

pub fn default_property_category() -> String {
    "Category".to_string()
}

pub fn default_property_highlights() -> String {
    "Highlights".to_string()
}

pub fn default_property_status() -> String {
    "Status".to_string()
}

pub fn default_property_last_synced() -> String {
    "Last Synced".to_string()
}

pub fn default_property_last_highlighted() -> String {
    "Last Highlighted".to_string()
}

pub fn default_property_url() -> String {
    "URL".to_string()
}

pub fn default_property_external_id() -> String {
    "Readwise ID".to_string()
}

/// Readwise category → Notion select option
pub fn default_category_map() -> BTreeMap<String, String> {
    [
        ("books", "Books"),
        ("articles", "Articles"),
        ("tweets", "Quote"),
        ("podcasts", "Podcast"),
        ("supplementals", "Articles"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
