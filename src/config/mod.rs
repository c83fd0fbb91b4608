//! Configuration management for readwise-notion-sync
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Secrets are never stored in the file; it only names the environment
//! variables that hold them.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source service (Readwise) settings
    #[serde(default)]
    pub readwise: ReadwiseConfig,

    /// Destination service (Notion) settings
    #[serde(default)]
    pub notion: NotionConfig,

    /// Transport settings shared by both clients
    #[serde(default)]
    pub http: HttpConfig,

    /// Reconciliation behaviour
    #[serde(default)]
    pub sync: SyncConfig,

    /// Source category → destination select option
    #[serde(default)]
    pub categories: CategoryMap,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Readwise configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadwiseConfig {
    /// API base URL
    #[serde(default = "default_readwise_base_url")]
    pub base_url: String,

    /// Environment variable name for the access token
    #[serde(default = "default_readwise_token_env")]
    pub token_env: String,

    /// Page size for list endpoints
    #[serde(default = "default_readwise_page_size")]
    pub page_size: u32,

    /// Client-side request budget
    #[serde(default = "default_readwise_requests_per_minute")]
    pub requests_per_minute: u32,
}

/// Notion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// API base URL
    #[serde(default = "default_notion_base_url")]
    pub base_url: String,

    /// Environment variable name for the integration token
    #[serde(default = "default_notion_token_env")]
    pub token_env: String,

    /// Target database id; falls back to `database_id_env` when unset
    #[serde(default)]
    pub database_id: Option<String>,

    /// Environment variable name for the target database id
    #[serde(default = "default_notion_database_id_env")]
    pub database_id_env: String,

    /// Notion-Version header
    #[serde(default = "default_notion_api_version")]
    pub api_version: String,

    /// Client-side request budget
    #[serde(default = "default_notion_requests_per_second")]
    pub requests_per_second: u32,

    /// Database property names
    #[serde(default)]
    pub properties: PropertyNames,
}

/// Names of the database properties the sync reads and writes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyNames {
    #[serde(default = "default_property_title")]
    pub title: String,
    #[serde(default = "default_property_author")]
    pub author: String,
    #[serde(default = "default_property_category")]
    pub category: String,
    #[serde(default = "default_property_highlights")]
    pub highlights: String,
    #[serde(default = "default_property_status")]
    pub status: String,
    #[serde(default = "default_property_last_synced")]
    pub last_synced: String,
    #[serde(default = "default_property_last_highlighted")]
    pub last_highlighted: String,
    #[serde(default = "default_property_url")]
    pub url: String,
    /// Join key between Readwise items and pages
    #[serde(default = "default_property_external_id")]
    pub external_id: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Retries for timeouts, connection errors, 429 and 5xx
    #[serde(default = "default_http_max_retries")]
    pub max_retries: u32,
}

/// Reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Extra lower bound: never look further back than this many days
    #[serde(default = "default_days_to_sync")]
    pub days_to_sync: Option<u32>,

    /// Status option set on newly created pages
    #[serde(default = "default_initial_status")]
    pub initial_status: Option<String>,

    /// Do not re-create pages for items that were synced before and have
    /// since disappeared from the database
    #[serde(default = "default_respect_deletions")]
    pub respect_deletions: bool,

    /// Skip new highlights whose text already appears in a quote block on the page
    #[serde(default = "default_dedupe_against_page")]
    pub dedupe_against_page: bool,
}

/// Explicit source category → destination option table.
///
/// A category with no entry is a valid outcome: the page is written with
/// the category property left unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap(BTreeMap<String, String>);

impl CategoryMap {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    /// Destination option for a source category, if mapped
    pub fn resolve(&self, category: &Category) -> Option<&str> {
        self.0
            .get(category.as_str())
            .map(String::as_str)
            .filter(|option| !option.is_empty())
    }
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self(default_category_map())
    }
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for sync state
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to the SQLite state database
    pub db_file: PathBuf,
}

impl Default for ReadwiseConfig {
    fn default() -> Self {
        Self {
            base_url: default_readwise_base_url(),
            token_env: default_readwise_token_env(),
            page_size: default_readwise_page_size(),
            requests_per_minute: default_readwise_requests_per_minute(),
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            base_url: default_notion_base_url(),
            token_env: default_notion_token_env(),
            database_id: None,
            database_id_env: default_notion_database_id_env(),
            api_version: default_notion_api_version(),
            requests_per_second: default_notion_requests_per_second(),
            properties: PropertyNames::default(),
        }
    }
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: default_property_title(),
            author: default_property_author(),
            category: default_property_category(),
            highlights: default_property_highlights(),
            status: default_property_status(),
            last_synced: default_property_last_synced(),
            last_highlighted: default_property_last_highlighted(),
            url: default_property_url(),
            external_id: default_property_external_id(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            max_retries: default_http_max_retries(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            days_to_sync: default_days_to_sync(),
            initial_status: default_initial_status(),
            respect_deletions: default_respect_deletions(),
            dedupe_against_page: default_dedupe_against_page(),
        }
    }
}

impl Config {
    /// Get the default base directory (~/.readwise-notion-sync)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".readwise-notion-sync")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("state.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file yields the defaults, with state kept next to where the
    /// file would be.
    pub fn load(config_path: &Path) -> Result<Self> {
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let mut config = if config_path.exists() {
            debug!("Loading config from {:?}", config_path);
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            debug!("No config file at {:?}, using defaults", config_path);
            Config::default()
        };
        config.apply_env_overrides();

        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("state.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Environment values that win over the file
    fn apply_env_overrides(&mut self) {
        if let Some(days) = days_from_env(std::env::var(DAYS_TO_SYNC_ENV).ok().as_deref()) {
            debug!(days, "{} overrides sync.days_to_sync", DAYS_TO_SYNC_ENV);
            self.sync.days_to_sync = Some(days);
        }
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_config_path())
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);
        Self::load(&config.paths.config_file.clone())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Readwise access token from the environment
    pub fn readwise_token(&self) -> Result<String> {
        read_secret(&self.readwise.token_env)
    }

    /// Notion integration token from the environment
    pub fn notion_token(&self) -> Result<String> {
        read_secret(&self.notion.token_env)
    }

    /// Target database id, from the config file or the environment
    pub fn database_id(&self) -> Result<String> {
        match self.notion.database_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => read_secret(&self.notion.database_id_env),
        }
    }

    /// Status option for new pages, treating an empty string as "none"
    pub fn initial_status(&self) -> Option<&str> {
        self.sync
            .initial_status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.readwise.page_size == 0 {
            return Err(Error::Config(
                "readwise.page_size must be positive".to_string(),
            ));
        }

        if self.readwise.requests_per_minute == 0 {
            return Err(Error::Config(
                "readwise.requests_per_minute must be positive".to_string(),
            ));
        }

        if self.notion.requests_per_second == 0 {
            return Err(Error::Config(
                "notion.requests_per_second must be positive".to_string(),
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(Error::Config(
                "http.timeout_secs must be positive".to_string(),
            ));
        }

        for (name, value) in [
            ("readwise.base_url", &self.readwise.base_url),
            ("notion.base_url", &self.notion.base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }

        if self.notion.properties.external_id.trim().is_empty() {
            return Err(Error::Config(
                "notion.properties.external_id must name a property".to_string(),
            ));
        }

        Ok(())
    }
}

fn days_from_env(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|days| *days > 0)
}

fn read_secret(env_name: &str) -> Result<String> {
    std::env::var(env_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MissingCredential(env_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.notion.api_version, "2022-06-28");
        assert_eq!(config.notion.properties.external_id, "Readwise ID");
        assert_eq!(config.notion.requests_per_second, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.notion.database_id = Some("db-123".to_string());
        config.sync.respect_deletions = true;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.notion.database_id.as_deref(), Some("db-123"));
        assert!(loaded.sync.respect_deletions);
        assert_eq!(loaded.paths.db_file, tmp.path().join("state.db"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config.categories, CategoryMap::default());
        assert_eq!(config.paths.db_file, tmp.path().join("state.db"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[notion.properties]
title = "Name"

[categories]
books = "Book"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.notion.properties.title, "Name");
        assert_eq!(config.notion.properties.highlights, "Highlights");
        assert_eq!(config.categories.resolve(&Category::Books), Some("Book"));
        assert_eq!(config.categories.resolve(&Category::Articles), None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.notion.requests_per_second = 0;
        assert!(config.validate().is_err());
        config.notion.requests_per_second = 3;

        config.readwise.requests_per_minute = 0;
        assert!(config.validate().is_err());
        config.readwise.requests_per_minute = 20;

        config.http.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.http.timeout_secs = 30;

        config.notion.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_days_to_sync_env_value_parsing() {
        assert_eq!(days_from_env(Some(" 7 ")), Some(7));
        assert_eq!(days_from_env(Some("0")), None);
        assert_eq!(days_from_env(Some("soon")), None);
        assert_eq!(days_from_env(None), None);
    }

    #[test]
    fn test_defaults_do_not_cap_days() {
        assert_eq!(Config::default().sync.days_to_sync, None);
        assert_eq!(SyncConfig::default().days_to_sync, None);
    }

    #[test]
    fn test_category_map_defaults() {
        let map = CategoryMap::default();
        assert_eq!(map.resolve(&Category::Tweets), Some("Quote"));
        assert_eq!(map.resolve(&Category::Supplementals), Some("Articles"));
        assert_eq!(map.resolve(&Category::Other), None);
    }

    #[test]
    fn test_database_id_prefers_config_value() {
        let mut config = Config::default();
        config.notion.database_id = Some("  from-file  ".to_string());
        assert_eq!(config.database_id().unwrap(), "from-file");

        config.notion.database_id = None;
        config.notion.database_id_env = "RNS_TEST_UNSET_DATABASE_ID".to_string();
        assert!(matches!(
            config.database_id(),
            Err(Error::MissingCredential(_))
        ));
    }

    #[test]
    fn test_empty_initial_status_means_none() {
        let mut config = Config::default();
        assert_eq!(config.initial_status(), Some("Not started"));
        config.sync.initial_status = Some("  ".to_string());
        assert_eq!(config.initial_status(), None);
    }
}
