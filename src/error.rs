//! Custom error types for readwise-notion-sync

use thiserror::Error;

/// Main error type for sync operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("State database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{service} rejected the credentials (HTTP {status})")]
    Unauthorized { service: &'static str, status: u16 },

    #[error("{service} API error (HTTP {status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        service: &'static str,
        attempts: u32,
        last_error: String,
    },

    #[error("Malformed {service} response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort the whole run rather than a single item.
    ///
    /// Rejected credentials, an unreachable service, and local state or
    /// configuration failures affect every remaining item, so the run stops
    /// and the watermark is left where it was.
    pub fn is_run_level(&self) -> bool {
        match self {
            Error::Config(_)
            | Error::MissingCredential(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Unauthorized { .. }
            | Error::RetriesExhausted { .. } => true,
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            Error::Api { .. }
            | Error::Malformed { .. }
            | Error::UrlParse(_)
            | Error::Json(_)
            | Error::Other(_) => false,
        }
    }
}

/// Result type alias for readwise-notion-sync
pub type Result<T> = std::result::Result<T, Error>;
