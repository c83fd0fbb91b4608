//! Shared HTTP plumbing for the Readwise and Notion clients
//!
//! Both services are reached through [`HttpClient`], which owns the
//! retry/backoff policy for transient failures and maps HTTP statuses onto
//! the crate's error taxonomy. Transient failures never reach the
//! reconciliation engine unless every retry has been used.

mod rate_limit;

pub use rate_limit::*;

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_RETRY_AFTER_SECS: u64 = 60;

pub struct HttpClient {
    client: Client,
    base_url: Url,
    service: &'static str,
    max_retries: u32,
    backoff: Duration,
    limiter: Option<RequestRateLimiter>,
}

impl HttpClient {
    /// Build a client for `service` rooted at `base_url`.
    ///
    /// `headers` are sent with every request (authorization, API version).
    pub fn new(
        service: &'static str,
        base_url: &str,
        headers: HeaderMap,
        config: &HttpConfig,
    ) -> Result<Self> {
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            service,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(500),
            limiter: None,
        })
    }

    /// Cap the request rate of this client
    pub fn with_rate_limit(mut self, limiter: RequestRateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Override the base delay between retries
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Resolve a path relative to the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|e| {
            Error::Config(format!("Invalid {} endpoint '{}': {}", self.service, path, e))
        })
    }

    /// Parse an absolute URL returned by the service (pagination links)
    pub fn absolute(&self, url: &str) -> Result<Url> {
        Ok(Url::parse(url)?)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url)
    }

    pub fn patch(&self, url: Url) -> RequestBuilder {
        self.client.patch(url)
    }

    /// Send a request, retrying transient failures, and decode the JSON body.
    ///
    /// Timeouts, connection errors, 429 and 5xx are retried with exponential
    /// backoff (429 honours `Retry-After`). 401/403 become
    /// [`Error::Unauthorized`], other 4xx become [`Error::Api`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_for(attempt);
                warn!(
                    service = self.service,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }

            if let Some(limiter) = &self.limiter {
                limiter.wait().await;
            }

            let req = request.try_clone().ok_or_else(|| {
                Error::Other(format!("Failed to clone {} request", self.service))
            })?;

            let response = match req.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_error = e.to_string();
                    continue;
                }
                Err(e) => return Err(Error::Http(e)),
            };

            let status = response.status();
            debug!(service = self.service, %status, url = %response.url(), "response");

            if status.is_success() {
                let body = response.text().await?;
                return serde_json::from_str(&body).map_err(|e| Error::Malformed {
                    service: self.service,
                    message: e.to_string(),
                });
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(wait) = retry_after(response.headers()) {
                    warn!(service = self.service, wait, "rate-limited, waiting Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            let body = response.text().await.unwrap_or_default();

            if status.is_server_error() {
                last_error = format!("{}: {}", status, body);
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(Error::Unauthorized {
                    service: self.service,
                    status: status.as_u16(),
                });
            }

            return Err(Error::Api {
                service: self.service,
                status: status.as_u16(),
                body,
            });
        }

        Err(Error::RetriesExhausted {
            service: self.service,
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt - 1).min(16);
        std::cmp::min(self.backoff.saturating_mul(factor), MAX_BACKOFF)
    }
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.min(MAX_RETRY_AFTER_SECS))
}
