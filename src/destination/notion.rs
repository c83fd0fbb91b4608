use super::render::{self, MAX_BLOCKS_PER_REQUEST};
use super::Destination;
use crate::config::{HttpConfig, NotionConfig, PropertyNames};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestRateLimiter};
use crate::models::{Block, DestinationPageRef, PageFields};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

const QUERY_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

/// Notion API client bound to one database
pub struct NotionClient {
    http: HttpClient,
    database_id: String,
    properties: PropertyNames,
}

impl NotionClient {
    pub fn new(
        config: &NotionConfig,
        http: &HttpConfig,
        token: &str,
        database_id: &str,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| Error::Config("Notion token contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let version = HeaderValue::from_str(&config.api_version)
            .map_err(|_| Error::Config(format!("Invalid Notion-Version '{}'", config.api_version)))?;
        headers.insert(HeaderName::from_static("notion-version"), version);

        let client = HttpClient::new("notion", &config.base_url, headers, http)?
            .with_rate_limit(RequestRateLimiter::new(config.requests_per_second));

        Ok(Self {
            http: client,
            database_id: database_id.to_string(),
            properties: config.properties.clone(),
        })
    }

    async fn append_chunk(&self, block_id: &str, blocks: &[Block]) -> Result<()> {
        let url = self.http.endpoint(&format!("blocks/{}/children", block_id))?;
        let children: Vec<Value> = blocks.iter().map(render::block).collect();
        let _: Value = self
            .http
            .send_json(self.http.patch(url).json(&json!({ "children": children })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Destination for NotionClient {
    async fn query_all_pages(&self) -> Result<Vec<DestinationPageRef>> {
        let url = self
            .http
            .endpoint(&format!("databases/{}/query", self.database_id))?;

        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response: ListResponse = self
                .http
                .send_json(self.http.post(url.clone()).json(&body))
                .await?;

            for page in &response.results {
                match render::page_ref(page, &self.properties) {
                    Some(page_ref) => pages.push(page_ref),
                    None => {
                        let page_id = page.get("id").and_then(Value::as_str).unwrap_or("?");
                        debug!(page_id, "page has no external id, ignoring");
                    }
                }
            }

            match response.next_cursor.filter(|_| response.has_more) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(count = pages.len(), "queried destination pages");
        Ok(pages)
    }

    async fn create_page(&self, fields: &PageFields, blocks: &[Block]) -> Result<String> {
        let url = self.http.endpoint("pages")?;
        let (first, rest) = blocks.split_at(blocks.len().min(MAX_BLOCKS_PER_REQUEST));

        let mut body = Map::new();
        body.insert(
            "parent".to_string(),
            json!({ "database_id": self.database_id }),
        );
        body.insert(
            "properties".to_string(),
            render::properties(fields, &self.properties),
        );
        render::apply_cover(&mut body, fields);
        body.insert(
            "children".to_string(),
            Value::Array(first.iter().map(render::block).collect()),
        );

        let created: CreatedPage = self
            .http
            .send_json(self.http.post(url).json(&Value::Object(body)))
            .await?;

        if !rest.is_empty() {
            self.append_blocks(&created.id, rest).await?;
        }

        Ok(created.id)
    }

    async fn update_page_properties(&self, page_id: &str, fields: &PageFields) -> Result<()> {
        let url = self.http.endpoint(&format!("pages/{}", page_id))?;

        let mut body = Map::new();
        body.insert(
            "properties".to_string(),
            render::properties(fields, &self.properties),
        );
        render::apply_cover(&mut body, fields);

        let _: Value = self
            .http
            .send_json(self.http.patch(url).json(&Value::Object(body)))
            .await?;
        Ok(())
    }

    async fn append_blocks(&self, page_id: &str, blocks: &[Block]) -> Result<()> {
        for chunk in blocks.chunks(MAX_BLOCKS_PER_REQUEST) {
            self.append_chunk(page_id, chunk).await?;
        }
        Ok(())
    }

    async fn list_quote_texts(&self, page_id: &str) -> Result<Vec<String>> {
        let url = self.http.endpoint(&format!("blocks/{}/children", page_id))?;

        let mut texts = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(url.clone())
                .query(&[("page_size", QUERY_PAGE_SIZE.to_string())]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("start_cursor", cursor)]);
            }

            let response: ListResponse = self.http.send_json(request).await?;
            texts.extend(response.results.iter().filter_map(render::quote_text));

            match response.next_cursor.filter(|_| response.has_more) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(texts)
    }
}
