use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tidytags_core::{Link, RecordId, Tag};
use tracing::{debug, info_span, warn, Instrument};

const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}: {body}")]
    HttpStatus { status: u16, url: String, body: String },
    #[error("undecodable response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 404, .. })
    }
}

/// The read/replace/delete surface of a bookmark store.
///
/// Writes always carry a complete record; the store has no partial update.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError>;

    async fn list_links(&self, tag_id: Option<&RecordId>) -> Result<Vec<Link>, StoreError>;

    async fn get_link(&self, id: &RecordId) -> Result<Link, StoreError>;

    /// Replace the full record. Returns the store's echo of the written
    /// link when the response carries one.
    async fn replace_link(&self, link: &Link) -> Result<Option<Link>, StoreError>;

    async fn delete_tag(&self, id: &RecordId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct StoreClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl StoreClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl StoreClient {
    pub fn new(config: StoreClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, method: Method, url: &str, builder: RequestBuilder) -> Result<Response, StoreError> {
        let span = info_span!("store_request", %method, url);
        async move {
            let response = builder.send().await?;
            let status = response.status();
            debug!(status = status.as_u16(), "store responded");
            if status.is_success() {
                return Ok(response);
            }
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            })
        }
        .instrument(span)
        .await
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<JsonValue, StoreError> {
        let mut builder = self.request(Method::GET, url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let response = self.send(Method::GET, url, builder).await?;
        read_json(url, response).await
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        match self.get_json(url, query).await {
            Ok(body) => Ok(decode_collection(url, body)),
            Err(StoreError::Decode { source, .. }) => {
                warn!(url, error = %source, "collection response is not JSON; treating as empty");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl BookmarkStore for StoreClient {
    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        self.get_collection(&self.url("/tags"), &[]).await
    }

    async fn list_links(&self, tag_id: Option<&RecordId>) -> Result<Vec<Link>, StoreError> {
        let query: Vec<(&str, String)> = tag_id.map(|id| ("tagId", id.to_string())).into_iter().collect();
        self.get_collection(&self.url("/links"), &query).await
    }

    async fn get_link(&self, id: &RecordId) -> Result<Link, StoreError> {
        let url = self.url(&format!("/links/{id}"));
        let body = self.get_json(&url, &[]).await?;
        serde_json::from_value(unwrap_record(body)).map_err(|source| StoreError::Decode { url, source })
    }

    async fn replace_link(&self, link: &Link) -> Result<Option<Link>, StoreError> {
        let url = self.url(&format!("/links/{}", link.id));
        let builder = self.request(Method::PUT, &url).json(link);
        let response = self.send(Method::PUT, &url, builder).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let echoed = serde_json::from_str::<JsonValue>(&body)
            .ok()
            .and_then(|value| serde_json::from_value(unwrap_record(value)).ok());
        Ok(echoed)
    }

    async fn delete_tag(&self, id: &RecordId) -> Result<(), StoreError> {
        let url = self.url(&format!("/tags/{id}"));
        self.send(Method::DELETE, &url, self.request(Method::DELETE, &url))
            .await?;
        Ok(())
    }
}

async fn read_json(url: &str, response: Response) -> Result<JsonValue, StoreError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Bare array or `{"response": [...]}`. Anything else degrades to an empty
/// collection.
fn decode_collection<T: DeserializeOwned>(url: &str, body: JsonValue) -> Vec<T> {
    let items = match body {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut envelope) => match envelope.remove("response") {
            Some(JsonValue::Array(items)) => items,
            _ => {
                warn!(url, "response is neither an array nor an envelope; treating as empty");
                return Vec::new();
            }
        },
        _ => {
            warn!(url, "response is neither an array nor an envelope; treating as empty");
            return Vec::new();
        }
    };
    match serde_json::from_value(JsonValue::Array(items)) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(url, error = %err, "collection items did not decode; treating as empty");
            Vec::new()
        }
    }
}

fn unwrap_record(body: JsonValue) -> JsonValue {
    match body {
        JsonValue::Object(mut map) if !map.contains_key("id") && map.contains_key("response") => {
            map.remove("response").unwrap_or(JsonValue::Null)
        }
        other => other,
    }
}

fn truncate(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
