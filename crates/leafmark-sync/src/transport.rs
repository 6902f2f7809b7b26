//! Remote transport for the sync protocol.
//!
//! [`SyncTransport`] is the seam the pipeline talks through; the reqwest
//! implementation maps onto the three server endpoints. Retry/backoff policy
//! lives with the caller — every method performs at most one request.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::models::Uid;
use crate::wire::{BookmarkPayload, ChangeBatch, InventoryPage, InventoryPageRequest};

/// Remote endpoints consumed by one reconciliation pass.
///
/// Every call either fully succeeds or fails the pass; no partial results
/// are consumed.
#[allow(async_fn_in_trait)]
pub trait SyncTransport {
    /// One page of the lightweight inventory listing
    async fn fetch_inventory_page(&self, request: &InventoryPageRequest) -> Result<InventoryPage>;

    /// Full payload bodies for a set of uids
    async fn fetch_bookmarks(&self, uids: &[Uid]) -> Result<Vec<BookmarkPayload>>;

    /// Submit the batched mutation request; the response body is ignored
    async fn submit_changes(&self, batch: &ChangeBatch) -> Result<()>;
}

const INVENTORY_PATH: &str = "sync/bookmarks.lite.paged";
const PAYLOAD_PATH: &str = "sync/bookmarks";
const UPDATE_PATH: &str = "sync/update.bookmarks";

/// HTTP/JSON implementation of [`SyncTransport`].
///
/// Session cookies and the CSRF token are supplied by the embedding
/// application's auth layer; this client only attaches them.
#[derive(Clone)]
pub struct HttpSyncTransport {
    base_url: String,
    client: reqwest::Client,
    csrf_token: Option<String>,
}

impl HttpSyncTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_endpoint(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
            csrf_token: None,
        })
    }

    /// Attach the CSRF token sent with the mutation request
    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post_json<B, R>(&self, request: reqwest::RequestBuilder, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let response = request
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Api(parse_api_error(status, &body)));
        }

        Ok(response.json::<R>().await?)
    }
}

impl SyncTransport for HttpSyncTransport {
    async fn fetch_inventory_page(&self, request: &InventoryPageRequest) -> Result<InventoryPage> {
        self.post_json(self.client.post(self.url(INVENTORY_PATH)), request)
            .await
    }

    async fn fetch_bookmarks(&self, uids: &[Uid]) -> Result<Vec<BookmarkPayload>> {
        self.post_json(self.client.post(self.url(PAYLOAD_PATH)), &uids)
            .await
    }

    async fn submit_changes(&self, batch: &ChangeBatch) -> Result<()> {
        let mut request = self
            .client
            .post(self.url(UPDATE_PATH))
            .header("Referer", self.url(INVENTORY_PATH));
        if let Some(token) = &self.csrf_token {
            request = request.header("X-CSRFToken", token);
        }

        let response = request.json(batch).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = raw.trim();
    if endpoint.is_empty() {
        return Err(SyncError::InvalidConfiguration(
            "endpoint must not be empty".to_string(),
        ));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(SyncError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
