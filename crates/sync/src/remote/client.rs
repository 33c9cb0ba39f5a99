//! HTTP implementation of [`CatalogApi`].
//!
//! Uses `reqwest` for transport and `serde_json` for decoding. Response
//! bodies are read as text first so failures can be logged with context.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use market_core::{Category, Product};

use super::conversions::{convert_category, convert_products};
use super::types::{RemoteCategory, RemoteProduct};
use super::{CatalogApi, RemoteError};
use crate::config::CatalogConfig;

const MAX_LOGGED_BODY_CHARS: usize = 500;
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Client for the remote catalog HTTP API.
#[derive(Clone)]
pub struct HttpCatalogClient {
    inner: Arc<HttpCatalogClientInner>,
}

struct HttpCatalogClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Config` if the API token is not a valid header
    /// value, or `RemoteError::Http` if the HTTP client cannot be built.
    pub fn new(config: &CatalogConfig) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| RemoteError::Config(format!("invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCatalogClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    /// Full URL for a collection path.
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.inner.base_url)
    }

    /// GET a collection and decode its JSON body.
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let url = self.endpoint(path);
        let response = self.inner.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                url = %url,
                body = %truncate(&body, MAX_LOGGED_BODY_CHARS),
                "Catalog API returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                url = %url,
                body = %truncate(&body, MAX_LOGGED_BODY_CHARS),
                "Failed to parse catalog response"
            );
            RemoteError::Parse(e)
        })
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    #[instrument(skip(self))]
    async fn get_categories(&self) -> Result<Vec<Category>, RemoteError> {
        let records: Vec<RemoteCategory> = self.fetch("categories").await?;
        debug!(count = records.len(), "Fetched remote categories");
        Ok(records.into_iter().map(convert_category).collect())
    }

    #[instrument(skip(self))]
    async fn get_products(&self) -> Result<Vec<Product>, RemoteError> {
        let records: Vec<RemoteProduct> = self.fetch("products").await?;
        debug!(count = records.len(), "Fetched remote products");
        Ok(convert_products(records))
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
