//! Remote catalog client.
//!
//! # Architecture
//!
//! - Two read-only, full-collection fetches: categories and products
//! - The remote catalog is only consulted when the local store is empty;
//!   this module knows nothing about caching
//! - Failures are returned as [`RemoteError`], never panics
//!
//! # Example
//!
//! ```rust,ignore
//! use market_sync::remote::{CatalogApi, HttpCatalogClient};
//!
//! let client = HttpCatalogClient::new(&config.catalog)?;
//! let categories = client.get_categories().await?;
//! ```

mod client;
pub mod conversions;
pub mod types;

pub use client::HttpCatalogClient;
pub use types::{RemoteCategory, RemoteProduct};

use async_trait::async_trait;
use thiserror::Error;

use market_core::{Category, Product};

/// Errors that can occur when talking to the remote catalog.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Rate limited by the server.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The client could not be constructed from its configuration.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// Read-only access to the remote catalog.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetch every category.
    async fn get_categories(&self) -> Result<Vec<Category>, RemoteError>;

    /// Fetch every product.
    async fn get_products(&self) -> Result<Vec<Product>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "server returned 503: maintenance");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = RemoteError::RateLimited(60);
        assert_eq!(err.to_string(), "rate limited, retry after 60 seconds");
    }
}
