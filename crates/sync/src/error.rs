//! Unified error handling with Sentry integration.
//!
//! Each layer has its own error type; [`MarketError`] aggregates them for
//! callers that wire the whole library together. Failures that are
//! downgraded rather than returned go through [`report`] so they still reach
//! Sentry and the logs.

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::StoreError;
use crate::remote::RemoteError;

/// Library-level error type.
#[derive(Debug, Error)]
pub enum MarketError {
    /// Local store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Remote catalog operation failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for `MarketError`.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Capture an error to Sentry and log it.
///
/// Without an initialised Sentry client the capture is a no-op and only the
/// log line remains.
pub fn report(error: &(dyn std::error::Error + 'static), context: &str) {
    let event_id = sentry::capture_error(error);
    tracing::error!(
        error = %error,
        sentry_event_id = %event_id,
        "{context}"
    );
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "101")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
