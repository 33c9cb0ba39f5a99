//! Wire records returned by the remote catalog.
//!
//! These mirror the JSON payload exactly and are kept separate from the
//! domain types in `market-core`. Unknown fields are ignored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A category as sent by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCategory {
    pub id: String,
    pub name: String,
}

/// A product as sent by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProduct {
    pub id: String,
    pub name: String,
    /// May be null or missing upstream.
    #[serde(default)]
    pub description: Option<String>,
    pub image: String,
    pub price: Decimal,
    pub category_id: String,
}
