//! Local store: the persistent cache every read in the system goes through.
//!
//! # Database: SQLite (file or in-memory)
//!
//! ## Tables
//!
//! - `categories` - Categories mirrored from the remote catalog
//! - `products` - Products mirrored from the remote catalog
//! - `cart` - Local-only shopping cart lines (never pushed remotely)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/sync/migrations/`, embedded at compile
//! time and applied by [`SqliteStore::open`] / [`SqliteStore::from_pool`].

pub mod cart;
pub mod catalog;
mod sqlite;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;
use tokio::sync::watch;

use market_core::{CartLine, Category, Product, ProductId};

pub use cart::CartQueries;
pub use catalog::CatalogQueries;
pub use sqlite::SqliteStore;

/// Errors that can occur during local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Contract of the local persistent store.
///
/// Catalog tables are upsert-replace keyed by id and only ever grow. The cart
/// is keyed by product id and publishes its full contents to every watcher
/// after each mutation.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Insert or fully overwrite categories by id.
    async fn upsert_categories(&self, categories: &[Category]) -> Result<(), StoreError>;

    /// Insert or fully overwrite products by id.
    async fn upsert_products(&self, products: &[Product]) -> Result<(), StoreError>;

    /// Every stored category.
    async fn categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Every stored product.
    async fn products(&self) -> Result<Vec<Product>, StoreError>;

    /// Products whose name contains `query`, ignoring ASCII case only
    /// (`"CAFÉ"` does not find `"café"`). Empty matches all.
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, StoreError>;

    /// Every cart line.
    async fn cart_lines(&self) -> Result<Vec<CartLine>, StoreError>;

    /// Insert or fully overwrite the line for `line.product_id`.
    async fn upsert_cart_line(&self, line: &CartLine) -> Result<(), StoreError>;

    /// Delete the line for `product_id`. Returns `false` if there was none.
    async fn delete_cart_line(&self, product_id: &ProductId) -> Result<bool, StoreError>;

    /// Delete every cart line.
    async fn clear_cart(&self) -> Result<(), StoreError>;

    /// Subscribe to the cart. The receiver always holds the full current list.
    fn watch_cart(&self) -> watch::Receiver<Vec<CartLine>>;
}

/// Create a SQLite connection pool with sensible defaults.
///
/// In-memory databases live only as long as their connection, so they get a
/// single connection that is never recycled.
///
/// # Arguments
///
/// * `database_url` - SQLite connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    if is_in_memory(url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
    } else {
        SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options.journal_mode(SqliteJournalMode::Wal))
            .await
    }
}

/// Apply the embedded schema migrations.
///
/// # Errors
///
/// Returns `StoreError::Migration` if a migration fails to apply.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
