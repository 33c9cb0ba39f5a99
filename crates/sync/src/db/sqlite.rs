//! SQLite-backed [`LocalStore`].

use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tracing::instrument;

use market_core::{CartLine, Category, Product, ProductId};

use super::{CartQueries, CatalogQueries, LocalStore, StoreError, create_pool, run_migrations};

/// Local store on top of a SQLite pool.
///
/// Cart mutations re-read the cart table and publish the full list to every
/// subscriber of [`LocalStore::watch_cart`].
pub struct SqliteStore {
    pool: SqlitePool,
    cart: watch::Sender<Vec<CartLine>>,
}

impl SqliteStore {
    /// Connect to `database_url`, apply migrations and load the current cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the connection, a migration or the cart read fails.
    pub async fn open(database_url: &SecretString) -> Result<Self, StoreError> {
        let pool = create_pool(database_url).await?;
        Self::from_pool(pool).await
    }

    /// A fresh, private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be created.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::open(&SecretString::from("sqlite::memory:")).await
    }

    /// Wrap an existing pool, applying migrations first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a migration or the initial cart read fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        run_migrations(&pool).await?;
        let lines = CartQueries::new(&pool).all().await?;
        let (cart, _) = watch::channel(lines);
        Ok(Self { pool, cart })
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn publish_cart(&self) -> Result<(), StoreError> {
        let lines = self.cart_lines().await?;
        tracing::debug!(lines = lines.len(), "Publishing cart");
        self.cart.send_replace(lines);
        Ok(())
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn upsert_categories(&self, categories: &[Category]) -> Result<(), StoreError> {
        CatalogQueries::new(&self.pool)
            .upsert_categories(categories)
            .await
    }

    async fn upsert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        CatalogQueries::new(&self.pool).upsert_products(products).await
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        CatalogQueries::new(&self.pool).categories().await
    }

    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        CatalogQueries::new(&self.pool).products().await
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>, StoreError> {
        CatalogQueries::new(&self.pool).search_products(query).await
    }

    async fn cart_lines(&self) -> Result<Vec<CartLine>, StoreError> {
        CartQueries::new(&self.pool).all().await
    }

    #[instrument(skip_all, fields(product_id = %line.product_id))]
    async fn upsert_cart_line(&self, line: &CartLine) -> Result<(), StoreError> {
        CartQueries::new(&self.pool).upsert(line).await?;
        self.publish_cart().await
    }

    #[instrument(skip(self))]
    async fn delete_cart_line(&self, product_id: &ProductId) -> Result<bool, StoreError> {
        let removed = CartQueries::new(&self.pool).delete(product_id).await?;
        if removed {
            self.publish_cart().await?;
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), StoreError> {
        CartQueries::new(&self.pool).clear().await?;
        self.publish_cart().await
    }

    fn watch_cart(&self) -> watch::Receiver<Vec<CartLine>> {
        self.cart.subscribe()
    }
}
