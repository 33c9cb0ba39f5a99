//! Catalog repository: cache-first reads, remote refresh on miss, and cart
//! writes delegated to the local store.
//!
//! # Read policy
//!
//! - Local store is read first; a non-empty table is served as-is and the
//!   remote catalog is never consulted (no background revalidation, so a
//!   populated cache can go stale until it is replaced)
//! - An empty table triggers a remote fetch; the result is upserted and the
//!   store is read again, so callers always see what was persisted
//! - Remote or store failures never escape: the best available local data
//!   (possibly empty) is emitted and a [`SyncFailure`] is broadcast
//!
//! Cart writes are different: they are local-only and a failure is returned
//! to the caller.

pub mod seed;

use std::fmt;
use std::sync::Arc;

use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, instrument, warn};

use market_core::{CartLine, Category, Product, ProductId, Quantity};

use crate::db::{LocalStore, StoreError};
use crate::error::{add_breadcrumb, report};
use crate::remote::{CatalogApi, RemoteError};

const FAILURE_CHANNEL_CAPACITY: usize = 16;

/// Which read a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEntity {
    Categories,
    Products,
    Search,
}

impl fmt::Display for SyncEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Categories => "categories",
            Self::Products => "products",
            Self::Search => "search",
        })
    }
}

/// Which collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    Remote,
    Store,
}

/// A failure that was downgraded to a cached (possibly empty) emission.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub entity: SyncEntity,
    pub source: FailureSource,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Catalog repository shared by every consumer of the local store.
///
/// Cheaply cloneable; clones share the same store, remote client and failure
/// channel.
#[derive(Clone)]
pub struct CatalogRepository {
    inner: Arc<RepositoryInner>,
}

struct RepositoryInner {
    remote: Arc<dyn CatalogApi>,
    store: Arc<dyn LocalStore>,
    failures: broadcast::Sender<SyncFailure>,
}

impl CatalogRepository {
    #[must_use]
    pub fn new(remote: Arc<dyn CatalogApi>, store: Arc<dyn LocalStore>) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RepositoryInner {
                remote,
                store,
                failures,
            }),
        }
    }

    /// Receive every failure downgraded from now on.
    #[must_use]
    pub fn subscribe_failures(&self) -> broadcast::Receiver<SyncFailure> {
        self.inner.failures.subscribe()
    }

    // =========================================================================
    // Catalog Reads
    // =========================================================================

    /// Categories, cache-first. Emits exactly one list; nothing runs until polled.
    pub fn fetch_categories(&self) -> impl Stream<Item = Vec<Category>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        stream! {
            yield inner.cache_first::<Category>().await;
        }
    }

    /// Products, cache-first. Emits exactly one list; nothing runs until polled.
    pub fn fetch_products(&self) -> impl Stream<Item = Vec<Product>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        stream! {
            yield inner.cache_first::<Product>().await;
        }
    }

    /// Stored products whose name contains `query`, ignoring ASCII case.
    ///
    /// Only the local store is searched; this never reaches the network.
    pub fn search_products(
        &self,
        query: impl Into<String>,
    ) -> impl Stream<Item = Vec<Product>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let query = query.into();
        stream! {
            match inner.store.search_products(&query).await {
                Ok(products) => {
                    debug!(query = %query, count = products.len(), "Search served from local store");
                    yield products;
                }
                Err(e) => {
                    inner.record(SyncEntity::Search, FailureSource::Store, &e);
                    yield Vec::new();
                }
            }
        }
    }

    /// Every stored category, without remote fallback.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read fails.
    pub async fn all_categories(&self) -> Result<Vec<Category>, StoreError> {
        self.inner.store.categories().await
    }

    /// Every stored product, without remote fallback.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read fails.
    pub async fn all_products(&self) -> Result<Vec<Product>, StoreError> {
        self.inner.store.products().await
    }

    /// Upsert the fixed demonstration catalog. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if either batch fails to write.
    #[instrument(skip(self))]
    pub async fn seed_demo_data(&self) -> Result<(), StoreError> {
        let categories = seed::demo_categories();
        let products = seed::demo_products();

        self.inner.store.upsert_categories(&categories).await?;
        self.inner.store.upsert_products(&products).await?;

        info!(
            categories = categories.len(),
            products = products.len(),
            "Seeded demo catalog"
        );
        Ok(())
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// The cart as a continuous stream: the current list first, then the full
    /// list again after every mutation.
    pub fn cart_items(&self) -> impl Stream<Item = Vec<CartLine>> + Send + 'static {
        WatchStream::new(self.inner.store.watch_cart())
    }

    /// The cart as currently persisted.
    #[must_use]
    pub fn cart_snapshot(&self) -> Vec<CartLine> {
        self.inner.store.watch_cart().borrow().clone()
    }

    /// Write a line for `product` with exactly `quantity` (not an increment).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    pub async fn add_to_cart(&self, product: &Product, quantity: Quantity) -> Result<(), StoreError> {
        self.save_cart_line(CartLine::snapshot(product, quantity))
            .await
    }

    /// Write an already-built line, keeping its snapshot fields.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    #[instrument(skip_all, fields(product_id = %line.product_id, quantity = %line.quantity))]
    pub async fn save_cart_line(&self, line: CartLine) -> Result<(), StoreError> {
        add_breadcrumb(
            "cart",
            "Saved cart line",
            Some(&[
                ("product_id", line.product_id.as_str()),
                ("quantity", &line.quantity.to_string()),
            ]),
        );
        self.inner
            .store
            .upsert_cart_line(&line)
            .await
            .inspect_err(|e| report(e, "Cart write failed"))
    }

    /// Remove the line for `product_id`; absent lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<(), StoreError> {
        add_breadcrumb(
            "cart",
            "Removed cart line",
            Some(&[("product_id", product_id.as_str())]),
        );
        let removed = self
            .inner
            .store
            .delete_cart_line(product_id)
            .await
            .inspect_err(|e| report(e, "Cart delete failed"))?;
        if !removed {
            debug!("Product not in cart, nothing to remove");
        }
        Ok(())
    }

    /// Delete every cart line.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), StoreError> {
        add_breadcrumb("cart", "Cleared cart", None);
        self.inner
            .store
            .clear_cart()
            .await
            .inspect_err(|e| report(e, "Cart clear failed"))
    }
}

impl RepositoryInner {
    /// Serve `T` from the store, refreshing from the remote only when empty.
    async fn cache_first<T: CatalogEntity>(&self) -> Vec<T> {
        let store = self.store.as_ref();

        match T::read_local(store).await {
            Ok(local) if !local.is_empty() => {
                debug!(entity = %T::ENTITY, count = local.len(), "Cache hit");
                return local;
            }
            Ok(_) => {}
            Err(e) => {
                self.record(T::ENTITY, FailureSource::Store, &e);
                return Vec::new();
            }
        }

        match T::fetch_remote(self.remote.as_ref()).await {
            Ok(fetched) => {
                info!(entity = %T::ENTITY, count = fetched.len(), "Local cache empty, refreshing from remote");
                if let Err(e) = T::write_local(store, &fetched).await {
                    self.record(T::ENTITY, FailureSource::Store, &e);
                    return Vec::new();
                }
            }
            Err(e) => self.record(T::ENTITY, FailureSource::Remote, &e),
        }

        T::read_local(store).await.unwrap_or_else(|e| {
            self.record(T::ENTITY, FailureSource::Store, &e);
            Vec::new()
        })
    }

    fn record(&self, entity: SyncEntity, source: FailureSource, error: &dyn std::error::Error) {
        warn!(
            entity = %entity,
            source = ?source,
            error = %error,
            "Catalog read degraded, serving local data"
        );
        // No subscribers is fine; the log line above is the signal then
        let _ = self.failures.send(SyncFailure {
            entity,
            source,
            message: error.to_string(),
            occurred_at: Utc::now(),
        });
    }
}

/// A catalog table the repository can serve cache-first.
trait CatalogEntity: Sized + Send + 'static {
    const ENTITY: SyncEntity;

    fn read_local(store: &dyn LocalStore) -> BoxFuture<'_, Result<Vec<Self>, StoreError>>;

    fn fetch_remote(remote: &dyn CatalogApi) -> BoxFuture<'_, Result<Vec<Self>, RemoteError>>;

    fn write_local<'a>(
        store: &'a dyn LocalStore,
        items: &'a [Self],
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

impl CatalogEntity for Category {
    const ENTITY: SyncEntity = SyncEntity::Categories;

    fn read_local(store: &dyn LocalStore) -> BoxFuture<'_, Result<Vec<Self>, StoreError>> {
        store.categories()
    }

    fn fetch_remote(remote: &dyn CatalogApi) -> BoxFuture<'_, Result<Vec<Self>, RemoteError>> {
        remote.get_categories()
    }

    fn write_local<'a>(
        store: &'a dyn LocalStore,
        items: &'a [Self],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        store.upsert_categories(items)
    }
}

impl CatalogEntity for Product {
    const ENTITY: SyncEntity = SyncEntity::Products;

    fn read_local(store: &dyn LocalStore) -> BoxFuture<'_, Result<Vec<Self>, StoreError>> {
        store.products()
    }

    fn fetch_remote(remote: &dyn CatalogApi) -> BoxFuture<'_, Result<Vec<Self>, RemoteError>> {
        remote.get_products()
    }

    fn write_local<'a>(
        store: &'a dyn LocalStore,
        items: &'a [Self],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        store.upsert_products(items)
    }
}
