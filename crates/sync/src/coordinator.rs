//! View-state coordinator.
//!
//! Holds the observable state a presentation layer renders from: categories,
//! products, the joined product view, the cart and the last catalog-load
//! error. Every field lives in a `watch` channel; the coordinator is the only
//! writer and each transition replaces the whole collection.

use std::pin::pin;

use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, instrument, warn};

use market_core::{
    CartLine, CartSummary, Category, Product, ProductId, ProductView, Quantity, join_products,
};

use crate::db::StoreError;
use crate::error::report;
use crate::repository::{CatalogRepository, SyncFailure};

/// Observable catalog and cart state driven through explicit operations.
pub struct CatalogCoordinator {
    repository: CatalogRepository,
    categories: watch::Sender<Vec<Category>>,
    products: watch::Sender<Vec<Product>>,
    products_with_category: watch::Sender<Vec<ProductView>>,
    cart: watch::Sender<Vec<CartLine>>,
    last_error: watch::Sender<Option<String>>,
    /// Held across lookup, write and reload by every cart mutation.
    cart_writes: Mutex<()>,
}

/// One emission of a catalog read plus the first failure reported with it.
struct Emission<T> {
    items: Option<Vec<T>>,
    failure: Option<String>,
}

impl<T> Emission<T> {
    /// Whether the emission may replace held state.
    ///
    /// An empty list that came with a failure is a fallback, not data.
    fn usable(&self) -> bool {
        self.items
            .as_ref()
            .is_some_and(|items| !items.is_empty() || self.failure.is_none())
    }
}

impl CatalogCoordinator {
    #[must_use]
    pub fn new(repository: CatalogRepository) -> Self {
        Self {
            repository,
            categories: watch::Sender::new(Vec::new()),
            products: watch::Sender::new(Vec::new()),
            products_with_category: watch::Sender::new(Vec::new()),
            cart: watch::Sender::new(Vec::new()),
            last_error: watch::Sender::new(None),
            cart_writes: Mutex::new(()),
        }
    }

    // =========================================================================
    // Observers
    // =========================================================================

    #[must_use]
    pub fn subscribe_categories(&self) -> watch::Receiver<Vec<Category>> {
        self.categories.subscribe()
    }

    #[must_use]
    pub fn subscribe_products(&self) -> watch::Receiver<Vec<Product>> {
        self.products.subscribe()
    }

    #[must_use]
    pub fn subscribe_products_with_category(&self) -> watch::Receiver<Vec<ProductView>> {
        self.products_with_category.subscribe()
    }

    #[must_use]
    pub fn subscribe_cart(&self) -> watch::Receiver<Vec<CartLine>> {
        self.cart.subscribe()
    }

    #[must_use]
    pub fn subscribe_last_error(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    #[must_use]
    pub fn categories_snapshot(&self) -> Vec<Category> {
        self.categories.borrow().clone()
    }

    #[must_use]
    pub fn products_snapshot(&self) -> Vec<Product> {
        self.products.borrow().clone()
    }

    #[must_use]
    pub fn products_with_category_snapshot(&self) -> Vec<ProductView> {
        self.products_with_category.borrow().clone()
    }

    #[must_use]
    pub fn cart_snapshot(&self) -> Vec<CartLine> {
        self.cart.borrow().clone()
    }

    #[must_use]
    pub fn last_error_snapshot(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Item count and subtotal of the held cart.
    #[must_use]
    pub fn cart_summary(&self) -> CartSummary {
        CartSummary::from_lines(&self.cart.borrow())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Load categories, then products, then rebuild the joined view.
    ///
    /// A failure reported by the repository sets `last_error`; an empty
    /// fallback emission never replaces data already held.
    #[instrument(skip(self))]
    pub async fn load_catalog(&self) {
        let mut failures = self.repository.subscribe_failures();

        let categories = next_emission(self.repository.fetch_categories(), &mut failures).await;
        let category_failure = categories.failure.clone();
        if categories.usable()
            && let Some(items) = categories.items
        {
            self.categories.send_replace(items);
        }

        let products = next_emission(self.repository.fetch_products(), &mut failures).await;
        let product_failure = products.failure.clone();
        if products.usable()
            && let Some(items) = products.items
        {
            self.products.send_replace(items);
        }

        self.recompute_joined_view();

        match category_failure.or(product_failure) {
            Some(message) => {
                warn!(error = %message, "Catalog load degraded");
                self.last_error
                    .send_replace(Some(format!("Error loading data: {message}")));
            }
            None => {
                self.last_error.send_replace(None);
            }
        }
    }

    /// Rebuild the joined view from the held products and categories.
    pub fn recompute_joined_view(&self) {
        let joined = join_products(self.products.borrow().iter(), &self.categories.borrow());
        self.products_with_category.send_replace(joined);
    }

    /// Replace the joined view with stored products matching `query`.
    ///
    /// Results are joined with the categories already held; nothing is
    /// fetched, so a search before the catalog loads shows unknown categories.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) {
        let mut results = pin!(self.repository.search_products(query));
        let Some(products) = results.next().await else {
            return;
        };
        let joined = join_products(products.iter(), &self.categories.borrow());
        debug!(count = joined.len(), "Search results joined");
        self.products_with_category.send_replace(joined);
    }

    /// Restrict the joined view to one category; `None` or blank shows all.
    pub fn filter_by_category(&self, category_id: Option<&str>) {
        let joined = {
            let products = self.products.borrow();
            let categories = self.categories.borrow();
            match category_id.filter(|id| !id.trim().is_empty()) {
                Some(id) => join_products(
                    products.iter().filter(|p| p.category_id.as_str() == id),
                    &categories,
                ),
                None => join_products(products.iter(), &categories),
            }
        };
        self.products_with_category.send_replace(joined);
    }

    /// Seed the demonstration catalog, then load it.
    #[instrument(skip(self))]
    pub async fn load_seed_data_and_catalog(&self) {
        if let Err(e) = self.repository.seed_demo_data().await {
            report(&e, "Seeding demo catalog failed");
            self.last_error
                .send_replace(Some(format!("Failed to load seed data: {e}")));
            return;
        }
        self.load_catalog().await;
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add one of `product` to the cart.
    ///
    /// With `force_new_line` the line is reset to quantity 1 instead of
    /// incremented.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the cart write fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(&self, product: &Product, force_new_line: bool) -> Result<(), StoreError> {
        let _guard = self.cart_writes.lock().await;
        let existing = self
            .repository
            .cart_snapshot()
            .into_iter()
            .find(|line| line.product_id == product.id)
            .map(|line| line.quantity);

        let quantity = match existing {
            Some(current) if !force_new_line => current.increment(),
            _ => Quantity::ONE,
        };

        self.repository.add_to_cart(product, quantity).await?;
        self.load_cart().await;
        Ok(())
    }

    /// Take one off the line for `product_id`, removing it at zero.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the cart write fails.
    #[instrument(skip(self))]
    pub async fn decrement_in_cart(&self, product_id: &ProductId) -> Result<(), StoreError> {
        let _guard = self.cart_writes.lock().await;
        let Some(line) = self
            .repository
            .cart_snapshot()
            .into_iter()
            .find(|line| &line.product_id == product_id)
        else {
            debug!("Product not in cart, nothing to decrement");
            return Ok(());
        };

        match line.quantity.decrement() {
            Some(quantity) => {
                self.repository
                    .save_cart_line(line.with_quantity(quantity))
                    .await?;
            }
            None => self.repository.remove_from_cart(product_id).await?,
        }

        self.load_cart().await;
        Ok(())
    }

    /// Remove the line for `product_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the delete fails.
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<(), StoreError> {
        let _guard = self.cart_writes.lock().await;
        self.repository.remove_from_cart(product_id).await?;
        self.load_cart().await;
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the delete fails.
    pub async fn clear_cart(&self) -> Result<(), StoreError> {
        let _guard = self.cart_writes.lock().await;
        self.repository.clear_cart().await?;
        self.load_cart().await;
        Ok(())
    }

    /// Replace the held cart with the persisted one.
    pub async fn load_cart(&self) {
        let mut lines = pin!(self.repository.cart_items());
        if let Some(lines) = lines.next().await {
            self.cart.send_replace(lines);
        }
    }

    /// Republish every cart change until the store goes away.
    ///
    /// Runs until dropped; spawn it alongside the coordinator to keep the
    /// held cart live without calling [`Self::load_cart`].
    pub async fn follow_cart(&self) {
        let mut lines = pin!(self.repository.cart_items());
        while let Some(lines) = lines.next().await {
            self.cart.send_replace(lines);
        }
        debug!("Cart stream ended");
    }
}

/// Poll the first value of `stream` and collect failures reported meanwhile.
async fn next_emission<T>(
    stream: impl Stream<Item = Vec<T>>,
    failures: &mut broadcast::Receiver<SyncFailure>,
) -> Emission<T> {
    let mut stream = pin!(stream);
    let items = stream.next().await;

    let mut failure = items
        .is_none()
        .then(|| "catalog read produced no data".to_string());
    loop {
        match failures.try_recv() {
            Ok(f) => {
                failure.get_or_insert(f.message);
            }
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                failure.get_or_insert_with(|| format!("{missed} failures dropped"));
            }
            Err(_) => break,
        }
    }

    Emission { items, failure }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use market_core::{CategoryId, Price, UNKNOWN_CATEGORY};

    use super::*;
    use crate::db::{LocalStore, SqliteStore};
    use crate::repository::seed;
    use crate::repository::tests::{BrokenStore, FakeCatalog, repository_with};

    async fn coordinator(remote: FakeCatalog) -> (CatalogCoordinator, Arc<FakeCatalog>) {
        let (repository, remote) = repository_with(remote).await;
        (CatalogCoordinator::new(repository), remote)
    }

    fn laptop() -> Product {
        seed::demo_products().remove(0)
    }

    fn remote_catalog() -> FakeCatalog {
        FakeCatalog {
            categories: seed::demo_categories().into_iter().take(2).collect(),
            products: seed::demo_products()
                .into_iter()
                .filter(|p| p.category_id.as_str() != "3")
                .collect(),
            ..FakeCatalog::default()
        }
    }

    #[tokio::test]
    async fn test_load_catalog_refreshes_and_joins() {
        let (coordinator, remote) = coordinator(remote_catalog()).await;

        coordinator.load_catalog().await;

        let views = coordinator.products_with_category_snapshot();
        assert_eq!(views.len(), 6);
        assert!(views.iter().all(|v| !v.has_unknown_category()));
        assert_eq!(coordinator.categories_snapshot().len(), 2);
        assert_eq!(coordinator.last_error_snapshot(), None);
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn test_join_falls_back_to_unknown() {
        let mut orphan = laptop();
        orphan.id = ProductId::new("999");
        orphan.category_id = CategoryId::new("99");
        let (coordinator, _) = coordinator(FakeCatalog {
            categories: vec![Category::new("1", "Electronics")],
            products: vec![laptop(), orphan],
            ..FakeCatalog::default()
        })
        .await;

        coordinator.load_catalog().await;

        let views = coordinator.products_with_category_snapshot();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].category_name, "Electronics");
        assert_eq!(views[1].category_name, UNKNOWN_CATEGORY);
    }

    #[tokio::test]
    async fn test_remote_failure_sets_last_error() {
        let (coordinator, _) = coordinator(FakeCatalog::failing()).await;

        coordinator.load_catalog().await;

        let error = coordinator.last_error_snapshot().unwrap();
        assert!(error.starts_with("Error loading data: "));
        assert!(coordinator.products_with_category_snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_prior_state() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let repository = CatalogRepository::new(Arc::new(FakeCatalog::failing()), store.clone());
        let coordinator = CatalogCoordinator::new(repository);

        coordinator.load_seed_data_and_catalog().await;
        assert_eq!(coordinator.products_snapshot().len(), 7);
        assert_eq!(coordinator.last_error_snapshot(), None);

        sqlx::query("DELETE FROM products")
            .execute(store.pool())
            .await
            .unwrap();
        coordinator.load_catalog().await;

        assert_eq!(coordinator.products_snapshot().len(), 7);
        assert_eq!(coordinator.products_with_category_snapshot().len(), 7);
        assert!(coordinator.last_error_snapshot().is_some());
    }

    #[tokio::test]
    async fn test_seed_and_catalog_serves_locally() {
        let (coordinator, remote) = coordinator(FakeCatalog::failing()).await;

        coordinator.load_seed_data_and_catalog().await;

        let views = coordinator.products_with_category_snapshot();
        assert_eq!(views.len(), 7);
        assert!(views.iter().all(|v| !v.has_unknown_category()));
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn test_seed_failure_sets_last_error() {
        let repository =
            CatalogRepository::new(Arc::new(FakeCatalog::default()), Arc::new(BrokenStore::new()));
        let coordinator = CatalogCoordinator::new(repository);

        coordinator.load_seed_data_and_catalog().await;

        let error = coordinator.last_error_snapshot().unwrap();
        assert!(error.starts_with("Failed to load seed data: "));
    }

    #[tokio::test]
    async fn test_search_before_load_has_unknown_categories() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        coordinator.repository.seed_demo_data().await.unwrap();

        coordinator.search("LAPTOP").await;

        let views = coordinator.products_with_category_snapshot();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].category_name, UNKNOWN_CATEGORY);
    }

    #[tokio::test]
    async fn test_search_after_load_uses_held_categories() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        coordinator.load_seed_data_and_catalog().await;

        coordinator.search("").await;
        assert_eq!(coordinator.products_with_category_snapshot().len(), 7);

        coordinator.search("mil").await;
        let views = coordinator.products_with_category_snapshot();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].category_name, "Groceries");
    }

    #[tokio::test]
    async fn test_filter_by_category() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        coordinator.load_seed_data_and_catalog().await;

        coordinator.filter_by_category(Some("2"));
        let views = coordinator.products_with_category_snapshot();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.category_name == "Groceries"));

        coordinator.filter_by_category(Some("  "));
        assert_eq!(coordinator.products_with_category_snapshot().len(), 7);

        // Only blank means all; other ids compare exactly
        coordinator.filter_by_category(Some(" 2 "));
        assert!(coordinator.products_with_category_snapshot().is_empty());

        coordinator.filter_by_category(Some("42"));
        assert!(coordinator.products_with_category_snapshot().is_empty());

        coordinator.filter_by_category(None);
        assert_eq!(coordinator.products_with_category_snapshot().len(), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_adds_accumulate() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        let product = laptop();

        let (first, second) = tokio::join!(
            coordinator.add_to_cart(&product, false),
            coordinator.add_to_cart(&product, false)
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(coordinator.cart_snapshot()[0].quantity.get(), 2);
        assert_eq!(coordinator.repository.cart_snapshot()[0].quantity.get(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_decrements_apply_both() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        let product = laptop();
        coordinator
            .repository
            .add_to_cart(&product, Quantity::new(3).unwrap())
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            coordinator.decrement_in_cart(&product.id),
            coordinator.decrement_in_cart(&product.id)
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(coordinator.cart_snapshot()[0].quantity, Quantity::ONE);
    }

    #[tokio::test]
    async fn test_cart_summary_survives_huge_prices() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        let mut product = laptop();
        product.price = Price::new(rust_decimal::Decimal::MAX).unwrap();

        coordinator.add_to_cart(&product, false).await.unwrap();
        coordinator.add_to_cart(&product, false).await.unwrap();

        let summary = coordinator.cart_summary();
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.subtotal, rust_decimal::Decimal::MAX);
    }

    #[tokio::test]
    async fn test_add_to_cart_increments() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        let product = laptop();

        for _ in 0..3 {
            coordinator.add_to_cart(&product, false).await.unwrap();
        }

        let cart = coordinator.cart_snapshot();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity.get(), 3);
    }

    #[tokio::test]
    async fn test_force_new_line_resets_to_one() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        let product = laptop();
        coordinator
            .repository
            .add_to_cart(&product, Quantity::new(5).unwrap())
            .await
            .unwrap();

        coordinator.add_to_cart(&product, true).await.unwrap();

        assert_eq!(coordinator.cart_snapshot()[0].quantity, Quantity::ONE);
    }

    #[tokio::test]
    async fn test_decrement_then_remove() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        let product = laptop();
        coordinator.add_to_cart(&product, false).await.unwrap();
        coordinator.add_to_cart(&product, false).await.unwrap();

        coordinator.decrement_in_cart(&product.id).await.unwrap();
        assert_eq!(coordinator.cart_snapshot()[0].quantity, Quantity::ONE);

        coordinator.decrement_in_cart(&product.id).await.unwrap();
        assert!(coordinator.cart_snapshot().is_empty());

        // Absent line is a no-op
        coordinator.decrement_in_cart(&product.id).await.unwrap();
        assert!(coordinator.cart_snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_keeps_snapshot_price() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        let mut product = laptop();
        coordinator.add_to_cart(&product, false).await.unwrap();
        coordinator.add_to_cart(&product, false).await.unwrap();

        product.price = Price::from_cents(1);
        coordinator.decrement_in_cart(&product.id).await.unwrap();

        assert_eq!(coordinator.cart_snapshot()[0].price, Price::from_cents(120_000));
    }

    #[tokio::test]
    async fn test_remove_and_clear_cart() {
        let (coordinator, _) = coordinator(FakeCatalog::default()).await;
        let products = seed::demo_products();
        coordinator.add_to_cart(&products[0], false).await.unwrap();
        coordinator.add_to_cart(&products[4], false).await.unwrap();
        coordinator.add_to_cart(&products[4], false).await.unwrap();

        let summary = coordinator.cart_summary();
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal, Price::from_cents(121_000).amount());

        coordinator.remove_from_cart(&products[0].id).await.unwrap();
        assert_eq!(coordinator.cart_snapshot().len(), 1);

        coordinator.clear_cart().await.unwrap();
        assert!(coordinator.cart_snapshot().is_empty());
        assert!(coordinator.cart_summary().is_empty());
    }

    #[tokio::test]
    async fn test_cart_write_failure_propagates() {
        let repository =
            CatalogRepository::new(Arc::new(FakeCatalog::default()), Arc::new(BrokenStore::new()));
        let coordinator = CatalogCoordinator::new(repository);

        assert!(coordinator.add_to_cart(&laptop(), false).await.is_err());
        assert!(coordinator.clear_cart().await.is_err());
        assert!(coordinator.cart_snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_follow_cart_republishes_store_changes() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let repository = CatalogRepository::new(Arc::new(FakeCatalog::default()), store.clone());
        let coordinator = Arc::new(CatalogCoordinator::new(repository));
        let mut cart = coordinator.subscribe_cart();

        let follower = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.follow_cart().await }
        });

        store
            .upsert_cart_line(&CartLine::snapshot(&laptop(), Quantity::ONE))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                cart.changed().await.unwrap();
                if !cart.borrow_and_update().is_empty() {
                    break;
                }
            }
        })
        .await
        .unwrap();

        follower.abort();
    }
}
