//! End-to-end catalog load and cart flows.
//!
//! A real `SqliteStore` (in-memory) and `HttpCatalogClient` talk to a fake
//! remote catalog served over HTTP.

#![allow(clippy::unwrap_used)]

use std::pin::pin;

use axum::http::StatusCode;
use futures::StreamExt;
use rust_decimal::Decimal;

use market_core::{ProductId, Quantity, UNKNOWN_CATEGORY};
use market_integration_tests::{Behavior, CatalogServer, coordinator_for};
use market_sync::{FailureSource, LocalStore, SyncEntity};

// =============================================================================
// Catalog Load
// =============================================================================

#[tokio::test]
async fn test_empty_store_loads_remote_catalog_and_shops() {
    let server = CatalogServer::with_catalog().await;
    let (coordinator, _, _) = coordinator_for(&server).await;

    coordinator.load_catalog().await;

    let views = coordinator.products_with_category_snapshot();
    assert_eq!(views.len(), 7);
    assert!(views.iter().all(|v| v.category_name != UNKNOWN_CATEGORY));
    assert_eq!(coordinator.last_error_snapshot(), None);

    let laptop = coordinator
        .products_snapshot()
        .into_iter()
        .find(|p| p.id.as_str() == "101")
        .unwrap();

    coordinator.add_to_cart(&laptop, true).await.unwrap();
    coordinator.add_to_cart(&laptop, false).await.unwrap();
    let cart = coordinator.cart_snapshot();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity.get(), 2);
    assert_eq!(coordinator.cart_summary().subtotal, Decimal::new(2400, 0));

    coordinator
        .remove_from_cart(&ProductId::new("101"))
        .await
        .unwrap();
    assert!(coordinator.cart_snapshot().is_empty());
}

#[tokio::test]
async fn test_second_load_is_served_from_cache() {
    let server = CatalogServer::with_catalog().await;
    let (coordinator, _, store) = coordinator_for(&server).await;

    coordinator.load_catalog().await;
    assert_eq!(server.hits(), 2);

    coordinator.load_catalog().await;
    assert_eq!(server.hits(), 2);
    assert_eq!(store.products().await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_missing_description_is_stored_empty() {
    let server = CatalogServer::with_catalog().await;
    let (coordinator, _, _) = coordinator_for(&server).await;

    coordinator.load_catalog().await;

    let lg = coordinator
        .products_snapshot()
        .into_iter()
        .find(|p| p.id.as_str() == "104")
        .unwrap();
    assert_eq!(lg.description, "");
}

#[tokio::test]
async fn test_remote_outage_leaves_empty_catalog_and_error() {
    let server = CatalogServer::start(Behavior::Fail(StatusCode::SERVICE_UNAVAILABLE)).await;
    let (coordinator, repository, _) = coordinator_for(&server).await;
    let mut failures = repository.subscribe_failures();

    coordinator.load_catalog().await;

    assert!(coordinator.products_with_category_snapshot().is_empty());
    let error = coordinator.last_error_snapshot().unwrap();
    assert!(error.starts_with("Error loading data: "));
    assert!(error.contains("503"));

    let failure = failures.recv().await.unwrap();
    assert_eq!(failure.entity, SyncEntity::Categories);
    assert_eq!(failure.source, FailureSource::Remote);
}

#[tokio::test]
async fn test_seed_recovers_from_remote_outage() {
    let server = CatalogServer::start(Behavior::Fail(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let (coordinator, _, _) = coordinator_for(&server).await;

    coordinator.load_catalog().await;
    assert!(coordinator.last_error_snapshot().is_some());

    coordinator.load_seed_data_and_catalog().await;

    assert_eq!(coordinator.products_with_category_snapshot().len(), 7);
    assert_eq!(coordinator.categories_snapshot().len(), 3);
    assert_eq!(coordinator.last_error_snapshot(), None);
}

// =============================================================================
// Search and Filter
// =============================================================================

#[tokio::test]
async fn test_search_is_local_and_case_insensitive() {
    let server = CatalogServer::with_catalog().await;
    let (coordinator, repository, _) = coordinator_for(&server).await;
    coordinator.load_catalog().await;
    let hits = server.hits();

    coordinator.search("LAP").await;
    let views = coordinator.products_with_category_snapshot();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].category_name, "Electronics");

    let all = pin!(repository.search_products("")).next().await.unwrap();
    assert_eq!(all.len(), 7);
    assert_eq!(server.hits(), hits);
}

#[tokio::test]
async fn test_filter_then_reset() {
    let server = CatalogServer::with_catalog().await;
    let (coordinator, _, _) = coordinator_for(&server).await;
    coordinator.load_catalog().await;

    coordinator.filter_by_category(Some("2"));
    assert_eq!(coordinator.products_with_category_snapshot().len(), 3);

    coordinator.filter_by_category(None);
    assert_eq!(coordinator.products_with_category_snapshot().len(), 7);
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_cart_stream_follows_every_mutation() {
    let server = CatalogServer::with_catalog().await;
    let (coordinator, repository, _) = coordinator_for(&server).await;
    coordinator.load_catalog().await;
    let products = coordinator.products_snapshot();
    let mut cart = pin!(repository.cart_items());

    assert!(cart.next().await.unwrap().is_empty());

    repository
        .add_to_cart(&products[0], Quantity::new(3).unwrap())
        .await
        .unwrap();
    assert_eq!(cart.next().await.unwrap()[0].quantity.get(), 3);

    repository.clear_cart().await.unwrap();
    assert!(cart.next().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_survives_catalog_price_change() {
    let server = CatalogServer::with_catalog().await;
    let (coordinator, _, store) = coordinator_for(&server).await;
    coordinator.load_catalog().await;

    let mut milk = coordinator
        .products_snapshot()
        .into_iter()
        .find(|p| p.id.as_str() == "202")
        .unwrap();
    coordinator.add_to_cart(&milk, false).await.unwrap();

    milk.price = "9.99".parse().unwrap();
    store.upsert_products(&[milk]).await.unwrap();
    coordinator.load_cart().await;

    assert_eq!(coordinator.cart_snapshot()[0].price.to_string(), "2.00");
}
