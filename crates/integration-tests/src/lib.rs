//! Integration tests for Market Sync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p market-integration-tests
//! ```
//!
//! No external services are needed: [`CatalogServer`] stands in for the
//! remote catalog with an axum server on an ephemeral localhost port, and
//! every store is in-memory SQLite.
//!
//! # Test Categories
//!
//! - `catalog_sync` - End-to-end catalog load and cart flows
//! - `http_client` - Catalog client against real HTTP responses

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

use market_sync::{
    CatalogConfig, CatalogCoordinator, CatalogRepository, HttpCatalogClient, SqliteStore,
};

/// What the fake catalog answers on both endpoints.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// 200 with the given category and product payloads.
    Serve { categories: Value, products: Value },
    /// The given status with a plain-text body.
    Fail(StatusCode),
    /// 429 with a `Retry-After` header.
    RateLimit { retry_after: u64 },
    /// 200 with a body that is not JSON.
    Garbage,
}

#[derive(Clone)]
struct ServerState {
    behavior: Arc<Behavior>,
    hits: Arc<AtomicUsize>,
    last_authorization: Arc<std::sync::Mutex<Option<String>>>,
}

/// A running fake remote catalog; shut down on drop.
pub struct CatalogServer {
    pub base_url: Url,
    state: ServerState,
    handle: JoinHandle<()>,
}

impl CatalogServer {
    /// Start a server with the given behavior on `127.0.0.1:0`.
    pub async fn start(behavior: Behavior) -> Self {
        let state = ServerState {
            behavior: Arc::new(behavior),
            hits: Arc::new(AtomicUsize::new(0)),
            last_authorization: Arc::new(std::sync::Mutex::new(None)),
        };

        let app = Router::new()
            .route("/api/categories", get(categories))
            .route("/api/products", get(products))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/api/")).unwrap(),
            state,
            handle,
        }
    }

    /// Serve the standard two-category, seven-product catalog.
    pub async fn with_catalog() -> Self {
        Self::start(Behavior::Serve {
            categories: catalog_categories(),
            products: catalog_products(),
        })
        .await
    }

    /// Requests answered so far, across both endpoints.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// `Authorization` header of the most recent request.
    #[must_use]
    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }

    /// Client configuration pointing at this server.
    #[must_use]
    pub fn config(&self) -> CatalogConfig {
        CatalogConfig {
            base_url: self.base_url.clone(),
            api_token: None,
        }
    }

    /// A catalog client for this server.
    #[must_use]
    pub fn client(&self) -> HttpCatalogClient {
        HttpCatalogClient::new(&self.config()).unwrap()
    }
}

impl Drop for CatalogServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Clone, Copy)]
enum Endpoint {
    Categories,
    Products,
}

async fn categories(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    respond(&state, &headers, Endpoint::Categories)
}

async fn products(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    respond(&state, &headers, Endpoint::Products)
}

fn respond(state: &ServerState, headers: &HeaderMap, endpoint: Endpoint) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    match state.behavior.as_ref() {
        Behavior::Serve {
            categories,
            products,
        } => match endpoint {
            Endpoint::Categories => Json(categories.clone()).into_response(),
            Endpoint::Products => Json(products.clone()).into_response(),
        },
        Behavior::Fail(status) => (*status, "catalog unavailable").into_response(),
        Behavior::RateLimit { retry_after } => (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", retry_after.to_string())],
            "slow down",
        )
            .into_response(),
        Behavior::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
    }
}

/// Two categories as the remote catalog sends them.
#[must_use]
pub fn catalog_categories() -> Value {
    json!([
        { "id": "1", "name": "Electronics" },
        { "id": "2", "name": "Groceries" },
    ])
}

/// Seven products spread over [`catalog_categories`].
#[must_use]
pub fn catalog_products() -> Value {
    json!([
        { "id": "101", "name": "Laptop", "description": "High-end gaming laptop",
          "image": "https://example.com/laptop.png", "price": 1200.0, "categoryId": "1" },
        { "id": "102", "name": "Smartphone", "description": "Latest model smartphone",
          "image": "https://example.com/phone.png", "price": 800.0, "categoryId": "1" },
        { "id": "103", "name": "dell", "description": "High-end gaming laptop",
          "image": "https://example.com/laptop.png", "price": 1200.0, "categoryId": "1" },
        { "id": "104", "name": "LG", "description": null,
          "image": "https://example.com/phone.png", "price": 800.0, "categoryId": "1" },
        { "id": "201", "name": "Apples", "description": "Fresh organic apples",
          "image": "https://example.com/apples.png", "price": 5.0, "categoryId": "2" },
        { "id": "202", "name": "Milk", "description": "Dairy milk 1L",
          "image": "https://example.com/milk.png", "price": "2.00", "categoryId": "2" },
        { "id": "203", "name": "Bread", "description": "Sourdough loaf",
          "image": "https://example.com/bread.png", "price": 3.5, "categoryId": "2" },
    ])
}

/// Store, repository and coordinator wired to `server`.
pub async fn coordinator_for(
    server: &CatalogServer,
) -> (CatalogCoordinator, CatalogRepository, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let repository = CatalogRepository::new(Arc::new(server.client()), store.clone());
    (
        CatalogCoordinator::new(repository.clone()),
        repository,
        store,
    )
}
