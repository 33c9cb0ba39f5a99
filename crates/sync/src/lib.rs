//! Market Sync - Cache-first catalog sync and local cart state.
//!
//! An embedded library core for shop clients. A presentation layer drives the
//! [`CatalogCoordinator`] and renders from its observable state; everything
//! below it is replaceable through the [`LocalStore`] and [`CatalogApi`]
//! traits.
//!
//! # Layers
//!
//! - [`remote`] - HTTP client for the remote catalog (`GET categories`, `GET products`)
//! - [`db`] - SQLite local store: catalog cache and the persisted cart
//! - [`repository`] - Cache-first reads, refresh on miss, cart writes
//! - [`coordinator`] - Observable view state and cart state machine
//!
//! # Ambient
//!
//! - [`config`] - Environment configuration
//! - [`error`] - Aggregated error type and Sentry reporting
//! - [`telemetry`] - Tracing subscriber and Sentry initialisation
//!
//! # Example
//!
//! ```rust,ignore
//! let config = SyncConfig::from_env()?;
//! let _sentry = telemetry::init(&config.telemetry);
//!
//! let store = Arc::new(SqliteStore::open(&config.database_url).await?);
//! let remote = Arc::new(HttpCatalogClient::new(&config.catalog)?);
//! let coordinator = CatalogCoordinator::new(CatalogRepository::new(remote, store));
//!
//! coordinator.load_catalog().await;
//! coordinator.load_cart().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod remote;
pub mod repository;
pub mod telemetry;

pub use config::{CatalogConfig, ConfigError, LogFormat, SyncConfig, TelemetryConfig};
pub use coordinator::CatalogCoordinator;
pub use db::{LocalStore, SqliteStore, StoreError};
pub use error::{MarketError, Result};
pub use remote::{CatalogApi, HttpCatalogClient, RemoteError};
pub use repository::{CatalogRepository, FailureSource, SyncEntity, SyncFailure};
