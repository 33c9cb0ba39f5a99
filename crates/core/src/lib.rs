//! Market Core - Shared domain types.
//!
//! This crate provides the types shared by every Market component:
//! - `market-sync` - Catalog cache, remote sync and cart state
//! - `market-integration-tests` - End-to-end scenarios
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, quantities, catalog entities and cart lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
