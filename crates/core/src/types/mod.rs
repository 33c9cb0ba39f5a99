//! Core types for Market.
//!
//! This module provides type-safe wrappers and entities for the catalog and
//! the shopping cart.

pub mod cart;
pub mod catalog;
pub mod id;
pub mod price;

pub use cart::{CartLine, CartSummary, Quantity};
pub use catalog::{Category, Product, ProductView, UNKNOWN_CATEGORY, join_products};
pub use id::*;
pub use price::{Price, PriceError};
