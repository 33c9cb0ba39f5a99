//! Catalog entities and the product/category join.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId};
use super::price::Price;

/// Label used when a product references a category that is not stored.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    #[must_use]
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A catalog product as persisted in the local store.
///
/// `category_id` is a soft reference: nothing guarantees the category exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Always present locally; a missing upstream description is stored as `""`.
    pub description: String,
    /// Image URL.
    pub image: String,
    pub price: Price,
    pub category_id: CategoryId,
}

/// A product joined with the name of its category.
///
/// Derived on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub image: String,
    pub price: Price,
    pub category_id: CategoryId,
    pub category_name: String,
}

impl ProductView {
    /// Join a product with the name of its category, if one was found.
    #[must_use]
    pub fn new(product: &Product, category_name: Option<&str>) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            image: product.image.clone(),
            price: product.price,
            category_id: product.category_id.clone(),
            category_name: category_name.unwrap_or(UNKNOWN_CATEGORY).to_owned(),
        }
    }

    /// Whether the category reference could not be resolved.
    #[must_use]
    pub fn has_unknown_category(&self) -> bool {
        self.category_name == UNKNOWN_CATEGORY
    }
}

/// Join every product with its category, preserving product order.
///
/// Products whose `category_id` matches no category get [`UNKNOWN_CATEGORY`].
#[must_use]
pub fn join_products<'a>(
    products: impl IntoIterator<Item = &'a Product>,
    categories: &[Category],
) -> Vec<ProductView> {
    let names: HashMap<&CategoryId, &str> = categories
        .iter()
        .map(|c| (&c.id, c.name.as_str()))
        .collect();

    products
        .into_iter()
        .map(|p| ProductView::new(p, names.get(&p.category_id).copied()))
        .collect()
}
