//! Conversion from remote wire records to domain types.

use market_core::{Category, CategoryId, Price, PriceError, Product, ProductId};

use super::types::{RemoteCategory, RemoteProduct};

#[must_use]
pub fn convert_category(category: RemoteCategory) -> Category {
    Category {
        id: CategoryId::new(category.id),
        name: category.name,
    }
}

/// Convert a remote product, normalizing a missing description to `""`.
///
/// # Errors
///
/// Returns `PriceError` if the remote price is negative.
pub fn convert_product(product: RemoteProduct) -> Result<Product, PriceError> {
    Ok(Product {
        price: Price::new(product.price)?,
        id: ProductId::new(product.id),
        name: product.name,
        description: product.description.unwrap_or_default(),
        image: product.image,
        category_id: CategoryId::new(product.category_id),
    })
}

/// Convert a batch of remote products, skipping records that are invalid.
#[must_use]
pub fn convert_products(products: Vec<RemoteProduct>) -> Vec<Product> {
    products
        .into_iter()
        .filter_map(|remote| {
            let id = remote.id.clone();
            match convert_product(remote) {
                Ok(product) => Some(product),
                Err(e) => {
                    tracing::warn!(product_id = %id, error = %e, "Skipping invalid remote product");
                    None
                }
            }
        })
        .collect()
}
