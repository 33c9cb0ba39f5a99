//! Fixed demonstration catalog used to bootstrap an empty store without a
//! reachable remote catalog.

use market_core::{Category, CategoryId, Price, Product, ProductId};

/// Demo categories.
#[must_use]
pub fn demo_categories() -> Vec<Category> {
    vec![
        Category::new("1", "Electronics"),
        Category::new("2", "Groceries"),
        Category::new("3", "Clothing"),
    ]
}

/// Demo products, spread over [`demo_categories`].
#[must_use]
pub fn demo_products() -> Vec<Product> {
    [
        ("101", "Laptop", "High-end gaming laptop", "laptop", 120_000, "1"),
        ("102", "Smartphone", "Latest model smartphone", "phone", 80_000, "1"),
        ("103", "dell", "High-end gaming laptop", "laptop", 120_000, "1"),
        ("104", "LG", "Latest model smartphone", "phone", 80_000, "1"),
        ("201", "Apples", "Fresh organic apples", "apples", 500, "2"),
        ("202", "Milk", "Dairy milk 1L", "milk", 200, "2"),
        ("301", "T-Shirt", "Cotton T-Shirt", "tshirt", 1_500, "3"),
    ]
    .into_iter()
    .map(|(id, name, description, image, cents, category)| Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: description.to_string(),
        image: format!("https://example.com/{image}.png"),
        price: Price::from_cents(cents),
        category_id: CategoryId::new(category),
    })
    .collect()
}
