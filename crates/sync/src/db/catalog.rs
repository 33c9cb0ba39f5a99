//! Catalog queries for the local store.
//!
//! Categories and products are written in batches. A batch runs in a single
//! transaction so it either lands completely or not at all.

use sqlx::SqlitePool;
use tracing::instrument;

use market_core::{Category, CategoryId, Price, Product, ProductId};

use super::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: String,
    image: String,
    price: String,
    category_id: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = row.price.parse::<Price>().map_err(|e| {
            StoreError::DataCorruption(format!("invalid price for product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            image: row.image,
            price,
            category_id: CategoryId::new(row.category_id),
        })
    }
}

/// Queries over the `categories` and `products` tables.
pub struct CatalogQueries<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CatalogQueries<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite categories by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if any write fails; nothing is committed then.
    #[instrument(skip_all, fields(count = categories.len()))]
    pub async fn upsert_categories(&self, categories: &[Category]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for category in categories {
            sqlx::query(
                r"
                INSERT INTO categories (id, name)
                VALUES (?1, ?2)
                ON CONFLICT (id) DO UPDATE SET name = excluded.name
                ",
            )
            .bind(category.id.as_str())
            .bind(&category.name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Insert or overwrite products by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if any write fails; nothing is committed then.
    #[instrument(skip_all, fields(count = products.len()))]
    pub async fn upsert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for product in products {
            sqlx::query(
                r"
                INSERT INTO products (id, name, description, image, price, category_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    image = excluded.image,
                    price = excluded.price,
                    category_id = excluded.category_id
                ",
            )
            .bind(product.id.as_str())
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.image)
            .bind(product.price.amount().to_string())
            .bind(product.category_id.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// All categories in first-insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name FROM categories ORDER BY rowid",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// All products in first-insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    /// Returns `StoreError::DataCorruption` if a stored price is invalid.
    pub async fn products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, image, price, category_id
            FROM products
            ORDER BY rowid
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Products whose name contains `query` (ASCII case-insensitive).
    ///
    /// `%`, `_` and `\` in the query are matched literally.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    /// Returns `StoreError::DataCorruption` if a stored price is invalid.
    #[instrument(skip(self))]
    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, image, price, category_id
            FROM products
            WHERE name LIKE ?1 ESCAPE '\'
            ORDER BY rowid
            ",
        )
        .bind(like_pattern(query))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }
}

/// Build a `LIKE` pattern matching `query` anywhere, with wildcards escaped.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
