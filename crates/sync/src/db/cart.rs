//! Cart queries for the local store.

use sqlx::SqlitePool;
use tracing::instrument;

use market_core::{CartLine, CategoryId, Price, ProductId, Quantity};

use super::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    product_id: String,
    name: String,
    description: String,
    image: String,
    price: String,
    category_id: String,
    quantity: i64,
}

impl TryFrom<CartRow> for CartLine {
    type Error = StoreError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let price = row.price.parse::<Price>().map_err(|e| {
            StoreError::DataCorruption(format!(
                "invalid price for cart line {}: {e}",
                row.product_id
            ))
        })?;
        let quantity = u32::try_from(row.quantity)
            .ok()
            .and_then(Quantity::new)
            .ok_or_else(|| {
                StoreError::DataCorruption(format!(
                    "invalid quantity {} for cart line {}",
                    row.quantity, row.product_id
                ))
            })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            description: row.description,
            image: row.image,
            price,
            category_id: CategoryId::new(row.category_id),
            quantity,
        })
    }
}

/// Queries over the `cart` table.
pub struct CartQueries<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CartQueries<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All cart lines in the order they were first added.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    /// Returns `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn all(&self) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query_as::<_, CartRow>(
            r"
            SELECT product_id, name, description, image, price, category_id, quantity
            FROM cart
            ORDER BY rowid
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    /// Insert the line, or overwrite every column of the existing one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    #[instrument(skip_all, fields(product_id = %line.product_id, quantity = %line.quantity))]
    pub async fn upsert(&self, line: &CartLine) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO cart (product_id, name, description, image, price, category_id, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (product_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                image = excluded.image,
                price = excluded.price,
                category_id = excluded.category_id,
                quantity = excluded.quantity
            ",
        )
        .bind(line.product_id.as_str())
        .bind(&line.name)
        .bind(&line.description)
        .bind(&line.image)
        .bind(line.price.amount().to_string())
        .bind(line.category_id.as_str())
        .bind(i64::from(line.quantity.get()))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete the line for a product. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: &ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM cart WHERE product_id = ?1")
            .bind(product_id.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every line.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the delete fails.
    pub async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart").execute(self.pool).await?;
        Ok(())
    }
}
