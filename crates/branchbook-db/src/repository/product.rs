//! # Product Repository
//!
//! Read access to the product catalog. The catalog price is the only unit
//! price a sales-receipt line may use.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use branchbook_core::CatalogItem;

/// Repository for product catalog operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CatalogItem>> {
        let product = sqlx::query_as::<_, CatalogItem>(
            r#"
            SELECT
                id, name, category, price_cents, quantity_on_hand,
                created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn insert(&self, product: &CatalogItem) -> DbResult<()> {
        debug!(product_id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, price_cents, quantity_on_hand,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.quantity_on_hand)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
