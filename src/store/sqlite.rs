//! SQLite-backed [`Store`] implementation.
//!
//! Every write method runs in one transaction and sends its rows as
//! multi-row `INSERT ... VALUES` statements built with
//! [`QueryBuilder::push_values`]. Large batches are split across several
//! statements inside the same transaction so no single statement exceeds
//! SQLite's bound-parameter limit.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::{
    Category, Product, ProductCategory, Review, SimilarityEdge, TableCounts, PLACEHOLDER,
};

use super::Store;

/// SQLITE_MAX_VARIABLE_NUMBER for the bundled library (3.32+).
const MAX_BIND_PARAMS: usize = 32_766;

fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns).max(1)
}

/// SQLite implementation of the [`Store`] trait.
///
/// Wraps a [`SqlitePool`]; clones of the store share the pool, so one
/// instance can serve every worker.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database named in `config`.
    pub async fn connect(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(n)
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_products(&self, rows: &[Product]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for chunk in rows.chunks(rows_per_statement(4)) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO products (asin, title, sales_rank, product_group) ",
            );
            qb.push_values(chunk, |mut b, p| {
                b.push_bind(p.asin.as_str())
                    .push_bind(p.title.as_deref())
                    .push_bind(p.sales_rank)
                    .push_bind(p.group.as_str());
            });
            qb.push(
                r#"
                ON CONFLICT(asin) DO UPDATE SET
                    title = excluded.title,
                    sales_rank = excluded.sales_rank,
                    product_group = excluded.product_group
                "#,
            );
            affected += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    async fn insert_ignore_products(&self, rows: &[Product]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for chunk in rows.chunks(rows_per_statement(4)) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO products (asin, title, sales_rank, product_group) ",
            );
            qb.push_values(chunk, |mut b, p| {
                b.push_bind(p.asin.as_str())
                    .push_bind(p.title.as_deref())
                    .push_bind(p.sales_rank)
                    .push_bind(p.group.as_str());
            });
            qb.push(" ON CONFLICT(asin) DO NOTHING");
            affected += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    async fn insert_ignore_categories(&self, rows: &[Category]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for chunk in rows.chunks(rows_per_statement(2)) {
            let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO categories (id, name) ");
            qb.push_values(chunk, |mut b, c| {
                b.push_bind(c.id).push_bind(c.name.as_str());
            });
            qb.push(" ON CONFLICT(id) DO NOTHING");
            affected += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    async fn insert_ignore_product_categories(&self, rows: &[ProductCategory]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for chunk in rows.chunks(rows_per_statement(2)) {
            let mut qb =
                QueryBuilder::<Sqlite>::new("INSERT INTO product_categories (asin, category_id) ");
            qb.push_values(chunk, |mut b, link| {
                b.push_bind(link.asin.as_str()).push_bind(link.category_id);
            });
            qb.push(" ON CONFLICT(asin, category_id) DO NOTHING");
            affected += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    async fn insert_ignore_similarity(&self, rows: &[SimilarityEdge]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for chunk in rows.chunks(rows_per_statement(2)) {
            let mut qb =
                QueryBuilder::<Sqlite>::new("INSERT INTO similar_products (asin, similar_asin) ");
            qb.push_values(chunk, |mut b, edge| {
                b.push_bind(edge.asin.as_str())
                    .push_bind(edge.similar_asin.as_str());
            });
            qb.push(" ON CONFLICT(asin, similar_asin) DO NOTHING");
            affected += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    async fn insert_reviews(&self, rows: &[Review]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for chunk in rows.chunks(rows_per_statement(7)) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO reviews (review_key, asin, review_date, customer, rating, votes, helpful) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.key.as_str())
                    .push_bind(r.asin.as_str())
                    .push_bind(r.date.format("%Y-%m-%d").to_string())
                    .push_bind(r.customer.as_str())
                    .push_bind(r.rating)
                    .push_bind(r.votes)
                    .push_bind(r.helpful);
            });
            qb.push(" ON CONFLICT(review_key) DO NOTHING");
            affected += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    async fn product_exists(&self, asin: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE asin = ?)")
                .bind(asin)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn counts(&self) -> Result<TableCounts> {
        let placeholders: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE sales_rank IS NULL AND title = ? AND product_group = ?",
        )
        .bind(PLACEHOLDER)
        .bind(PLACEHOLDER)
        .fetch_one(&self.pool)
        .await?;

        Ok(TableCounts {
            products: count_rows(&self.pool, "products").await?,
            placeholders,
            categories: count_rows(&self.pool, "categories").await?,
            product_categories: count_rows(&self.pool, "product_categories").await?,
            similar_products: count_rows(&self.pool, "similar_products").await?,
            reviews: count_rows(&self.pool, "reviews").await?,
        })
    }
}
