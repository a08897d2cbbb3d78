use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Products: natural key is the ASIN; placeholders have NULL sales_rank
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            asin TEXT PRIMARY KEY,
            title TEXT,
            sales_rank INTEGER,
            product_group TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS similar_products (
            asin TEXT NOT NULL,
            similar_asin TEXT NOT NULL,
            PRIMARY KEY (asin, similar_asin),
            FOREIGN KEY (asin) REFERENCES products(asin),
            FOREIGN KEY (similar_asin) REFERENCES products(asin)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_categories (
            asin TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY (asin, category_id),
            FOREIGN KEY (asin) REFERENCES products(asin),
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            review_key TEXT PRIMARY KEY,
            asin TEXT NOT NULL,
            review_date TEXT NOT NULL,
            customer TEXT NOT NULL,
            rating INTEGER NOT NULL,
            votes INTEGER NOT NULL,
            helpful INTEGER NOT NULL,
            FOREIGN KEY (asin) REFERENCES products(asin)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for the reporting queries that read the loaded schema
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_asin ON reviews(asin)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_product_categories_category ON product_categories(category_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_similar_products_target ON similar_products(similar_asin)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
