//! Storage abstraction for the loader.
//!
//! The [`Store`] trait is the only thing the pipeline knows about the
//! target database. Every write is a batch and every call is atomic; the
//! pipeline relies on the store's conflict handling (upsert or
//! insert-or-ignore) instead of any application-level lock, so all
//! workers may call the same store concurrently.
//!
//! Implementations must be `Send + Sync` to be shared across tasks.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Category, Product, ProductCategory, Review, SimilarityEdge, TableCounts};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract target store.
///
/// # Operations
///
/// | Method | Conflict policy |
/// |--------|-----------------|
/// | [`upsert_products`](Store::upsert_products) | overwrite title, rank, group |
/// | [`insert_ignore_products`](Store::insert_ignore_products) | keep the existing row |
/// | [`insert_ignore_categories`](Store::insert_ignore_categories) | keep the existing row |
/// | [`insert_ignore_product_categories`](Store::insert_ignore_product_categories) | keep the existing pair |
/// | [`insert_ignore_similarity`](Store::insert_ignore_similarity) | keep the existing pair |
/// | [`insert_reviews`](Store::insert_reviews) | keep the existing row for the same key |
///
/// Write methods return the number of rows that changed. Rows that
/// reference a missing product or category are rejected as a foreign-key
/// violation, failing the whole call.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_products(&self, rows: &[Product]) -> Result<u64>;

    /// Used for placeholders: never overwrites a product that already exists.
    async fn insert_ignore_products(&self, rows: &[Product]) -> Result<u64>;

    async fn insert_ignore_categories(&self, rows: &[Category]) -> Result<u64>;

    async fn insert_ignore_product_categories(&self, rows: &[ProductCategory]) -> Result<u64>;

    async fn insert_ignore_similarity(&self, rows: &[SimilarityEdge]) -> Result<u64>;

    async fn insert_reviews(&self, rows: &[Review]) -> Result<u64>;

    async fn product_exists(&self, asin: &str) -> Result<bool>;

    /// Row counts per table.
    async fn counts(&self) -> Result<TableCounts>;
}
