//! Bounded batch writers.
//!
//! A [`BatchWriter`] buffers rows of one entity type and hands them to the
//! [`Store`] as a single atomic call whenever the buffer reaches the batch
//! size, and once more on [`finish`](BatchWriter::finish). The conflict
//! policy is decided by the row type through [`BatchRow`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{IngestError, Result};
use crate::models::{
    Category, EntityKind, Product, ProductCategory, Review, SimilarityEdge,
};
use crate::store::Store;

/// A row type that knows which [`Store`] call writes it.
#[async_trait]
pub trait BatchRow: Send + Sync + Sized + 'static {
    const KIND: EntityKind;

    async fn write(store: &dyn Store, rows: &[Self]) -> anyhow::Result<u64>;
}

#[async_trait]
impl BatchRow for Product {
    const KIND: EntityKind = EntityKind::Product;

    async fn write(store: &dyn Store, rows: &[Self]) -> anyhow::Result<u64> {
        store.upsert_products(rows).await
    }
}

/// A product known only by reference. Written insert-or-ignore, so it
/// never clobbers a real definition and two workers racing to create the
/// same placeholder end with one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder(pub String);

#[async_trait]
impl BatchRow for Placeholder {
    const KIND: EntityKind = EntityKind::Placeholder;

    async fn write(store: &dyn Store, rows: &[Self]) -> anyhow::Result<u64> {
        let products: Vec<Product> = rows.iter().map(|p| Product::placeholder(&p.0)).collect();
        store.insert_ignore_products(&products).await
    }
}

#[async_trait]
impl BatchRow for Category {
    const KIND: EntityKind = EntityKind::Category;

    async fn write(store: &dyn Store, rows: &[Self]) -> anyhow::Result<u64> {
        store.insert_ignore_categories(rows).await
    }
}

#[async_trait]
impl BatchRow for ProductCategory {
    const KIND: EntityKind = EntityKind::ProductCategory;

    async fn write(store: &dyn Store, rows: &[Self]) -> anyhow::Result<u64> {
        store.insert_ignore_product_categories(rows).await
    }
}

#[async_trait]
impl BatchRow for SimilarityEdge {
    const KIND: EntityKind = EntityKind::Similarity;

    async fn write(store: &dyn Store, rows: &[Self]) -> anyhow::Result<u64> {
        store.insert_ignore_similarity(rows).await
    }
}

#[async_trait]
impl BatchRow for Review {
    const KIND: EntityKind = EntityKind::Review;

    async fn write(store: &dyn Store, rows: &[Self]) -> anyhow::Result<u64> {
        store.insert_reviews(rows).await
    }
}

/// What one writer sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub kind: EntityKind,
    /// Rows handed to the store.
    pub rows: u64,
    /// Rows the store reported as inserted or changed.
    pub changed: u64,
    pub batches: u64,
}

impl WriteStats {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            rows: 0,
            changed: 0,
            batches: 0,
        }
    }

    pub fn merge(&mut self, other: &WriteStats) {
        self.rows += other.rows;
        self.changed += other.changed;
        self.batches += other.batches;
    }
}

pub struct BatchWriter<R: BatchRow> {
    store: Arc<dyn Store>,
    batch_size: usize,
    buf: Vec<R>,
    stats: WriteStats,
}

impl<R: BatchRow> BatchWriter<R> {
    pub fn new(store: Arc<dyn Store>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            buf: Vec::with_capacity(batch_size.min(4096)),
            stats: WriteStats::new(R::KIND),
        }
    }

    /// Buffer a row without flushing. Returns `true` once the buffer has
    /// reached the batch size, for callers that must flush other writers
    /// first.
    pub fn buffer(&mut self, row: R) -> bool {
        self.buf.push(row);
        self.buf.len() >= self.batch_size
    }

    /// Buffer a row and flush if the batch is full.
    pub async fn push(&mut self, row: R) -> Result<()> {
        if self.buffer(row) {
            self.flush().await?;
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Write everything buffered as one store call.
    ///
    /// On failure the buffered rows are dropped; earlier batches remain
    /// committed.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.buf);
        match R::write(self.store.as_ref(), &rows).await {
            Ok(changed) => {
                self.stats.rows += rows.len() as u64;
                self.stats.changed += changed;
                self.stats.batches += 1;
                tracing::debug!(
                    entity = %R::KIND,
                    rows = rows.len(),
                    changed,
                    "flushed batch"
                );
                self.buf = rows;
                self.buf.clear();
                Ok(())
            }
            Err(source) => Err(IngestError::StoreWrite {
                entity: R::KIND,
                rows: rows.len(),
                source,
            }),
        }
    }

    /// Flush the tail and report totals.
    pub async fn finish(mut self) -> Result<WriteStats> {
        self.flush().await?;
        Ok(self.stats)
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }
}
