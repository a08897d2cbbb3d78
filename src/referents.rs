//! Foreign-key guard for rows that reference products.
//!
//! Before a batch that references a product is flushed, that product must
//! exist. [`Referents::ensure`] checks the store and, for a product it has
//! never seen, queues a [`Placeholder`]. Callers flush the referents
//! before flushing any dependent batch.
//!
//! The check and the insert are not atomic: another worker can create
//! the same product in between. That is harmless because placeholders are
//! written insert-or-ignore, so every interleaving ends with one row.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{IngestError, Result};
use crate::store::Store;
use crate::writer::{BatchWriter, Placeholder, WriteStats};

pub struct Referents {
    store: Arc<dyn Store>,
    /// ASINs confirmed present or already queued. Products are never
    /// deleted, so a positive answer stays true for the whole run.
    known: HashSet<String>,
    placeholders: BatchWriter<Placeholder>,
}

impl Referents {
    pub fn new(store: Arc<dyn Store>, batch_size: usize) -> Self {
        Self {
            placeholders: BatchWriter::new(store.clone(), batch_size),
            store,
            known: HashSet::new(),
        }
    }

    /// Make sure `asin` will exist once [`flush`](Self::flush) returns.
    pub async fn ensure(&mut self, asin: &str) -> Result<()> {
        if self.known.contains(asin) {
            return Ok(());
        }
        let exists = self
            .store
            .product_exists(asin)
            .await
            .map_err(|source| IngestError::StoreRead {
                asin: asin.to_string(),
                source,
            })?;
        if !exists {
            tracing::debug!(asin, "queueing placeholder product");
            // Placeholders depend on nothing, so a full buffer can go now.
            if self.placeholders.buffer(Placeholder(asin.to_string())) {
                self.placeholders.flush().await?;
            }
        }
        self.known.insert(asin.to_string());
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.placeholders.flush().await
    }

    pub async fn finish(self) -> Result<WriteStats> {
        self.placeholders.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn synthesizes_only_missing_products() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_products(&[Product {
                asin: "A".into(),
                title: Some("a".into()),
                sales_rank: Some(3),
                group: "Book".into(),
            }])
            .await
            .unwrap();

        let mut refs = Referents::new(store.clone(), 100);
        refs.ensure("A").await.unwrap();
        refs.ensure("B").await.unwrap();
        refs.ensure("B").await.unwrap();
        let stats = refs.finish().await.unwrap();
        assert_eq!(stats.rows, 1);

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.products.len(), 2);
        assert!(snap.products["B"].is_placeholder());
        assert!(!snap.products["A"].is_placeholder());
    }

    #[tokio::test]
    async fn racing_guards_create_one_row() {
        let store = Arc::new(InMemoryStore::new());
        let mut a = Referents::new(store.clone(), 100);
        let mut b = Referents::new(store.clone(), 100);
        // Both see "X" as missing before either flushes.
        a.ensure("X").await.unwrap();
        b.ensure("X").await.unwrap();
        a.flush().await.unwrap();
        b.flush().await.unwrap();
        assert_eq!(store.snapshot().unwrap().products.len(), 1);
    }
}
