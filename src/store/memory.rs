//! In-memory [`Store`] implementation for tests and dry runs.
//!
//! Tables live in ordered maps behind one `Mutex`, so each call is atomic
//! exactly like a SQLite transaction: foreign keys are checked for the
//! whole batch before anything is written.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{Category, Product, ProductCategory, Review, SimilarityEdge, TableCounts};

use super::Store;

/// Full copy of every table, ordered so two snapshots compare as sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub products: BTreeMap<String, Product>,
    pub categories: BTreeMap<i64, String>,
    pub product_categories: BTreeSet<(String, i64)>,
    pub similar_products: BTreeSet<(String, String)>,
    pub reviews: BTreeMap<String, Review>,
}

/// In-memory store with the same conflict and foreign-key rules as the
/// SQLite schema.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Snapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>> {
        self.tables
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

fn require_product(tables: &Snapshot, asin: &str) -> Result<()> {
    if !tables.products.contains_key(asin) {
        bail!("FOREIGN KEY constraint failed: product '{}' does not exist", asin);
    }
    Ok(())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_products(&self, rows: &[Product]) -> Result<u64> {
        let mut tables = self.lock()?;
        for p in rows {
            tables.products.insert(p.asin.clone(), p.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn insert_ignore_products(&self, rows: &[Product]) -> Result<u64> {
        let mut tables = self.lock()?;
        let mut inserted = 0;
        for p in rows {
            if !tables.products.contains_key(&p.asin) {
                tables.products.insert(p.asin.clone(), p.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_ignore_categories(&self, rows: &[Category]) -> Result<u64> {
        let mut tables = self.lock()?;
        let mut inserted = 0;
        for c in rows {
            if !tables.categories.contains_key(&c.id) {
                tables.categories.insert(c.id, c.name.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_ignore_product_categories(&self, rows: &[ProductCategory]) -> Result<u64> {
        let mut tables = self.lock()?;
        for link in rows {
            require_product(&tables, &link.asin)?;
            if !tables.categories.contains_key(&link.category_id) {
                bail!(
                    "FOREIGN KEY constraint failed: category {} does not exist",
                    link.category_id
                );
            }
        }
        let mut inserted = 0;
        for link in rows {
            if tables
                .product_categories
                .insert((link.asin.clone(), link.category_id))
            {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_ignore_similarity(&self, rows: &[SimilarityEdge]) -> Result<u64> {
        let mut tables = self.lock()?;
        for edge in rows {
            require_product(&tables, &edge.asin)?;
            require_product(&tables, &edge.similar_asin)?;
        }
        let mut inserted = 0;
        for edge in rows {
            if tables
                .similar_products
                .insert((edge.asin.clone(), edge.similar_asin.clone()))
            {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_reviews(&self, rows: &[Review]) -> Result<u64> {
        let mut tables = self.lock()?;
        for r in rows {
            require_product(&tables, &r.asin)?;
        }
        let mut inserted = 0;
        for r in rows {
            if !tables.reviews.contains_key(&r.key) {
                tables.reviews.insert(r.key.clone(), r.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn product_exists(&self, asin: &str) -> Result<bool> {
        Ok(self.lock()?.products.contains_key(asin))
    }

    async fn counts(&self) -> Result<TableCounts> {
        let tables = self.lock()?;
        Ok(TableCounts {
            products: tables.products.len() as i64,
            placeholders: tables
                .products
                .values()
                .filter(|p| p.is_placeholder())
                .count() as i64,
            categories: tables.categories.len() as i64,
            product_categories: tables.product_categories.len() as i64,
            similar_products: tables.similar_products.len() as i64,
            reviews: tables.reviews.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(asin: &str, title: &str) -> Product {
        Product {
            asin: asin.into(),
            title: Some(title.into()),
            sales_rank: Some(1),
            group: "Book".into(),
        }
    }

    #[tokio::test]
    async fn upsert_promotes_placeholder() {
        let store = InMemoryStore::new();
        store
            .insert_ignore_products(&[Product::placeholder("A")])
            .await
            .unwrap();
        store.upsert_products(&[product("A", "Real")]).await.unwrap();
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.products["A"].title.as_deref(), Some("Real"));
    }

    #[tokio::test]
    async fn placeholder_never_overwrites() {
        let store = InMemoryStore::new();
        store.upsert_products(&[product("A", "Real")]).await.unwrap();
        let n = store
            .insert_ignore_products(&[Product::placeholder("A")])
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(!store.snapshot().unwrap().products["A"].is_placeholder());
    }

    #[tokio::test]
    async fn orphan_edge_rejects_whole_batch() {
        let store = InMemoryStore::new();
        store.upsert_products(&[product("A", "a"), product("B", "b")]).await.unwrap();
        let edges = vec![
            SimilarityEdge {
                asin: "A".into(),
                similar_asin: "B".into(),
            },
            SimilarityEdge {
                asin: "A".into(),
                similar_asin: "Z".into(),
            },
        ];
        assert!(store.insert_ignore_similarity(&edges).await.is_err());
        assert!(store.snapshot().unwrap().similar_products.is_empty());
    }

    #[tokio::test]
    async fn category_conflict_keeps_first_name() {
        let store = InMemoryStore::new();
        store
            .insert_ignore_categories(&[Category {
                id: 1,
                name: "Books".into(),
            }])
            .await
            .unwrap();
        let n = store
            .insert_ignore_categories(&[Category {
                id: 1,
                name: "Other".into(),
            }])
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(store.snapshot().unwrap().categories[&1], "Books");
    }
}
