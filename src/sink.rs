//! Per-partition record consumers.
//!
//! Each ingestion task walks the blocks of one partition and feeds every
//! parsed [`Record`] to one [`RecordSink`]. A sink owns the batch writers
//! for the entity types it produces and flushes them in dependency order.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::Product;
use crate::parse::{blocks, Record};
use crate::store::Store;
use crate::writer::{BatchWriter, WriteStats};

/// What one task did with its partition.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskReport {
    /// Record blocks seen (the preamble is not a record).
    pub records: u64,
    /// Records that produced no row for this task's main entity.
    pub skipped: u64,
    pub writes: Vec<WriteStats>,
}

impl TaskReport {
    /// Rows handed to the store, across all writers of the task.
    pub fn rows(&self) -> u64 {
        self.writes.iter().map(|w| w.rows).sum()
    }
}

#[async_trait]
pub trait RecordSink: Send {
    /// Short label used in logs, progress and errors.
    fn name(&self) -> &'static str;

    async fn accept(&mut self, record: &Record<'_>) -> Result<()>;

    /// Flush every buffered row and report.
    async fn finish(self: Box<Self>) -> Result<TaskReport>;
}

/// Feed every record block of `text` to `sink`, in order.
pub async fn drain(text: &str, mut sink: Box<dyn RecordSink>) -> Result<TaskReport> {
    for block in blocks(text) {
        if !block.is_record() {
            continue;
        }
        let record = Record::parse(block.text);
        sink.accept(&record).await?;
    }
    sink.finish().await
}

/// Upserts the product row of every complete record.
pub struct ProductSink {
    products: BatchWriter<Product>,
    report: TaskReport,
}

impl ProductSink {
    pub fn new(store: Arc<dyn Store>, batch_size: usize) -> Self {
        Self {
            products: BatchWriter::new(store, batch_size),
            report: TaskReport::default(),
        }
    }
}

#[async_trait]
impl RecordSink for ProductSink {
    fn name(&self) -> &'static str {
        "products"
    }

    async fn accept(&mut self, record: &Record<'_>) -> Result<()> {
        self.report.records += 1;
        match record.product() {
            Some(product) => self.products.push(product).await,
            None => {
                self.report.skipped += 1;
                tracing::debug!(
                    asin = record.asin.unwrap_or("<none>"),
                    "record lacks a required product field, skipped"
                );
                Ok(())
            }
        }
    }

    async fn finish(self: Box<Self>) -> Result<TaskReport> {
        let this = *self;
        let mut report = this.report;
        report.writes.push(this.products.finish().await?);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn drain_skips_preamble_and_incomplete_records() {
        let text = "header line\nTotal items: 2\n\nId: 0\nASIN: OLD\n  discontinued product\n\nId: 1\nASIN: NEW\n  title: T\n  group: Book\n  salesrank: 9\n";
        let store = Arc::new(InMemoryStore::new());
        let report = drain(text, Box::new(ProductSink::new(store.clone(), 10)))
            .await
            .unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rows(), 1);
        let snap = store.snapshot().unwrap();
        assert!(snap.products.contains_key("NEW"));
        assert!(!snap.products.contains_key("OLD"));
    }
}
