//! Similar-product links.
//!
//! [`edges_for`] turns a record's `similar:` line into edges; the
//! [`SimilarityResolver`] makes sure both ends of every edge exist as
//! products before the edge batch reaches the store.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SimilarityEdge;
use crate::parse::Record;
use crate::referents::Referents;
use crate::sink::{RecordSink, TaskReport};
use crate::store::Store;
use crate::writer::BatchWriter;

/// Edges declared by one record, in source order.
///
/// A declared count of zero, a missing list, or a missing owner yields
/// nothing. Self links and repeated targets are dropped.
pub fn edges_for(record: &Record<'_>) -> Vec<SimilarityEdge> {
    let (Some(asin), Some(similar)) = (record.asin, record.similar) else {
        return Vec::new();
    };
    if similar.declared == 0 {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    similar
        .ids()
        .filter(|id| *id != asin && seen.insert(*id))
        .map(|id| SimilarityEdge {
            asin: asin.to_string(),
            similar_asin: id.to_string(),
        })
        .collect()
}

/// Writes similarity edges, synthesizing placeholder products for any
/// endpoint the store does not know yet.
///
/// The owning product gets the same treatment as the targets: an owner
/// whose definition block lacked a required field is kept as a
/// placeholder rather than losing its edges.
pub struct SimilarityResolver {
    referents: Referents,
    edges: BatchWriter<SimilarityEdge>,
    report: TaskReport,
}

impl SimilarityResolver {
    pub fn new(store: Arc<dyn Store>, batch_size: usize) -> Self {
        Self {
            referents: Referents::new(store.clone(), batch_size),
            edges: BatchWriter::new(store, batch_size),
            report: TaskReport::default(),
        }
    }

    pub async fn resolve(&mut self, record: &Record<'_>) -> Result<()> {
        let edges = edges_for(record);
        let Some(first) = edges.first() else {
            return Ok(());
        };
        self.referents.ensure(&first.asin).await?;
        for edge in edges {
            self.referents.ensure(&edge.similar_asin).await?;
            if self.edges.buffer(edge) {
                self.flush().await?;
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        // Endpoints first, or the edge batch would fail its foreign keys.
        self.referents.flush().await?;
        self.edges.flush().await
    }
}

#[async_trait]
impl RecordSink for SimilarityResolver {
    fn name(&self) -> &'static str {
        "similarity"
    }

    async fn accept(&mut self, record: &Record<'_>) -> Result<()> {
        self.report.records += 1;
        self.resolve(record).await
    }

    async fn finish(self: Box<Self>) -> Result<TaskReport> {
        let mut this = *self;
        this.flush().await?;
        this.report.writes.push(this.referents.finish().await?);
        this.report.writes.push(this.edges.finish().await?);
        Ok(this.report)
    }
}
