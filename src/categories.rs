//! Category path extraction.
//!
//! A path line looks like `|Books[283155]|Subjects[1000]|Fiction[17]`. Each
//! `Name[id]` segment yields one [`Category`] and one [`ProductCategory`];
//! the position of a segment in the path is not retained.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Category, ProductCategory};
use crate::parse::Record;
use crate::referents::Referents;
use crate::sink::{RecordSink, TaskReport};
use crate::store::Store;
use crate::writer::BatchWriter;

/// Parse every well-formed `Name[id]` segment of one path line.
///
/// Malformed segments are skipped; the rest of the line still counts.
pub fn parse_path(line: &str) -> impl Iterator<Item = Category> + '_ {
    line.split('|').filter_map(parse_segment)
}

fn parse_segment(segment: &str) -> Option<Category> {
    let segment = segment.trim();
    let body = segment.strip_suffix(']')?;
    let (name, id) = body.rsplit_once('[')?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Category {
        id: id.parse().ok()?,
        name: name.to_string(),
    })
}

/// Category and membership rows for one record, in source order.
///
/// Returns nothing when the record has no identifier to attach rows to.
pub fn extract(record: &Record<'_>) -> Vec<(Category, ProductCategory)> {
    let Some(asin) = record.asin else {
        return Vec::new();
    };
    record
        .category_lines
        .iter()
        .flat_map(|line| parse_path(line))
        .map(|category| {
            let link = ProductCategory {
                asin: asin.to_string(),
                category_id: category.id,
            };
            (category, link)
        })
        .collect()
}

/// Writes categories and memberships.
///
/// Flush order is owner products, then categories, then memberships, so a
/// membership batch never references a row that is still buffered.
pub struct CategorySink {
    referents: Referents,
    categories: BatchWriter<Category>,
    links: BatchWriter<ProductCategory>,
    report: TaskReport,
}

impl CategorySink {
    pub fn new(store: Arc<dyn Store>, batch_size: usize) -> Self {
        Self {
            referents: Referents::new(store.clone(), batch_size),
            categories: BatchWriter::new(store.clone(), batch_size),
            links: BatchWriter::new(store, batch_size),
            report: TaskReport::default(),
        }
    }

    async fn flush(&mut self) -> Result<()> {
        self.referents.flush().await?;
        self.categories.flush().await?;
        self.links.flush().await
    }
}

#[async_trait]
impl RecordSink for CategorySink {
    fn name(&self) -> &'static str {
        "categories"
    }

    async fn accept(&mut self, record: &Record<'_>) -> Result<()> {
        self.report.records += 1;
        let rows = extract(record);
        let Some((_, first)) = rows.first() else {
            self.report.skipped += 1;
            return Ok(());
        };
        self.referents.ensure(&first.asin).await?;
        for (category, link) in rows {
            // Categories have no dependencies and may go out on their own.
            self.categories.push(category).await?;
            if self.links.buffer(link) {
                self.flush().await?;
            }
        }
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<TaskReport> {
        let mut this = *self;
        this.flush().await?;
        this.report.writes.push(this.referents.finish().await?);
        this.report.writes.push(this.categories.finish().await?);
        this.report.writes.push(this.links.finish().await?);
        Ok(this.report)
    }
}
