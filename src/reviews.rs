//! Review line extraction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::models::Review;
use crate::parse::Record;
use crate::referents::Referents;
use crate::sink::{RecordSink, TaskReport};
use crate::store::Store;
use crate::writer::BatchWriter;

// The corpus spells the customer label "cutomer"; accept both.
static REVIEW_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})\s+cus?tomer:\s*(\S+)\s+rating:\s*(-?\d+)\s+votes:\s*(-?\d+)\s+helpful:\s*(-?\d+)",
    )
    .expect("review line pattern is valid")
});

static SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^total:\s*\d+\s+downloaded:\s*\d+\s+avg rating:\s*[\d.]+")
        .expect("review summary pattern is valid")
});

/// Fields of a single review line, before it is bound to a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewLine<'a> {
    pub date: NaiveDate,
    pub customer: &'a str,
    pub rating: i64,
    pub votes: i64,
    pub helpful: i64,
}

/// Parse one review line. `None` for anything that is not review-shaped,
/// including dates that do not exist on the calendar.
pub fn parse_line(line: &str) -> Option<ReviewLine<'_>> {
    let caps = REVIEW_LINE.captures(line.trim())?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i64>().ok());
    let date = NaiveDate::from_ymd_opt(
        num(1)? as i32,
        u32::try_from(num(2)?).ok()?,
        u32::try_from(num(3)?).ok()?,
    )?;
    Some(ReviewLine {
        date,
        customer: caps.get(4)?.as_str(),
        rating: num(5)?,
        votes: num(6)?,
        helpful: num(7)?,
    })
}

/// Review rows for one record.
///
/// Lines are only considered when the record carries a well-formed
/// `reviews:` summary. Each matching line gets a surrogate key from its
/// ordinal among the matching lines of the block.
pub fn extract(record: &Record<'_>) -> Vec<Review> {
    let Some(asin) = record.asin else {
        return Vec::new();
    };
    match record.review_summary {
        Some(summary) if SUMMARY.is_match(summary) => {}
        _ => return Vec::new(),
    }
    record
        .review_lines
        .iter()
        .filter_map(|line| parse_line(line))
        .enumerate()
        .map(|(ordinal, r)| Review {
            key: Review::surrogate_key(asin, ordinal),
            asin: asin.to_string(),
            date: r.date,
            customer: r.customer.to_string(),
            rating: r.rating,
            votes: r.votes,
            helpful: r.helpful,
        })
        .collect()
}

pub struct ReviewSink {
    referents: Referents,
    reviews: BatchWriter<Review>,
    report: TaskReport,
}

impl ReviewSink {
    pub fn new(store: Arc<dyn Store>, batch_size: usize) -> Self {
        Self {
            referents: Referents::new(store.clone(), batch_size),
            reviews: BatchWriter::new(store, batch_size),
            report: TaskReport::default(),
        }
    }

    async fn flush(&mut self) -> Result<()> {
        self.referents.flush().await?;
        self.reviews.flush().await
    }
}

#[async_trait]
impl RecordSink for ReviewSink {
    fn name(&self) -> &'static str {
        "reviews"
    }

    async fn accept(&mut self, record: &Record<'_>) -> Result<()> {
        self.report.records += 1;
        let reviews = extract(record);
        let Some(first) = reviews.first() else {
            self.report.skipped += 1;
            return Ok(());
        };
        self.referents.ensure(&first.asin).await?;
        for review in reviews {
            if self.reviews.buffer(review) {
                self.flush().await?;
            }
        }
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<TaskReport> {
        let mut this = *self;
        this.flush().await?;
        this.report.writes.push(this.referents.finish().await?);
        this.report.writes.push(this.reviews.finish().await?);
        Ok(this.report)
    }
}
