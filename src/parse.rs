//! Block segmentation and field extraction for the product corpus.
//!
//! The corpus is a sequence of records, each starting with an `Id:` line:
//!
//! ```text
//! Id:   1
//! ASIN: 0827229534
//!   title: Patterns of Preaching: A Sermon Sampler
//!   group: Book
//!   salesrank: 396585
//!   similar: 5  0804215715  156101074X  0687023955  0687074231  082721619X
//!   categories: 2
//!    |Books[283155]|Subjects[1000]|Religion & Spirituality[22]|Christianity[12290]
//!    |Books[283155]|Subjects[1000]|Religion & Spirituality[22]|Christianity[12360]
//!   reviews: total: 2  downloaded: 2  avg rating: 5
//!     2000-7-28  cutomer: A2JW67OY8U6HHK  rating: 5  votes:  10  helpful:   9
//!     2003-12-14  cutomer: A2VE83MZF98ITY  rating: 5  votes:   6  helpful:   5
//! ```
//!
//! [`blocks`] splits raw text into [`Block`]s without copying, and
//! [`Record::parse`] classifies every line of one block. Both are pure
//! functions over `&str`; no I/O happens here.

use std::ops::Range;

use crate::models::Product;

const ANCHOR: &str = "Id:";

/// One contiguous slice of the corpus.
///
/// Blank lines trailing a record belong to that record, so concatenating
/// every block's `text` in order reproduces the input exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub span: Range<usize>,
    pub text: &'a str,
}

impl<'a> Block<'a> {
    /// `false` for the preamble before the first `Id:` line.
    pub fn is_record(&self) -> bool {
        self.text
            .lines()
            .next()
            .map(is_anchor)
            .unwrap_or(false)
    }
}

/// Lazy iterator over the blocks of a text segment.
pub struct Blocks<'a> {
    text: &'a str,
    pos: usize,
}

/// Split `text` into blocks, starting a new one at every `Id:` line.
pub fn blocks(text: &str) -> Blocks<'_> {
    Blocks { text, pos: 0 }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let start = self.pos;
        let mut offset = start;
        let mut end = self.text.len();
        for (i, line) in self.text[start..].split_inclusive('\n').enumerate() {
            // The first line always belongs to this block, anchor or not.
            if i > 0 && is_anchor(line) {
                end = offset;
                break;
            }
            offset += line.len();
        }
        self.pos = end;
        Some(Block {
            span: start..end,
            text: &self.text[start..end],
        })
    }
}

fn is_anchor(line: &str) -> bool {
    line.trim_start().starts_with(ANCHOR)
}

/// The `similar:` line: declared count plus the raw identifier list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarList<'a> {
    pub declared: usize,
    pub tokens: &'a str,
}

impl<'a> SimilarList<'a> {
    /// Up to `declared` identifiers, in source order.
    pub fn ids(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.tokens.split_whitespace().take(self.declared)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Categories,
    Reviews,
}

/// Fields and sub-sections of one block, borrowed from the corpus.
///
/// Every field is optional: a miss in one never prevents extraction of
/// the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record<'a> {
    pub asin: Option<&'a str>,
    pub title: Option<&'a str>,
    pub sales_rank: Option<i64>,
    pub group: Option<&'a str>,
    pub similar: Option<SimilarList<'a>>,
    pub category_lines: Vec<&'a str>,
    pub review_summary: Option<&'a str>,
    pub review_lines: Vec<&'a str>,
}

impl<'a> Record<'a> {
    pub fn parse(text: &'a str) -> Self {
        let mut record = Record::default();
        let mut section = Section::Header;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some((label, value)) = split_label(trimmed) {
                match label {
                    "ASIN" => {
                        if record.asin.is_none() {
                            record.asin = value.split_whitespace().next();
                        }
                    }
                    "title" => {
                        if record.title.is_none() && !value.is_empty() {
                            record.title = Some(value);
                        }
                    }
                    "salesrank" => {
                        if record.sales_rank.is_none() {
                            record.sales_rank = value
                                .split_whitespace()
                                .next()
                                .and_then(|tok| tok.parse::<i64>().ok());
                        }
                    }
                    "group" => {
                        if record.group.is_none() {
                            record.group = word_token(value);
                        }
                    }
                    "similar" => {
                        if record.similar.is_none() {
                            record.similar = parse_similar(value);
                        }
                    }
                    "categories" => section = Section::Categories,
                    "reviews" => {
                        section = Section::Reviews;
                        record.review_summary = Some(value);
                    }
                    _ => {}
                }
                continue;
            }

            match section {
                Section::Categories if trimmed.starts_with('|') => {
                    record.category_lines.push(trimmed)
                }
                Section::Reviews => record.review_lines.push(trimmed),
                _ => {}
            }
        }

        record
    }

    /// The product row, if all four required fields were found.
    pub fn product(&self) -> Option<Product> {
        Some(Product {
            asin: self.asin?.to_string(),
            title: Some(self.title?.to_string()),
            sales_rank: Some(self.sales_rank?),
            group: self.group?.to_string(),
        })
    }
}

const LABELS: &[&str] = &[
    "Id",
    "ASIN",
    "title",
    "salesrank",
    "group",
    "similar",
    "categories",
    "reviews",
];

/// Split `label: value` when `label` is one of the grammar's labels.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let (label, value) = line.split_once(':')?;
    if LABELS.contains(&label) {
        Some((label, value.trim()))
    } else {
        None
    }
}

fn word_token(value: &str) -> Option<&str> {
    let end = value
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    if end == 0 {
        None
    } else {
        Some(&value[..end])
    }
}

fn parse_similar(value: &str) -> Option<SimilarList<'_>> {
    let value = value.trim_start();
    let count_end = value
        .find(char::is_whitespace)
        .unwrap_or(value.len());
    let declared = value[..count_end].parse::<usize>().ok()?;
    Some(SimilarList {
        declared,
        tokens: &value[count_end..],
    })
}
