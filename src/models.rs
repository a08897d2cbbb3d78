//! Core data models used throughout the loader.
//!
//! These types are the rows that flow from the block parser through the
//! batch writers into a [`Store`](crate::store::Store).

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// Title and group written for a product that is only known by reference.
pub const PLACEHOLDER: &str = "unknown";

/// A product row, keyed by its ASIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub asin: String,
    pub title: Option<String>,
    pub sales_rank: Option<i64>,
    pub group: String,
}

impl Product {
    /// Minimal row that satisfies foreign keys until the real definition
    /// is upserted over it.
    pub fn placeholder(asin: &str) -> Self {
        Self {
            asin: asin.to_string(),
            title: Some(PLACEHOLDER.to_string()),
            sales_rank: None,
            group: PLACEHOLDER.to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.sales_rank.is_none()
            && self.group == PLACEHOLDER
            && self.title.as_deref() == Some(PLACEHOLDER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Membership of a product in a category. Path depth is not retained.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ProductCategory {
    pub asin: String,
    pub category_id: i64,
}

/// Directed "customers also bought" link.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SimilarityEdge {
    pub asin: String,
    pub similar_asin: String,
}

/// A customer review line.
///
/// `key` is the surrogate identifier: the owning ASIN plus the ordinal of
/// the line within its block's review section, so re-loading the same
/// corpus maps every line back onto the same row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub key: String,
    pub asin: String,
    pub date: NaiveDate,
    pub customer: String,
    pub rating: i64,
    pub votes: i64,
    pub helpful: i64,
}

impl Review {
    pub fn surrogate_key(asin: &str, ordinal: usize) -> String {
        format!("{}#{}", asin, ordinal)
    }
}

/// Entity types written by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Placeholder,
    Category,
    ProductCategory,
    Similarity,
    Review,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Placeholder => "placeholder",
            EntityKind::Category => "category",
            EntityKind::ProductCategory => "product_category",
            EntityKind::Similarity => "similarity",
            EntityKind::Review => "review",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row counts per table, as reported by a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub products: i64,
    pub placeholders: i64,
    pub categories: i64,
    pub product_categories: i64,
    pub similar_products: i64,
    pub reviews: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_shape() {
        let p = Product::placeholder("B002");
        assert_eq!(p.asin, "B002");
        assert_eq!(p.title.as_deref(), Some("unknown"));
        assert_eq!(p.group, "unknown");
        assert_eq!(p.sales_rank, None);
        assert!(p.is_placeholder());
    }

    #[test]
    fn full_product_is_not_placeholder() {
        let p = Product {
            asin: "B001".into(),
            title: Some("Widget".into()),
            sales_rank: Some(500),
            group: "Book".into(),
        };
        assert!(!p.is_placeholder());
    }

    #[test]
    fn review_key_includes_ordinal() {
        assert_eq!(Review::surrogate_key("B001", 0), "B001#0");
        assert_ne!(
            Review::surrogate_key("B001", 1),
            Review::surrogate_key("B001", 2)
        );
    }
}
