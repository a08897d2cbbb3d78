//! Database statistics overview.
//!
//! Provides a quick summary of what a load produced: row counts per table,
//! how many products are still placeholders, and the size of the database
//! file. Used by `catalog-ingest stats`.

use anyhow::Result;

use crate::config::Config;
use crate::models::TableCounts;
use crate::store::{SqliteStore, Store};

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let counts = store.counts().await?;
    store.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("catalog-ingest: database stats");
    println!("==============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    print_counts(&counts);
    println!();

    Ok(())
}

fn print_counts(c: &TableCounts) {
    println!("  {:<20} {:>12}", "TABLE", "ROWS");
    println!("  {}", "-".repeat(33));
    println!("  {:<20} {:>12}", "products", c.products);
    println!(
        "  {:<20} {:>12}   ({}% of products)",
        "  placeholders",
        c.placeholders,
        percent(c.placeholders, c.products)
    );
    println!("  {:<20} {:>12}", "categories", c.categories);
    println!("  {:<20} {:>12}", "product_categories", c.product_categories);
    println!("  {:<20} {:>12}", "similar_products", c.similar_products);
    println!("  {:<20} {:>12}", "reviews", c.reviews);
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part * 100) / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
