//! # catalog-ingest
//!
//! A bulk loader for a flat-text product catalog (the Amazon product
//! co-purchasing metadata format) into a relational store.
//!
//! The corpus is a sequence of `Id:`-anchored records carrying product
//! fields, category paths, customer reviews and similar-product links. The
//! loader splits it into block-aligned partitions and runs the extractors
//! across a bounded worker pool, writing through batched, idempotent
//! store calls.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────────┐   ┌──────────┐
//! │  Corpus  │──▶│ Partition │──▶│ Sinks (per      │──▶│  Store   │
//! │  (mmap)  │   │  split    │   │ partition, pool)│   │ (SQLite) │
//! └──────────┘   └───────────┘   └─────────────────┘   └──────────┘
//!                                  phase 1: products
//!                                  phase 2: categories, reviews, similar
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! catalog-ingest init
//! catalog-ingest load amazon-meta.txt
//! catalog-ingest stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Row types |
//! | [`parse`] | Block segmentation and record fields |
//! | [`categories`] | Category paths |
//! | [`reviews`] | Review lines |
//! | [`similar`] | Similar-product links |
//! | [`referents`] | Placeholder products for dangling references |
//! | [`writer`] | Batched writes |
//! | [`sink`] | Per-partition record consumers |
//! | [`partition`] | Block-aligned corpus partitions |
//! | [`pool`] | Bounded worker pool |
//! | [`ingest`] | Two-phase load coordinator |
//! | [`store`] | Store trait, SQLite and in-memory backends |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod categories;
pub mod config;
pub mod corpus;
pub mod db;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod partition;
pub mod pool;
pub mod progress;
pub mod referents;
pub mod reviews;
pub mod similar;
pub mod sink;
pub mod stats;
pub mod store;
pub mod writer;
