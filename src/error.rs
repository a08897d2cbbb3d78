//! Error types for the ingestion core.
//!
//! Field-level parse misses never become errors; they are skipped where
//! they occur. What remains is a store rejecting a batch, which fails the
//! task that issued it, and the per-phase aggregate of failed tasks.

use std::fmt;

use thiserror::Error;

use crate::models::EntityKind;

/// Ingestion phase. Every product phase task finishes before any
/// relations phase task starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Products,
    Relations,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Products => f.write_str("products"),
            Phase::Relations => f.write_str("relations"),
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// A batch flush was rejected. Batches flushed before it stay committed.
    #[error("store rejected a batch of {rows} {entity} rows: {source:#}")]
    StoreWrite {
        entity: EntityKind,
        rows: usize,
        #[source]
        source: anyhow::Error,
    },

    /// An existence check against the store failed.
    #[error("store lookup for product '{asin}' failed: {source:#}")]
    StoreRead {
        asin: String,
        #[source]
        source: anyhow::Error,
    },

    /// One partition's task failed.
    #[error("partition {partition} ({task}) failed: {source}")]
    Task {
        partition: usize,
        task: &'static str,
        #[source]
        source: Box<IngestError>,
    },

    /// The worker pool was shut down while a job waited for a permit.
    #[error("worker pool closed")]
    PoolClosed,

    /// A worker panicked or was cancelled before reporting.
    #[error("worker task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// At least one task of a phase failed; all of its siblings were
    /// drained before this was reported.
    #[error("{phase} phase failed in {} of {total} tasks", failures.len())]
    PhaseFailed {
        phase: Phase,
        total: usize,
        failures: Vec<IngestError>,
    },
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_failure_message_counts_failures() {
        let inner = IngestError::StoreWrite {
            entity: EntityKind::Review,
            rows: 10,
            source: anyhow::anyhow!("disk full"),
        };
        let task = IngestError::Task {
            partition: 3,
            task: "reviews",
            source: Box::new(inner),
        };
        assert_eq!(
            task.to_string(),
            "partition 3 (reviews) failed: store rejected a batch of 10 review rows: disk full"
        );
        let phase = IngestError::PhaseFailed {
            phase: Phase::Relations,
            total: 6,
            failures: vec![task],
        };
        assert_eq!(phase.to_string(), "relations phase failed in 1 of 6 tasks");
    }
}
