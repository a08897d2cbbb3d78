//! Bounded worker pool shared by both ingestion phases.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{IngestError, Result};

/// At most `size` jobs run at once; the rest wait for a permit.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run every job and wait for all of them, failed or not.
    ///
    /// Results come back in job order. A job that panics is reported as
    /// [`IngestError::Join`] in its slot.
    pub async fn run_all<F, T>(&self, jobs: Vec<F>) -> Vec<Result<T>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let total = jobs.len();
        let mut set = JoinSet::new();
        for (slot, job) in jobs.into_iter().enumerate() {
            let permits = self.permits.clone();
            set.spawn(async move {
                let out = match permits.acquire_owned().await {
                    Ok(_permit) => job.await,
                    Err(_) => Err(IngestError::PoolClosed),
                };
                (slot, out)
            });
        }

        let mut results: Vec<Option<Result<T>>> = (0..total).map(|_| None).collect();
        let mut aborted = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, out)) => results[slot] = Some(out),
                Err(e) => {
                    tracing::error!(error = %e, "worker task aborted");
                    aborted.push(e);
                }
            }
        }

        // A panicked task never reported its slot; the empty slots are
        // exactly the aborted ones.
        let mut aborted = aborted.into_iter();
        results
            .into_iter()
            .map(|r| match r {
                Some(out) => out,
                None => match aborted.next() {
                    Some(e) => Err(IngestError::Join(e)),
                    None => Err(IngestError::PoolClosed),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_pool_size() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..8)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                }
            })
            .collect();
        let results = pool.run_all(jobs).await;
        let values: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..8).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn failure_does_not_cancel_siblings() {
        let pool = WorkerPool::new(1);
        let done = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..4)
            .map(|i| {
                let done = done.clone();
                async move {
                    done.fetch_add(1, Ordering::SeqCst);
                    if i == 0 {
                        Err(IngestError::PoolClosed)
                    } else {
                        Ok(i)
                    }
                }
            })
            .collect();
        let results = pool.run_all(jobs).await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert!(results[0].is_err());
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    }

    #[tokio::test]
    async fn panics_surface_as_join_errors() {
        let pool = WorkerPool::new(2);
        let jobs: Vec<std::pin::Pin<Box<dyn Future<Output = Result<u8>> + Send>>> = vec![
            Box::pin(async { Ok(1) }),
            Box::pin(async {
                let fail = true;
                if fail {
                    panic!("boom");
                }
                Ok(2)
            }),
        ];
        let results = pool.run_all(jobs).await;
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(matches!(results[1], Err(IngestError::Join(_))));
    }

    #[test]
    fn zero_size_is_clamped() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
