//! Bounded worker pool
//!
//! A batch is pushed through a bounded multi-consumer task channel drained
//! by a fixed number of workers. Each job additionally holds a slot from a shared
//! counting semaphore while it runs, so the in-flight count never exceeds
//! the slot count even if more workers are configured. `run_batch` returns
//! only once every job has finished.

use crate::HarvestError;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Slot instrumentation
#[derive(Debug, Default)]
pub struct PoolStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl PoolStats {
    fn record_acquire(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn record_release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of jobs ever holding a slot at once
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Releases the slot bookkeeping even if the job panics
struct SlotGuard<'a>(&'a PoolStats);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.record_release();
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    slots: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// `workers` consumers sharing `slots` concurrency slots; both are at least 1
    #[must_use]
    pub fn new(workers: usize, slots: usize) -> Self {
        Self {
            workers: workers.max(1),
            slots: Arc::new(Semaphore::new(slots.max(1))),
            stats: Arc::new(PoolStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }

    /// Run `job` over every item and wait for all of them.
    ///
    /// Results come back in input order. A job that panicked yields
    /// [`HarvestError::Worker`]; the remaining jobs are unaffected.
    pub async fn run_batch<T, R, F, Fut>(&self, items: Vec<T>, job: F) -> Vec<Result<R, HarvestError>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let worker_count = self.workers.min(total);
        let (task_tx, task_rx) = async_channel::bounded::<(usize, T)>(worker_count);
        let job = Arc::new(job);

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let rx = task_rx.clone();
            let job = Arc::clone(&job);
            let slots = Arc::clone(&self.slots);
            let stats = Arc::clone(&self.stats);

            handles.push(tokio::spawn(async move {
                let mut done = Vec::new();
                while let Ok((index, item)) = rx.recv().await {
                    let Ok(_permit) = slots.acquire().await else {
                        break;
                    };
                    stats.record_acquire();
                    let _slot = SlotGuard(&stats);
                    let run = job.as_ref();
                    let outcome = AssertUnwindSafe(run(item)).catch_unwind().await;
                    done.push((
                        index,
                        outcome.map_err(|_| HarvestError::Worker(format!("job {index} panicked"))),
                    ));
                }
                debug!(worker_id, jobs = done.len(), "Worker drained");
                done
            }));
        }

        // only workers hold receivers, so a send fails once they are all gone
        drop(task_rx);

        for (index, item) in items.into_iter().enumerate() {
            if task_tx.send((index, item)).await.is_err() {
                warn!("All workers exited before the batch was queued");
                break;
            }
        }
        drop(task_tx);

        let mut results: Vec<Option<Result<R, HarvestError>>> = (0..total).map(|_| None).collect();
        for handle in handles {
            match handle.await {
                Ok(done) => {
                    for (index, result) in done {
                        results[index] = Some(result);
                    }
                }
                Err(e) => warn!(error = %e, "Worker task failed"),
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                result.unwrap_or_else(|| {
                    Err(HarvestError::Worker(format!("job {index} did not complete")))
                })
            })
            .collect()
    }
}
