//! Fixed-size worker pool for background loads.
//!
//! Workers pull jobs from one shared queue. The pool is owned by the asset
//! manager: it is started in the constructor and joined on close.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{AssetError, AssetResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool of named threads executing queued jobs.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool with `num_threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if num_threads is 0.
    pub fn new(num_threads: usize) -> AssetResult<Self> {
        assert!(num_threads > 0, "WorkerPool must have at least one thread");

        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut pool = Self {
            sender: Some(sender),
            threads: Vec::with_capacity(num_threads),
        };

        for i in 0..num_threads {
            let receiver = receiver.clone();
            // on error the partially built pool is dropped, which joins the
            // threads spawned so far
            let handle = thread::Builder::new()
                .name(format!("cairn-loader-{}", i))
                .spawn(move || worker_loop(receiver))
                .map_err(|source| AssetError::WorkerSpawn { source })?;
            pool.threads.push(handle);
        }

        tracing::debug!("WorkerPool created with {} threads", num_threads);
        Ok(pool)
    }

    /// Twice the available parallelism.
    ///
    /// Loads are mostly I/O bound, but an unbounded number of them would
    /// thrash a mechanical disk.
    pub fn default_size() -> usize {
        (2 * num_cpus::get()).max(1)
    }

    /// Queue a job. Returns false if the pool has been shut down.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Get the number of threads in this pool.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Stop accepting jobs, run the ones already queued, and join the workers.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        tracing::debug!("Shutting down WorkerPool with {} threads", self.threads.len());

        for handle in self.threads.drain(..) {
            if let Err(e) = handle.join() {
                tracing::error!("Worker thread panicked: {:?}", e);
            }
        }

        tracing::debug!("WorkerPool shutdown complete");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    // recv fails once the sender is gone and the queue is empty
    while let Ok(job) = receiver.recv() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(
                "Job panicked on {}",
                thread::current().name().unwrap_or("<unnamed>")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pool_creation() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.thread_count(), 2);
    }

    #[test]
    fn test_default_size() {
        assert!(WorkerPool::default_size() >= 2);
    }

    #[test]
    #[should_panic(expected = "WorkerPool must have at least one thread")]
    fn test_zero_threads_panics() {
        let _ = WorkerPool::new(0);
    }

    #[test]
    fn test_shutdown_runs_queued_jobs() {
        let mut pool = WorkerPool::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let counter = counter.clone();
            assert!(pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(pool.thread_count(), 0);
        assert!(!pool.execute(|| {}));
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let mut pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.execute(|| panic!("boom"));
        let c = counter.clone();
        pool.execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
