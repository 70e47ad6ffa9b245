//! Bounded worker pool for independent per-record work.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::debug;

use crate::config::MaintenanceConfig;
use crate::error::{FusionError, FusionResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool running units of work submitted by a single
/// coordinator.
///
/// Units share nothing but their input and their result; results are
/// handed back in submission order. The queue is bounded, so submission
/// blocks while every worker is busy and the queue is full.
pub struct StreamExecutor {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl std::fmt::Debug for StreamExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamExecutor")
            .field("workers", &self.workers.len())
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl StreamExecutor {
    /// Starts the workers.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a worker thread cannot be spawned.
    pub fn start(config: &MaintenanceConfig) -> FusionResult<Self> {
        let workers = config.effective_workers();
        let queue_capacity = config.effective_queue_capacity().max(1);
        let (tx, rx) = bounded::<Task>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Task> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("timefuse-maintenance-{idx}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        task();
                    }
                })
                .map_err(|e| FusionError::internal(format!("failed to spawn maintenance worker: {e}")))?;
            handles.push(handle);
        }
        debug!(workers, queue_capacity, "maintenance pool started");

        Ok(Self {
            tx: Some(tx),
            workers: handles,
            queue_capacity,
        })
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Runs `work` on every input and returns `(input, result)` pairs in
    /// submission order.
    ///
    /// A failing or panicking unit only affects its own result.
    pub fn map<T, R, F>(&self, inputs: impl IntoIterator<Item = T>, work: F) -> Vec<(T, FusionResult<R>)>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(&T) -> FusionResult<R> + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let (result_tx, result_rx) = unbounded::<(usize, T, FusionResult<R>)>();
        let mut submitted = 0;
        let mut rejected = Vec::new();

        for (seq, input) in inputs.into_iter().enumerate() {
            let work = Arc::clone(&work);
            let result_tx = result_tx.clone();
            let task: Task = Box::new(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| work(&input)))
                    .unwrap_or_else(|_| Err(FusionError::internal("maintenance unit panicked")));
                let _ = result_tx.send((seq, input, result));
            });
            match self.tx.as_ref().map(|tx| tx.send(task)) {
                Some(Ok(())) => submitted += 1,
                _ => rejected.push(seq),
            }
        }
        drop(result_tx);

        let mut results: Vec<(usize, T, FusionResult<R>)> = result_rx.iter().take(submitted).collect();
        results.sort_by_key(|(seq, _, _)| *seq);
        if !rejected.is_empty() {
            debug!(rejected = rejected.len(), "maintenance pool closed during submission");
        }
        results.into_iter().map(|(_, input, result)| (input, result)).collect()
    }
}

impl Drop for StreamExecutor {
    fn drop(&mut self) {
        // Closing the channel lets workers drain queued tasks, then exit.
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
