//! Bounded-concurrency fan-out/fan-in of scan and write units
//!
//! Every unit runs as its own task on a dedicated rayon pool. Before touching
//! any external process a unit takes a permit from [`Admission`], a counting
//! semaphore sized to the worker limit, and holds it until it has finished and
//! reported progress. Results flow back over a bounded channel whose capacity
//! covers every result, so producers never wait on the consumer.

use crate::error::{ReplaytagError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Counting semaphore gating external-process invocations
pub struct Admission {
    slots: Sender<()>,
    tokens: Receiver<()>,
    limit: usize,
}

/// Held while a unit runs; releases its slot on drop
pub struct Permit<'a> {
    admission: &'a Admission,
}

impl Admission {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let (slots, tokens) = bounded(limit);
        Self {
            slots,
            tokens,
            limit,
        }
    }

    /// Block until a slot is free
    pub fn acquire(&self) -> Permit<'_> {
        // Both ends live in self, so the channel cannot be disconnected
        let _ = self.slots.send(());
        Permit { admission: self }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits currently held
    pub fn in_use(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.admission.tokens.try_recv();
    }
}

/// Runs independent units with a hard ceiling on concurrent work
pub struct Scheduler {
    pool: rayon::ThreadPool,
    admission: Admission,
}

impl Scheduler {
    pub fn new(workers_limit: usize) -> Result<Self> {
        if workers_limit == 0 {
            return Err(ReplaytagError::ConfigError(
                "worker limit must be at least 1".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers_limit)
            .thread_name(|i| format!("replaytag-worker-{}", i))
            .build()
            .map_err(|e| {
                ReplaytagError::ConfigError(format!("Failed to configure thread pool: {}", e))
            })?;

        debug!("Configured scheduler with {} workers", workers_limit);

        Ok(Self {
            pool,
            admission: Admission::new(workers_limit),
        })
    }

    pub fn workers_limit(&self) -> usize {
        self.admission.limit()
    }

    /// Run `work` once per unit and collect everything the units send
    ///
    /// `capacity` must be at least the total number of items all units send.
    /// The progress bar advances exactly once per unit, whatever the unit's
    /// outcome. Result order is arrival order.
    pub fn run<U, T, F>(
        &self,
        units: Vec<U>,
        capacity: usize,
        progress: &ProgressBar,
        work: F,
    ) -> Vec<T>
    where
        U: Send,
        T: Send,
        F: Fn(U, &Sender<T>) + Sync,
    {
        let (tx, rx) = bounded::<T>(capacity.max(1));
        let work = &work;
        let admission = &self.admission;

        self.pool.scope(|scope| {
            for unit in units {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let _permit = admission.acquire();
                    work(unit, &tx);
                    progress.inc(1);
                });
            }
        });

        drop(tx);
        rx.into_iter().collect()
    }
}

/// Progress bar for one scheduled phase, hidden when output is quiet
pub fn phase_progress(len: usize, message: &'static str, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(message);
    pb
}
