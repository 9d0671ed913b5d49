//! Executors: where a future's continuation or a packaged task's body
//! actually runs.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Sender};
use once_cell::sync::Lazy;

/// Something that can run a unit of work.
///
/// Implementors decide when and on which thread `task` runs; they must
/// not block the caller of `schedule` waiting for it to finish.
pub trait Executor: Send + Sync {
    /// Submits `task` for execution. Returns once the task has been
    /// handed off, not once it has run.
    fn schedule(&self, task: Box<dyn FnOnce() + Send>);
}

/// Runs every task immediately, on the thread that called `schedule`.
///
/// Useful for tests and for continuations cheap enough that spawning a
/// thread-pool job would cost more than just running them.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// A fixed-size pool of worker threads draining a single shared queue.
///
/// Workers are detached daemon threads; the pool has no shutdown
/// method; dropping the last `Arc<ThreadPoolExecutor>` closes the
/// channel, which lets each worker's `recv` loop exit once the queue
/// drains.
pub struct ThreadPoolExecutor {
    sender: Sender<Box<dyn FnOnce() + Send>>,
}

impl ThreadPoolExecutor {
    /// Spawns `size` worker threads. Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "thread pool executor needs at least one worker");
        let (sender, receiver) = unbounded::<Box<dyn FnOnce() + Send>>();
        for id in 0..size {
            let receiver = receiver.clone();
            std::thread::Builder::new()
                .name(format!("threadfutures-worker-{id}"))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        task();
                    }
                    tracing::trace!(worker = id, "executor worker shutting down");
                })
                .expect("failed to spawn executor worker thread");
        }
        ThreadPoolExecutor { sender }
    }

    /// Sizes the pool from the `THREADFUTURES_POOL_SIZE` environment
    /// variable, falling back to `max(2, available CPUs)` so a single
    /// continuation blocking on another pool task can't deadlock a
    /// single-core host. The env override itself is not floored.
    pub fn from_env() -> Self {
        let size = std::env::var("THREADFUTURES_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map_or(1, |n| n.get())
                    .max(2)
            });
        tracing::debug!(size, "starting thread pool executor");
        ThreadPoolExecutor::new(size)
    }
}

impl Executor for ThreadPoolExecutor {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) {
        // An unbounded channel with live workers never errs; ignore the
        // case where every worker thread has somehow died rather than
        // propagating a send error nobody can act on.
        let _ = self.sender.send(task);
    }
}

static DEFAULT_EXECUTOR: Lazy<Arc<dyn Executor>> =
    Lazy::new(|| Arc::new(ThreadPoolExecutor::from_env()));

/// The process-wide default executor, lazily started on first use.
pub fn default_executor() -> Arc<dyn Executor> {
    DEFAULT_EXECUTOR.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn inline_executor_runs_synchronously() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        InlineExecutor.schedule(Box::new(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn thread_pool_runs_all_scheduled_tasks() {
        let pool = ThreadPoolExecutor::new(4);
        let barrier = Arc::new(Barrier::new(9));
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let barrier = barrier.clone();
            let counter = counter.clone();
            pool.schedule(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                barrier.wait();
            }));
        }
        barrier.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
