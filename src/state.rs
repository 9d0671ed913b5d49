//! The operation state: the reference-counted object shared between a
//! promise/packaged-task (producer) and any number of future handles
//! (consumers).
//!
//! A single mutex guards both the value/error slot and the continuation
//! list together, so "publication closes the continuation list to new
//! appends" (spec: no lost wakeups) falls out of normal lock ordering
//! rather than needing a second synchronization mechanism.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use crate::error::{Failure, FutureError};
use crate::executor::Executor;
use crate::stop::StopSource;

pub(crate) type Continuation = Box<dyn FnOnce() + Send>;
pub(crate) type DeferredTask<T, E> = Box<dyn FnOnce() -> Result<T, Failure<E>> + Send>;

enum Slot<T, E> {
    Pending,
    Value(T),
    Error(Failure<E>),
    /// The terminal result has already been moved out by a unique
    /// future's `get`. Only reachable through a programming error in this
    /// crate (a `Shared` is only ever drained once per owning handle);
    /// kept distinct from `Pending` so such a bug panics loudly instead
    /// of silently re-blocking.
    Taken,
}

struct Inner<T, E> {
    slot: Slot<T, E>,
    continuations: SmallVec<[Continuation; 1]>,
}

/// Outcome of a timed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The operation state is terminal.
    Ready,
    /// The deadline elapsed first.
    Timeout,
    /// The state is `always-deferred` and its task has not run yet; this
    /// is reported instead of `Timeout` without running the task.
    Deferred,
}

/// The shared, reference-counted operation state backing every future,
/// promise and packaged task in this crate.
pub(crate) struct Shared<T, E> {
    inner: Mutex<Inner<T, E>>,
    condvar: Condvar,
    deferred: Mutex<Option<DeferredTask<T, E>>>,
    stop: Option<StopSource>,
    executor: Option<Arc<dyn Executor>>,
}

impl<T, E> Shared<T, E> {
    pub(crate) fn new(executor: Option<Arc<dyn Executor>>, stop: Option<StopSource>) -> Arc<Self> {
        Arc::new(Shared {
            inner: Mutex::new(Inner {
                slot: Slot::Pending,
                continuations: SmallVec::new(),
            }),
            condvar: Condvar::new(),
            deferred: Mutex::new(None),
            stop,
            executor,
        })
    }

    pub(crate) fn new_deferred(
        task: DeferredTask<T, E>,
        executor: Option<Arc<dyn Executor>>,
        stop: Option<StopSource>,
    ) -> Arc<Self> {
        let shared = Self::new(executor, stop);
        *shared.deferred.lock() = Some(task);
        shared
    }

    pub(crate) fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.executor.clone()
    }

    pub(crate) fn stop_source(&self) -> Option<&StopSource> {
        self.stop.as_ref()
    }

    pub(crate) fn is_ready(&self) -> bool {
        !matches!(self.inner.lock().slot, Slot::Pending)
    }

    pub(crate) fn is_deferred_unrun(&self) -> bool {
        self.deferred.lock().is_some()
    }

    /// Publishes a value or error. Fails if the state was already
    /// terminal. Continuations are drained and invoked, in FIFO order,
    /// after the lock is released; waiters are then broadcast.
    pub(crate) fn publish(&self, result: Result<T, Failure<E>>) -> Result<(), FutureError> {
        let continuations = {
            let mut guard = self.inner.lock();
            if !matches!(guard.slot, Slot::Pending) {
                return Err(FutureError::PromiseAlreadySatisfied);
            }
            guard.slot = match result {
                Ok(v) => Slot::Value(v),
                Err(e) => Slot::Error(e),
            };
            std::mem::take(&mut guard.continuations)
        };
        for cont in continuations {
            cont();
        }
        self.condvar.notify_all();
        tracing::trace!(count = 1, "operation state published");
        Ok(())
    }

    /// Appends a continuation if the state is still pending; otherwise
    /// runs it immediately, on the calling thread, under no lock.
    pub(crate) fn append_continuation(&self, cb: Continuation) {
        let mut guard = self.inner.lock();
        if matches!(guard.slot, Slot::Pending) {
            guard.continuations.push(cb);
        } else {
            drop(guard);
            cb();
        }
    }

    /// Runs the deferred task inline exactly once, if one is present and
    /// has not run yet.
    fn run_deferred_if_present(&self) {
        let task = self.deferred.lock().take();
        if let Some(task) = task {
            tracing::trace!("running deferred task inline");
            let result = task();
            // A concurrent publisher (there shouldn't normally be one for
            // a deferred state, but nothing prevents e.g. an external
            // `set_error` on a promise-backed deferred state) may have
            // already published; that is reported, not treated as a bug.
            let _ = self.publish(result);
        }
    }

    /// Blocks until terminal, running the deferred task inline first if
    /// one is present.
    pub(crate) fn wait(&self) {
        self.run_deferred_if_present();
        let mut guard = self.inner.lock();
        while matches!(guard.slot, Slot::Pending) {
            self.condvar.wait(&mut guard);
        }
    }

    /// Waits up to `timeout`. Reports `Deferred` instead of running the
    /// task or reporting `Timeout` if the task has not run yet.
    pub(crate) fn wait_for(&self, timeout: Duration) -> WaitStatus {
        if self.is_ready() {
            return WaitStatus::Ready;
        }
        if self.deferred.lock().is_some() {
            return WaitStatus::Deferred;
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock();
        loop {
            if !matches!(guard.slot, Slot::Pending) {
                return WaitStatus::Ready;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitStatus::Timeout;
            }
            let timed_out = self
                .condvar
                .wait_for(&mut guard, deadline - now)
                .timed_out();
            if timed_out && matches!(guard.slot, Slot::Pending) {
                return WaitStatus::Timeout;
            }
        }
    }

    /// Moves the terminal result out. Panics if the state is not
    /// terminal or has already been drained, both are programming
    /// errors internal to this crate; callers always `wait` first and
    /// drain at most once per unique handle.
    pub(crate) fn take_result(&self) -> Result<T, Failure<E>> {
        let mut guard = self.inner.lock();
        match std::mem::replace(&mut guard.slot, Slot::Taken) {
            Slot::Pending => unreachable!("take_result called on a pending state"),
            Slot::Taken => unreachable!("take_result called twice on the same state"),
            Slot::Value(v) => Ok(v),
            Slot::Error(e) => Err(e),
        }
    }
}

impl<T: Clone, E: Clone> Shared<T, E> {
    /// Clones the terminal result out without consuming it. Used by
    /// shared futures, whose `get` is non-destructive. Panics if the
    /// state is not terminal yet.
    pub(crate) fn peek_result(&self) -> Result<T, Failure<E>> {
        let guard = self.inner.lock();
        match &guard.slot {
            Slot::Pending => unreachable!("peek_result called on a pending state"),
            Slot::Taken => unreachable!("peek_result called on a drained state"),
            Slot::Value(v) => Ok(v.clone()),
            Slot::Error(e) => Err(e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_wakes_waiter_and_second_publish_fails() {
        let state: Arc<Shared<i32, String>> = Shared::new(None, None);
        assert!(state.publish(Ok(42)).is_ok());
        assert!(matches!(
            state.publish(Ok(0)),
            Err(FutureError::PromiseAlreadySatisfied)
        ));
        state.wait();
        assert_eq!(state.take_result().unwrap(), 42);
    }

    #[test]
    fn append_continuation_after_publish_runs_inline() {
        let state: Arc<Shared<i32, String>> = Shared::new(None, None);
        state.publish(Ok(1)).unwrap();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran2 = ran.clone();
        state.append_continuation(Box::new(move || {
            ran2.store(true, std::sync::atomic::Ordering::SeqCst);
        }));
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn continuations_run_in_fifo_order() {
        let state: Arc<Shared<i32, String>> = Shared::new(None, None);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            state.append_continuation(Box::new(move || order.lock().push(i)));
        }
        state.publish(Ok(0)).unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn wait_for_zero_on_pending_returns_timeout() {
        let state: Arc<Shared<i32, String>> = Shared::new(None, None);
        assert_eq!(state.wait_for(Duration::from_secs(0)), WaitStatus::Timeout);
    }

    #[test]
    fn wait_for_zero_on_deferred_returns_deferred() {
        let state: Arc<Shared<i32, String>> =
            Shared::new_deferred(Box::new(|| Ok(7)), None, None);
        assert_eq!(state.wait_for(Duration::from_secs(0)), WaitStatus::Deferred);
        assert!(state.is_deferred_unrun());
    }

    #[test]
    fn deferred_task_runs_exactly_once() {
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let runs2 = runs.clone();
        let state: Arc<Shared<i32, String>> = Shared::new_deferred(
            Box::new(move || {
                runs2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(5)
            }),
            None,
            None,
        );
        state.wait();
        state.wait();
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
