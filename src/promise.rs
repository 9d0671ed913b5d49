//! The production side of an operation state: [`Promise`]/[`Complete`]
//! for manual value/error publication, and [`PackagedTask`] for wrapping
//! an ordinary closure so it publishes its own return value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{panic_message, Failure, FutureError};
use crate::executor::Executor;
use crate::future::Future;
use crate::state::Shared;
use crate::stop::{StopSource, StopToken};

/// The future-retrieving half of a promise/complete pair.
///
/// Splitting retrieval (`Promise`) from publication (`Complete`) lets
/// the two halves travel to different places, typically `Complete`
/// moves into a closure and `Promise` stays behind to hand out the
/// future, without either side needing `&mut` access to the other.
pub struct Promise<T, E, const CONTINUABLE: bool = false, const STOPPABLE: bool = false> {
    state: Option<Arc<Shared<T, E>>>,
    retrieved: AtomicBool,
}

/// The value/error-publishing half of a promise/complete pair.
///
/// Dropping a `Complete` that never published anything publishes
/// [`Failure::BrokenPromise`] to every future derived from its promise.
pub struct Complete<T, E> {
    state: Option<Arc<Shared<T, E>>>,
}

impl<T, E, const C: bool, const S: bool> Promise<T, E, C, S> {
    /// Creates a fresh promise/complete pair with no executor affinity.
    pub fn new() -> (Self, Complete<T, E>) {
        Self::with_executor(None)
    }

    pub(crate) fn with_executor(executor: Option<Arc<dyn Executor>>) -> (Self, Complete<T, E>) {
        let stop = if S { Some(StopSource::new()) } else { None };
        let state = Shared::new(executor, stop);
        (
            Promise {
                state: Some(state.clone()),
                retrieved: AtomicBool::new(false),
            },
            Complete { state: Some(state) },
        )
    }

    /// Hands back the future bound to this promise. Only the first call
    /// succeeds; later calls return [`FutureError::FutureAlreadyRetrieved`].
    pub fn get_future(&self) -> Result<Future<T, E, C, S>, FutureError> {
        let state = self.state.clone().ok_or(FutureError::PromiseUninitialized)?;
        if self.retrieved.swap(true, Ordering::SeqCst) {
            return Err(FutureError::FutureAlreadyRetrieved);
        }
        Ok(Future::from_shared(state))
    }
}

impl<T, E> Complete<T, E> {
    /// Publishes a value. Fails if the state was already terminal.
    pub fn set_value(&self, value: T) -> Result<(), FutureError> {
        self.publish(Ok(value))
    }

    /// Publishes an error. Fails if the state was already terminal.
    pub fn set_error(&self, error: E) -> Result<(), FutureError> {
        self.publish(Err(Failure::Failed(error)))
    }

    fn publish(&self, result: Result<T, Failure<E>>) -> Result<(), FutureError> {
        let state = self.state.as_ref().ok_or(FutureError::PromiseUninitialized)?;
        state.publish(result)
    }

    pub(crate) fn publish_result(&self, result: Result<T, Failure<E>>) -> Result<(), FutureError> {
        self.publish(result)
    }
}

impl<T, E> Drop for Complete<T, E> {
    fn drop(&mut self) {
        if let Some(state) = &self.state {
            // No-op if something was already published; the error is
            // deliberately discarded, there is nobody left to report it
            // to from inside a destructor.
            let _ = state.publish(Err(Failure::BrokenPromise));
        }
    }
}

/// A future that is already ready with `value`.
pub fn make_ready_future<T, E, const C: bool, const S: bool>(value: T) -> Future<T, E, C, S>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let (promise, complete) = Promise::new();
    complete
        .set_value(value)
        .expect("fresh promise cannot already be satisfied");
    promise.get_future().expect("fresh promise")
}

/// A future that is already ready with `error`.
pub fn make_exceptional_future<T, E, const C: bool, const S: bool>(error: E) -> Future<T, E, C, S>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let (promise, complete) = Promise::new();
    complete
        .set_error(error)
        .expect("fresh promise cannot already be satisfied");
    promise.get_future().expect("fresh promise")
}

/// Wraps a fallible closure so that running it publishes its own result,
/// success, task-returned error, or caught panic, to a future handed
/// out via [`PackagedTask::get_future`].
pub struct PackagedTask<F, T, E, const CONTINUABLE: bool = false, const STOPPABLE: bool = false> {
    func: Option<F>,
    promise: Promise<T, E, CONTINUABLE, STOPPABLE>,
    complete: Option<Complete<T, E>>,
}

/// Creates a future whose task body runs lazily, on whichever thread
/// first calls [`Waitable::wait`](crate::Waitable::wait) or
/// [`Future::get`], or observes `Ready` from a timed wait, rather than
/// eagerly on a separate thread.
///
/// Calling `wait_for` before that first wait reports
/// [`WaitStatus::Deferred`](crate::WaitStatus::Deferred) instead of
/// running the task or timing out.
pub fn deferred<T, E, F>(task: F) -> Future<T, E, false, false>
where
    F: FnOnce() -> Result<T, Failure<E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let state = Shared::new_deferred(Box::new(task), None, None);
    Future::from_shared(state)
}

impl<F, T, E, const C: bool> PackagedTask<F, T, E, C, false>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wraps `func`, ready to be handed to an executor or run directly.
    pub fn new(func: F) -> Self {
        Self::with_executor(func, None)
    }

    pub(crate) fn with_executor(func: F, executor: Option<Arc<dyn Executor>>) -> Self {
        let (promise, complete) = Promise::with_executor(executor);
        PackagedTask {
            func: Some(func),
            promise,
            complete: Some(complete),
        }
    }

    /// Hands back the future this task will eventually complete. Only
    /// the first call succeeds.
    pub fn get_future(&self) -> Result<Future<T, E, C, false>, FutureError> {
        self.promise.get_future()
    }

    /// Runs the wrapped closure once, catching any panic, and publishes
    /// the outcome. Panics (on the calling thread only, not propagated)
    /// if called twice on the same task.
    pub fn run(mut self) {
        let func = self
            .func
            .take()
            .unwrap_or_else(|| panic!("packaged task run more than once"));
        let complete = self
            .complete
            .take()
            .unwrap_or_else(|| panic!("packaged task run more than once"));
        let outcome = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(func)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Failure::Failed(e)),
            Err(payload) => Err(Failure::Panicked(panic_message(payload))),
        };
        let _ = complete.publish_result(outcome);
    }
}

impl<F, T, E, const C: bool> PackagedTask<F, T, E, C, true>
where
    F: FnOnce(StopToken) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wraps `func`, giving it a [`StopToken`] observing this task's own
    /// stop source so it can cooperatively exit early.
    pub fn new_stoppable(func: F) -> Self {
        Self::with_executor(func, None)
    }

    pub(crate) fn with_executor(func: F, executor: Option<Arc<dyn Executor>>) -> Self {
        let (promise, complete) = Promise::with_executor(executor);
        PackagedTask {
            func: Some(func),
            promise,
            complete: Some(complete),
        }
    }

    /// See [`PackagedTask::get_future`] (the non-stoppable variant).
    pub fn get_future(&self) -> Result<Future<T, E, C, true>, FutureError> {
        self.promise.get_future()
    }

    /// Like [`PackagedTask::run`] (the non-stoppable variant), but hands
    /// the task its own stop token before running it.
    pub fn run(mut self) {
        let func = self
            .func
            .take()
            .unwrap_or_else(|| panic!("packaged task run more than once"));
        let complete = self
            .complete
            .take()
            .unwrap_or_else(|| panic!("packaged task run more than once"));
        let token = self
            .promise
            .state
            .as_ref()
            .and_then(|s| s.stop_source())
            .map(|s| s.token())
            .expect("stoppable packaged task always carries a stop source");
        let outcome = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            func(token)
        })) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Failure::Failed(e)),
            Err(payload) => Err(Failure::Panicked(panic_message(payload))),
        };
        let _ = complete.publish_result(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::Waitable;

    #[test]
    fn set_value_then_get_future_roundtrips() {
        let (promise, complete) = Promise::<i32, String>::new();
        complete.set_value(42).unwrap();
        let fut = promise.get_future().unwrap();
        assert_eq!(fut.get().unwrap(), 42);
    }

    #[test]
    fn second_get_future_errs() {
        let (promise, _complete) = Promise::<i32, String>::new();
        let _first = promise.get_future().unwrap();
        assert!(matches!(
            promise.get_future(),
            Err(FutureError::FutureAlreadyRetrieved)
        ));
    }

    #[test]
    fn dropping_complete_without_publishing_breaks_the_promise() {
        let (promise, complete) = Promise::<i32, String>::new();
        let fut = promise.get_future().unwrap();
        drop(complete);
        assert!(matches!(fut.get(), Err(Failure::BrokenPromise)));
    }

    #[test]
    fn packaged_task_publishes_return_value() {
        let task: PackagedTask<_, i32, String> = PackagedTask::new(|| Ok(7));
        let fut = task.get_future().unwrap();
        task.run();
        assert_eq!(fut.get().unwrap(), 7);
    }

    #[test]
    fn packaged_task_catches_panics() {
        let task: PackagedTask<_, i32, String> = PackagedTask::new(|| panic!("boom"));
        let fut = task.get_future().unwrap();
        task.run();
        match fut.get() {
            Err(Failure::Panicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }

    #[test]
    fn packaged_task_dropped_unrun_breaks_the_promise() {
        let task: PackagedTask<fn() -> Result<i32, String>, i32, String> =
            PackagedTask::new(|| Ok(1));
        let fut = task.get_future().unwrap();
        drop(task);
        assert!(fut.wait().is_ok());
        assert!(matches!(fut.get(), Err(Failure::BrokenPromise)));
    }
}
