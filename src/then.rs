//! Continuations: scheduling a follow-up computation to run once a
//! future becomes ready.
//!
//! Two call shapes, matching the two ways a continuation can want to
//! see its antecedent's outcome:
//!
//! - [`Future::then`]: runs only on success, receives the unwrapped
//!   value, and lets a broken promise or task failure pass through
//!   unchanged.
//! - [`Future::then_catching`]: always runs, receives the antecedent's
//!   full `Result<T, Failure<E>>`, and can translate the error type.
//!
//! Both register a continuation on the antecedent's state (run inline,
//! on whichever thread publishes it, or immediately if it is already
//! ready) whose only job is to hand the actual continuation body off to
//! an executor, the antecedent's own executor if it has one, otherwise
//! the process-wide default.

use std::sync::Arc;

use crate::error::Failure;
use crate::executor::{default_executor, Executor};
use crate::future::{Future, SharedFuture};
use crate::state::Shared;
use crate::stop::StopSource;

fn chain<T, E, U, EU, F>(
    antecedent: Arc<Shared<T, E>>,
    stop: Option<StopSource>,
    f: F,
) -> Arc<Shared<U, EU>>
where
    T: Send + 'static,
    E: Send + 'static,
    U: Send + 'static,
    EU: Send + 'static,
    F: FnOnce(Result<T, Failure<E>>) -> Result<U, Failure<EU>> + Send + 'static,
{
    let executor = antecedent.executor().unwrap_or_else(default_executor);
    let new_state = Shared::new(Some(executor.clone()), stop);
    let new_state_for_cb = new_state.clone();
    let extract_state = antecedent.clone();
    antecedent.append_continuation(Box::new(move || {
        let result = extract_state.take_result();
        let new_state2 = new_state_for_cb;
        let f = f;
        executor.schedule(Box::new(move || {
            let _ = new_state2.publish(f(result));
        }));
    }));
    new_state
}

fn chain_shared<T, E, U, EU, F>(
    antecedent: Arc<Shared<T, E>>,
    stop: Option<StopSource>,
    f: F,
) -> Arc<Shared<U, EU>>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    U: Send + 'static,
    EU: Send + 'static,
    F: FnOnce(Result<T, Failure<E>>) -> Result<U, Failure<EU>> + Send + 'static,
{
    let executor = antecedent.executor().unwrap_or_else(default_executor);
    let new_state = Shared::new(Some(executor.clone()), stop);
    let new_state_for_cb = new_state.clone();
    let extract_state = antecedent.clone();
    antecedent.append_continuation(Box::new(move || {
        let result = extract_state.peek_result();
        let new_state2 = new_state_for_cb;
        let f = f;
        executor.schedule(Box::new(move || {
            let _ = new_state2.publish(f(result));
        }));
    }));
    new_state
}

impl<T, E, const S: bool> Future<T, E, true, S>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Runs `f` on the antecedent's value once it succeeds. A broken
    /// promise or task failure skips `f` and propagates unchanged.
    pub fn then<U, F>(self, f: F) -> Future<U, E, true, S>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        let state = self.into_state();
        let stop = if S { Some(StopSource::new()) } else { None };
        let new_state = chain(state, stop, move |result| result.map(f));
        Future::from_shared(new_state)
    }

    /// Runs `f` unconditionally, with the antecedent's full outcome,
    /// letting the continuation translate the error type.
    pub fn then_catching<U, EU, F>(self, f: F) -> Future<U, EU, true, S>
    where
        F: FnOnce(Result<T, Failure<E>>) -> Result<U, Failure<EU>> + Send + 'static,
        U: Send + 'static,
        EU: Send + 'static,
    {
        let state = self.into_state();
        let stop = if S { Some(StopSource::new()) } else { None };
        let new_state = chain(state, stop, f);
        Future::from_shared(new_state)
    }

    fn into_state(self) -> Arc<Shared<T, E>> {
        self.state_arc().expect("then called on an invalid future")
    }
}

impl<T, E, const S: bool> SharedFuture<T, E, true, S>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// See [`Future::then`]. Any number of clones may independently
    /// attach a continuation; each sees the same (cloned) value.
    pub fn then<U, F>(&self, f: F) -> Future<U, E, true, S>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        let state = self
            .state_arc()
            .expect("then called on an invalid shared future");
        let stop = if S { Some(StopSource::new()) } else { None };
        let new_state = chain_shared(state, stop, move |result| result.map(f));
        Future::from_shared(new_state)
    }

    /// See [`Future::then_catching`].
    pub fn then_catching<U, EU, F>(&self, f: F) -> Future<U, EU, true, S>
    where
        F: FnOnce(Result<T, Failure<E>>) -> Result<U, Failure<EU>> + Send + 'static,
        U: Send + 'static,
        EU: Send + 'static,
    {
        let state = self
            .state_arc()
            .expect("then_catching called on an invalid shared future");
        let stop = if S { Some(StopSource::new()) } else { None };
        let new_state = chain_shared(state, stop, f);
        Future::from_shared(new_state)
    }
}

/// `future >> f` is sugar for `future.then(f)`, mirroring the operator
/// the original contract uses to chain continuations.
impl<T, E, const S: bool, U, F> std::ops::Shr<F> for Future<T, E, true, S>
where
    T: Send + 'static,
    E: Send + 'static,
    U: Send + 'static,
    F: FnOnce(T) -> U + Send + 'static,
{
    type Output = Future<U, E, true, S>;

    fn shr(self, f: F) -> Self::Output {
        self.then(f)
    }
}
