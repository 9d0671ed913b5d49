//! Future handles: the consumer side of an operation state.
//!
//! Two handle types share one [`Shared`] state: [`Future`] is move-only
//! and its `get` consumes `self`, so retrieving a value twice is a
//! compile error rather than the runtime error the same misuse would be
//! in a reference-counted handle; [`SharedFuture`] is cloneable and its
//! `get` borrows, requiring `T: Clone, E: Clone` to hand back repeated
//! copies of the terminal result.
//!
//! `CONTINUABLE`/`STOPPABLE` are compile-time capability flags. They
//! gate which methods are even visible on a given handle instantiation,
//! standing in for what the original contract expresses as a set of
//! future option tags.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Failure, FutureError};
use crate::state::{Shared, WaitStatus};
use crate::stop::StopToken;

/// Shared wait/poll surface common to [`Future`] and [`SharedFuture`].
pub trait Waitable {
    /// False for a default-constructed handle with no backing state.
    fn valid(&self) -> bool;
    /// Blocks until the operation state is terminal.
    fn wait(&self) -> Result<(), FutureError>;
    /// Blocks until terminal or `timeout` elapses, whichever is first.
    fn wait_for(&self, timeout: Duration) -> Result<WaitStatus, FutureError>;
    /// Non-blocking readiness check.
    fn poll_ready(&self) -> Result<bool, FutureError>;
}

/// Free-function form of [`Waitable::poll_ready`], for call sites that
/// read better as `is_ready(&fut)` than `fut.poll_ready()`.
///
/// Returns `false`, rather than erroring, for an invalid handle.
pub fn is_ready<W: Waitable>(w: &W) -> bool {
    w.poll_ready().unwrap_or(false)
}

/// A unique, move-only future.
///
/// `CONTINUABLE` enables [`Future::then`]; `STOPPABLE` enables
/// [`Future::stop_token`] and [`Future::request_stop`].
pub struct Future<T, E, const CONTINUABLE: bool = false, const STOPPABLE: bool = false> {
    pub(crate) state: Option<Arc<Shared<T, E>>>,
}

impl<T, E, const C: bool, const S: bool> Default for Future<T, E, C, S> {
    /// An invalid handle with no backing state, analogous to a
    /// default-constructed `std::future`.
    fn default() -> Self {
        Future { state: None }
    }
}

impl<T, E, const C: bool, const S: bool> Future<T, E, C, S> {
    pub(crate) fn from_shared(state: Arc<Shared<T, E>>) -> Self {
        Future { state: Some(state) }
    }

    /// Blocks until terminal, then consumes the handle and returns the
    /// result.
    pub fn get(mut self) -> Result<T, Failure<E>> {
        let state = self
            .state
            .take()
            .unwrap_or_else(|| panic!("get called on an invalid future"));
        state.wait();
        state.take_result()
    }

    /// Converts this unique handle into a cloneable [`SharedFuture`].
    ///
    /// Consumes `self`; the value stays reachable only through
    /// `SharedFuture` clones from here on.
    pub fn share(mut self) -> SharedFuture<T, E, C, S>
    where
        T: Clone,
        E: Clone,
    {
        SharedFuture {
            state: self.state.take(),
        }
    }
}

impl<T, E, const C: bool, const S: bool> Waitable for Future<T, E, C, S> {
    fn valid(&self) -> bool {
        self.state.is_some()
    }

    fn wait(&self) -> Result<(), FutureError> {
        let state = self.state.as_ref().ok_or(FutureError::FutureUninitialized)?;
        state.wait();
        Ok(())
    }

    fn wait_for(&self, timeout: Duration) -> Result<WaitStatus, FutureError> {
        let state = self.state.as_ref().ok_or(FutureError::FutureUninitialized)?;
        Ok(state.wait_for(timeout))
    }

    fn poll_ready(&self) -> Result<bool, FutureError> {
        let state = self.state.as_ref().ok_or(FutureError::FutureUninitialized)?;
        Ok(state.is_ready())
    }
}

impl<T, E, const S: bool> Future<T, E, true, S> {
    pub(crate) fn state_arc(&self) -> Result<Arc<Shared<T, E>>, FutureError> {
        self.state.clone().ok_or(FutureError::FutureUninitialized)
    }
}

impl<T, E, const C: bool> Future<T, E, C, true> {
    /// Returns a token observing this future's stop source, if the
    /// state carries one (it always does for a `STOPPABLE` handle
    /// produced by this crate's constructors).
    pub fn stop_token(&self) -> Option<StopToken> {
        self.state.as_ref().and_then(|s| s.stop_source()).map(|s| s.token())
    }

    /// Requests cancellation of the task backing this future. Returns
    /// `false` if there is no state, or a stop had already been
    /// requested.
    pub fn request_stop(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.stop_source())
            .map(|s| s.request_stop())
            .unwrap_or(false)
    }
}

/// A cloneable future. Every clone observes the same operation state;
/// `get` clones the terminal result out rather than consuming it.
pub struct SharedFuture<T, E, const CONTINUABLE: bool = false, const STOPPABLE: bool = false> {
    pub(crate) state: Option<Arc<Shared<T, E>>>,
}

impl<T, E, const C: bool, const S: bool> Clone for SharedFuture<T, E, C, S> {
    fn clone(&self) -> Self {
        SharedFuture {
            state: self.state.clone(),
        }
    }
}

impl<T, E, const C: bool, const S: bool> Default for SharedFuture<T, E, C, S> {
    fn default() -> Self {
        SharedFuture { state: None }
    }
}

impl<T, E, const C: bool, const S: bool> SharedFuture<T, E, C, S> {
    pub(crate) fn from_shared(state: Arc<Shared<T, E>>) -> Self {
        SharedFuture { state: Some(state) }
    }

    /// Blocks until terminal, then clones the result out. Any number of
    /// clones of this handle (including this one again) may call `get`.
    pub fn get(&self) -> Result<T, Failure<E>>
    where
        T: Clone,
        E: Clone,
    {
        let state = self
            .state
            .as_ref()
            .unwrap_or_else(|| panic!("get called on an invalid future"));
        state.wait();
        state.peek_result()
    }
}

impl<T, E, const C: bool, const S: bool> Waitable for SharedFuture<T, E, C, S> {
    fn valid(&self) -> bool {
        self.state.is_some()
    }

    fn wait(&self) -> Result<(), FutureError> {
        let state = self.state.as_ref().ok_or(FutureError::FutureUninitialized)?;
        state.wait();
        Ok(())
    }

    fn wait_for(&self, timeout: Duration) -> Result<WaitStatus, FutureError> {
        let state = self.state.as_ref().ok_or(FutureError::FutureUninitialized)?;
        Ok(state.wait_for(timeout))
    }

    fn poll_ready(&self) -> Result<bool, FutureError> {
        let state = self.state.as_ref().ok_or(FutureError::FutureUninitialized)?;
        Ok(state.is_ready())
    }
}

impl<T, E, const S: bool> SharedFuture<T, E, true, S> {
    pub(crate) fn state_arc(&self) -> Result<Arc<Shared<T, E>>, FutureError> {
        self.state.clone().ok_or(FutureError::FutureUninitialized)
    }
}

impl<T, E, const C: bool> SharedFuture<T, E, C, true> {
    /// See [`Future::stop_token`].
    pub fn stop_token(&self) -> Option<StopToken> {
        self.state.as_ref().and_then(|s| s.stop_source()).map(|s| s.token())
    }

    /// See [`Future::request_stop`].
    pub fn request_stop(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.stop_source())
            .map(|s| s.request_stop())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::Promise;

    #[test]
    fn default_future_is_invalid() {
        let fut: Future<i32, String> = Future::default();
        assert!(!fut.valid());
        assert!(!is_ready(&fut));
    }

    #[test]
    fn get_consumes_and_returns_value() {
        let (promise, complete) = Promise::<i32, String>::new();
        complete.set_value(9).unwrap();
        let fut = promise.get_future().unwrap();
        assert_eq!(fut.get().unwrap(), 9);
    }

    #[test]
    fn shared_future_get_is_repeatable() {
        let (promise, complete) = Promise::<i32, String>::new();
        complete.set_value(3).unwrap();
        let fut = promise.get_future().unwrap().share();
        assert_eq!(fut.get().unwrap(), 3);
        assert_eq!(fut.clone().get().unwrap(), 3);
    }
}
