//! Error types for operation-state lifecycle misuse and terminal task
//! failures.
//!
//! Two enums cover the single error-code surface described by the
//! library's contract: [`FutureError`] for synchronous API misuse
//! (returned directly at the call site), and [`Failure`] for whatever
//! ends up stored in a terminal operation state (broken promise, a
//! task-returned error, or a caught task panic).

use std::fmt;

/// Synchronous misuse and lifecycle errors.
///
/// These are returned directly by the call that detected them, never
/// stored inside an operation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FutureError {
    /// `set_value`/`set_error` was called on an operation state that was
    /// already terminal.
    #[error("promise already satisfied")]
    PromiseAlreadySatisfied,
    /// `get_future` was called more than once on the same promise.
    #[error("future already retrieved")]
    FutureAlreadyRetrieved,
    /// The handle has no shared operation state to operate on.
    #[error("no shared state")]
    NoState,
    /// The promise was used after being moved from.
    #[error("promise is uninitialized")]
    PromiseUninitialized,
    /// The packaged task was used after being moved from.
    #[error("packaged task is uninitialized")]
    PackagedTaskUninitialized,
    /// The future was used after being moved from.
    #[error("future is uninitialized")]
    FutureUninitialized,
}

/// The terminal error channel of an operation state, generic over the
/// task's own error type `E`.
///
/// `get()` on any future returns `Result<T, Failure<E>>`: success is a
/// plain value, failure is one of these three causes.
#[derive(Debug, Clone)]
pub enum Failure<E> {
    /// The producer (promise/packaged task) was dropped before publishing
    /// a result.
    BrokenPromise,
    /// The task body ran and returned an error.
    Failed(E),
    /// The task body panicked; the panic payload has been downcast to a
    /// string where possible.
    Panicked(String),
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::BrokenPromise => write!(f, "broken promise"),
            Failure::Failed(e) => write!(f, "task failed: {e}"),
            Failure::Panicked(msg) => write!(f, "task panicked: {msg}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Failure<E> {}

impl<E> Failure<E> {
    /// Maps the task-error variant, leaving `BrokenPromise`/`Panicked`
    /// untouched.
    pub fn map_failed<F>(self, f: impl FnOnce(E) -> F) -> Failure<F> {
        match self {
            Failure::BrokenPromise => Failure::BrokenPromise,
            Failure::Failed(e) => Failure::Failed(f(e)),
            Failure::Panicked(msg) => Failure::Panicked(msg),
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_owned()
    }
}
