//! Cooperative cancellation: a one-shot "stop requested" bit plus an
//! ordered list of callbacks, shared between one [`StopSource`] and any
//! number of cheap [`StopToken`] observers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

type Callback = Box<dyn FnOnce() + Send>;

struct Inner {
    requested: AtomicBool,
    callbacks: Mutex<Vec<Callback>>,
}

/// The producer-side handle of a stop channel.
///
/// Owned by whichever future/task created it; consumers only ever see a
/// [`StopToken`] cloned from it.
#[derive(Clone)]
pub struct StopSource {
    inner: Arc<Inner>,
}

/// A cheap, cloneable observer of a [`StopSource`].
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<Inner>,
}

impl StopSource {
    /// Creates a new, unrequested stop channel.
    pub fn new() -> Self {
        StopSource {
            inner: Arc::new(Inner {
                requested: AtomicBool::new(false),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns a cheap observer handle bound to this source.
    pub fn token(&self) -> StopToken {
        StopToken {
            inner: self.inner.clone(),
        }
    }

    /// Idempotently requests a stop.
    ///
    /// The first call flips the bit and runs every registered callback,
    /// in registration order, on the calling thread; it returns `true`.
    /// Subsequent calls are no-ops and return `false`. Calling this after
    /// the associated task/future has already completed is itself a
    /// no-op in the sense that nothing downstream observes it: the stop
    /// channel has no notion of task status at all.
    pub fn request_stop(&self) -> bool {
        // Swap out the callback list under the lock first so that a
        // callback registered concurrently either lands in this drained
        // list (and runs below) or observes `requested == true` already
        // and runs inline in `register_callback`, never both, never
        // neither.
        let callbacks = {
            let mut guard = self.inner.callbacks.lock();
            if self.inner.requested.swap(true, Ordering::SeqCst) {
                return false;
            }
            std::mem::take(&mut *guard)
        };
        for cb in callbacks {
            cb();
        }
        tracing::trace!("stop requested");
        true
    }

    /// True iff a stop has been requested on this channel.
    pub fn stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }
}

impl Default for StopSource {
    fn default() -> Self {
        StopSource::new()
    }
}

impl StopToken {
    /// True iff a stop has been requested on the source this token was
    /// cloned from.
    pub fn stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// True iff the source backing this token could still request a
    /// stop. This crate keeps the source alive for as long as any token
    /// exists (both hold the same `Arc`), so this is always `true`; the
    /// method exists for parity with the spec's `stop_possible` contract.
    pub fn stop_possible(&self) -> bool {
        true
    }

    /// Registers `callback` to run exactly once: immediately, on this
    /// thread, if a stop has already been requested, or later, on the
    /// requesting thread, the moment one is.
    pub fn register_callback(&self, callback: impl FnOnce() + Send + 'static) {
        let mut guard = self.inner.callbacks.lock();
        if self.inner.requested.load(Ordering::SeqCst) {
            drop(guard);
            callback();
        } else {
            guard.push(Box::new(callback));
        }
    }
}
