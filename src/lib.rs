//! A thread-based future/promise library.
//!
//! Every future here is backed by a mutex-and-condvar-guarded operation
//! state rather than by `std::future::Future`'s poll protocol: `get`
//! blocks the calling thread until a value or error is published, there
//! is no executor driving a poll loop, and continuations are dispatched
//! to an [`Executor`] the moment their antecedent becomes ready.
//!
//! ```
//! use threadfutures::{Promise, Waitable};
//!
//! let (promise, complete) = Promise::<i32, String>::new();
//! let future = promise.get_future().unwrap();
//! complete.set_value(7).unwrap();
//! assert_eq!(future.get().unwrap(), 7);
//! ```
//!
//! Continuations chain with [`Future::then`] (or the `>>` operator),
//! conjunctions with [`when_all!`], and disjunctions with [`when_any!`]:
//!
//! ```
//! use threadfutures::{when_all, Promise};
//!
//! let (p1, c1) = Promise::<i32, String>::new();
//! let (p2, c2) = Promise::<i32, String>::new();
//! let combined = when_all!(p1.get_future().unwrap(), p2.get_future().unwrap());
//! c1.set_value(1).unwrap();
//! c2.set_value(2).unwrap();
//! let (a, b) = combined.get().unwrap();
//! assert_eq!(a + b, 3);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod executor;
mod future;
mod promise;
mod state;
mod stop;
mod then;
pub mod when_all;
pub mod when_any;

pub use error::{Failure, FutureError};
pub use executor::{default_executor, Executor, InlineExecutor, ThreadPoolExecutor};
pub use future::{is_ready, Future, SharedFuture, Waitable};
pub use promise::{
    deferred, make_exceptional_future, make_ready_future, Complete, PackagedTask, Promise,
};
pub use state::WaitStatus;
pub use stop::{StopSource, StopToken};
pub use when_all::IntoFutures;
pub use when_any::WhenAnyResult;
