//! Disjunctions: waiting for the first of several futures to become
//! ready, without discarding the rest.
//!
//! The combined future's value is a [`WhenAnyResult`] carrying the
//! winning input's position and every input future (ready or still
//! pending) so a caller can still wait on, or abandon, the others.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::future::Future;
use crate::promise::{Complete, Promise};

/// The outcome of a `when_any`/`when_any_vec` race: which input
/// completed first, and every input future.
#[derive(Debug)]
pub struct WhenAnyResult<Sequence> {
    /// Position, in call order, of the input that completed first.
    pub index: usize,
    /// Every input future, in original order. The one at `index` is
    /// ready; the others may or may not be.
    pub tasks: Sequence,
}

fn finish<Tuple>(
    index: usize,
    claimed: &Arc<AtomicUsize>,
    slot: &Arc<Mutex<Option<Tuple>>>,
    complete: &Arc<Mutex<Option<Complete<WhenAnyResult<Tuple>, Infallible>>>>,
) where
    Tuple: Send + 'static,
{
    if claimed
        .compare_exchange(usize::MAX, index, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        let tasks = slot.lock().take().expect("when_any slot drained twice");
        let complete = complete
            .lock()
            .take()
            .expect("when_any complete drained twice");
        let _ = complete.set_value(WhenAnyResult { index, tasks });
    }
}

macro_rules! when_any_arity {
    ($name:ident ; $( $i:literal : $T:ident, $E:ident, $C:ident, $S:ident, $f:ident ),+) => {
        /// See [`when_any!`].
        pub fn $name<$($T, $E, const $C: bool, const $S: bool),+>(
            $($f: Future<$T, $E, $C, $S>),+
        ) -> Future<WhenAnyResult<($(Future<$T, $E, $C, $S>,)+)>, Infallible, true, false>
        where
            $($T: Send + 'static, $E: Send + 'static,)+
        {
            let states = ($( $f.state.as_ref().expect("when_any given an invalid future").clone() ),+,);
            let slot: Arc<Mutex<Option<($(Future<$T, $E, $C, $S>,)+)>>> =
                Arc::new(Mutex::new(Some(($($f,)+))));
            let (promise, complete) =
                Promise::<WhenAnyResult<($(Future<$T, $E, $C, $S>,)+)>, Infallible, true, false>::new();
            let out = promise.get_future().expect("fresh promise");
            let complete = Arc::new(Mutex::new(Some(complete)));
            let claimed = Arc::new(AtomicUsize::new(usize::MAX));
            let ( $($f,)+ ) = states;
            $(
                {
                    let claimed = claimed.clone();
                    let slot = slot.clone();
                    let complete = complete.clone();
                    $f.append_continuation(Box::new(move || finish($i, &claimed, &slot, &complete)));
                }
            )+
            out
        }
    };
}

when_any_arity!(when_any2; 0: T1, E1, C1, S1, f1, 1: T2, E2, C2, S2, f2);
when_any_arity!(when_any3; 0: T1, E1, C1, S1, f1, 1: T2, E2, C2, S2, f2, 2: T3, E3, C3, S3, f3);
when_any_arity!(when_any4; 0: T1, E1, C1, S1, f1, 1: T2, E2, C2, S2, f2, 2: T3, E3, C3, S3, f3, 3: T4, E4, C4, S4, f4);
when_any_arity!(when_any5; 0: T1, E1, C1, S1, f1, 1: T2, E2, C2, S2, f2, 2: T3, E3, C3, S3, f3, 3: T4, E4, C4, S4, f4, 4: T5, E5, C5, S5, f5);
when_any_arity!(when_any6; 0: T1, E1, C1, S1, f1, 1: T2, E2, C2, S2, f2, 2: T3, E3, C3, S3, f3, 3: T4, E4, C4, S4, f4, 4: T5, E5, C5, S5, f5, 5: T6, E6, C6, S6, f6);
when_any_arity!(when_any7; 0: T1, E1, C1, S1, f1, 1: T2, E2, C2, S2, f2, 2: T3, E3, C3, S3, f3, 3: T4, E4, C4, S4, f4, 4: T5, E5, C5, S5, f5, 5: T6, E6, C6, S6, f6, 6: T7, E7, C7, S7, f7);
when_any_arity!(when_any8; 0: T1, E1, C1, S1, f1, 1: T2, E2, C2, S2, f2, 2: T3, E3, C3, S3, f3, 3: T4, E4, C4, S4, f4, 4: T5, E5, C5, S5, f5, 5: T6, E6, C6, S6, f6, 6: T7, E7, C7, S7, f7, 7: T8, E8, C8, S8, f8);

/// Waits for the first of 2 to 8 heterogeneous futures to become ready.
#[macro_export]
macro_rules! when_any {
    ($f1:expr, $f2:expr $(,)?) => { $crate::when_any::when_any2($f1, $f2) };
    ($f1:expr, $f2:expr, $f3:expr $(,)?) => { $crate::when_any::when_any3($f1, $f2, $f3) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr $(,)?) => { $crate::when_any::when_any4($f1, $f2, $f3, $f4) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr, $f5:expr $(,)?) => { $crate::when_any::when_any5($f1, $f2, $f3, $f4, $f5) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr, $f5:expr, $f6:expr $(,)?) => { $crate::when_any::when_any6($f1, $f2, $f3, $f4, $f5, $f6) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr, $f5:expr, $f6:expr, $f7:expr $(,)?) => { $crate::when_any::when_any7($f1, $f2, $f3, $f4, $f5, $f6, $f7) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr, $f5:expr, $f6:expr, $f7:expr, $f8:expr $(,)?) => { $crate::when_any::when_any8($f1, $f2, $f3, $f4, $f5, $f6, $f7, $f8) };
}

/// Waits for the first future in a homogeneous sequence to become
/// ready. Panics if `futures` is empty: there is no "first" of none.
pub fn when_any_vec<T, E, const C: bool, const S: bool>(
    futures: Vec<Future<T, E, C, S>>,
) -> Future<WhenAnyResult<Vec<Future<T, E, C, S>>>, Infallible, true, false>
where
    T: Send + 'static,
    E: Send + 'static,
{
    assert!(!futures.is_empty(), "when_any_vec requires at least one future");
    let states: Vec<_> = futures
        .iter()
        .map(|f| {
            f.state
                .as_ref()
                .expect("when_any_vec given an invalid future")
                .clone()
        })
        .collect();
    let slot = Arc::new(Mutex::new(Some(futures)));
    let (promise, complete) =
        Promise::<WhenAnyResult<Vec<Future<T, E, C, S>>>, Infallible, true, false>::new();
    let out = promise.get_future().expect("fresh promise");
    let complete = Arc::new(Mutex::new(Some(complete)));
    let claimed = Arc::new(AtomicUsize::new(usize::MAX));
    for (index, state) in states.into_iter().enumerate() {
        let claimed = claimed.clone();
        let slot = slot.clone();
        let complete = complete.clone();
        state.append_continuation(Box::new(move || finish(index, &claimed, &slot, &complete)));
    }
    out
}
