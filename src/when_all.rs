//! Conjunctions: waiting for every one of several futures to become
//! ready, unwrapping each one's value.
//!
//! The combined future's value is the tuple (or, for [`when_all_vec`],
//! the `Vec`) of unwrapped input values, in order. If any input holds
//! an error, the combined future carries that error instead and the
//! other inputs' values are discarded; when several inputs fail, the
//! leftmost (lowest-indexed) error is the one that propagates. Raw
//! access to the individual input futures, for callers who want to
//! inspect each one themselves, is available via [`IntoFutures`] after
//! the conjunction resolves successfully.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Failure;
use crate::future::Future;
use crate::promise::{make_ready_future, Promise};

/// Implements one arity of `when_all` by hand; see [`when_all!`] for the
/// public macro entry point.
macro_rules! when_all_arity {
    ($name:ident, $count:literal ; $( $T:ident, $C:ident, $S:ident, $f:ident ),+) => {
        /// See [`when_all!`].
        pub fn $name<$($T,)+ E, $(const $C: bool, const $S: bool),+>(
            $($f: Future<$T, E, $C, $S>),+
        ) -> Future<($($T,)+), E, true, false>
        where
            $($T: Send + 'static,)+
            E: Send + 'static,
        {
            $(
                let $f = $f
                    .state
                    .as_ref()
                    .expect("when_all given an invalid future")
                    .clone();
            )+
            let (promise, complete) = Promise::<($($T,)+), E, true, false>::new();
            let out = promise.get_future().expect("fresh promise");
            let remaining = Arc::new(AtomicUsize::new($count));

            let finish: Box<dyn FnOnce() + Send> = {
                $( let $f = $f.clone(); )+
                Box::new(move || {
                    let unwrap = || -> Result<($($T,)+), Failure<E>> {
                        Ok(($( $f.take_result()?, )+))
                    };
                    let _ = complete.publish_result(unwrap());
                })
            };
            let finish = Arc::new(Mutex::new(Some(finish)));

            $(
                {
                    let remaining = remaining.clone();
                    let finish = finish.clone();
                    $f.append_continuation(Box::new(move || {
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            if let Some(f) = finish.lock().take() {
                                f();
                            }
                        }
                    }));
                }
            )+
            out
        }
    };
}

when_all_arity!(when_all2, 2; T1, C1, S1, f1, T2, C2, S2, f2);
when_all_arity!(when_all3, 3; T1, C1, S1, f1, T2, C2, S2, f2, T3, C3, S3, f3);
when_all_arity!(when_all4, 4; T1, C1, S1, f1, T2, C2, S2, f2, T3, C3, S3, f3, T4, C4, S4, f4);
when_all_arity!(when_all5, 5; T1, C1, S1, f1, T2, C2, S2, f2, T3, C3, S3, f3, T4, C4, S4, f4, T5, C5, S5, f5);
when_all_arity!(when_all6, 6; T1, C1, S1, f1, T2, C2, S2, f2, T3, C3, S3, f3, T4, C4, S4, f4, T5, C5, S5, f5, T6, C6, S6, f6);
when_all_arity!(when_all7, 7; T1, C1, S1, f1, T2, C2, S2, f2, T3, C3, S3, f3, T4, C4, S4, f4, T5, C5, S5, f5, T6, C6, S6, f6, T7, C7, S7, f7);
when_all_arity!(when_all8, 8; T1, C1, S1, f1, T2, C2, S2, f2, T3, C3, S3, f3, T4, C4, S4, f4, T5, C5, S5, f5, T6, C6, S6, f6, T7, C7, S7, f7, T8, C8, S8, f8);

/// Waits for 2 to 8 heterogeneous futures sharing one error type `E`,
/// returning a future of the tuple of unwrapped values. See the module
/// documentation for the error-propagation rule.
#[macro_export]
macro_rules! when_all {
    ($f1:expr, $f2:expr $(,)?) => { $crate::when_all::when_all2($f1, $f2) };
    ($f1:expr, $f2:expr, $f3:expr $(,)?) => { $crate::when_all::when_all3($f1, $f2, $f3) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr $(,)?) => { $crate::when_all::when_all4($f1, $f2, $f3, $f4) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr, $f5:expr $(,)?) => { $crate::when_all::when_all5($f1, $f2, $f3, $f4, $f5) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr, $f5:expr, $f6:expr $(,)?) => { $crate::when_all::when_all6($f1, $f2, $f3, $f4, $f5, $f6) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr, $f5:expr, $f6:expr, $f7:expr $(,)?) => { $crate::when_all::when_all7($f1, $f2, $f3, $f4, $f5, $f6, $f7) };
    ($f1:expr, $f2:expr, $f3:expr, $f4:expr, $f5:expr, $f6:expr, $f7:expr, $f8:expr $(,)?) => { $crate::when_all::when_all8($f1, $f2, $f3, $f4, $f5, $f6, $f7, $f8) };
}

/// Waits for every future in a homogeneous sequence, returning a future
/// of the `Vec` of unwrapped values in their original order. The
/// leftmost (lowest-indexed) error propagates if more than one input
/// fails.
pub fn when_all_vec<T, E, const C: bool, const S: bool>(
    futures: Vec<Future<T, E, C, S>>,
) -> Future<Vec<T>, E, true, false>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let states: Vec<_> = futures
        .iter()
        .map(|f| {
            f.state
                .as_ref()
                .expect("when_all_vec given an invalid future")
                .clone()
        })
        .collect();
    let count = states.len();
    let (promise, complete) = Promise::<Vec<T>, E, true, false>::new();
    let out = promise.get_future().expect("fresh promise");
    if count == 0 {
        complete
            .set_value(Vec::new())
            .expect("fresh state cannot already be satisfied");
        return out;
    }
    let remaining = Arc::new(AtomicUsize::new(count));
    let finish_states = states.clone();
    let finish: Box<dyn FnOnce() + Send> = Box::new(move || {
        let mut values = Vec::with_capacity(finish_states.len());
        let mut first_err = None;
        for state in &finish_states {
            match state.take_result() {
                Ok(v) => values.push(v),
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        let result = match first_err {
            Some(e) => Err(e),
            None => Ok(values),
        };
        let _ = complete.publish_result(result);
    });
    let finish = Arc::new(Mutex::new(Some(finish)));
    for state in states {
        let remaining = remaining.clone();
        let finish = finish.clone();
        state.append_continuation(Box::new(move || {
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                if let Some(f) = finish.lock().take() {
                    f();
                }
            }
        }));
    }
    out
}

/// Converts an already-unwrapped conjunction value back into individual
/// ready futures.
///
/// `when_all(a, b).get()?` already hands back `(A, B)`; a caller who
/// wants the per-input futures themselves (say, to inspect them with
/// shape B rather than shape C, per the continuation-unwrapping rules)
/// gets them back here, each wrapped ready via [`make_ready_future`].
pub trait IntoFutures<Err, const CONTINUABLE: bool = false, const STOPPABLE: bool = false> {
    /// The tuple or `Vec` of individual future handles.
    type Output;
    /// Rewraps each unwrapped value as an already-ready future.
    fn into_futures(self) -> Self::Output;
}

macro_rules! into_futures_tuple {
    ($($t:ident),+) => {
        impl<$($t,)+ Err, const C: bool, const S: bool> IntoFutures<Err, C, S> for ($($t,)+)
        where
            $($t: Send + 'static,)+
            Err: Send + 'static,
        {
            type Output = ($(Future<$t, Err, C, S>,)+);
            fn into_futures(self) -> Self::Output {
                #[allow(non_snake_case)]
                let ($($t,)+) = self;
                ($( make_ready_future::<$t, Err, C, S>($t), )+)
            }
        }
    };
}

into_futures_tuple!(A, B);
into_futures_tuple!(A, B, C);
into_futures_tuple!(A, B, C, D);
into_futures_tuple!(A, B, C, D, E);
into_futures_tuple!(A, B, C, D, E, F);
into_futures_tuple!(A, B, C, D, E, F, G);
into_futures_tuple!(A, B, C, D, E, F, G, H);

impl<T, Err, const C: bool, const S: bool> IntoFutures<Err, C, S> for Vec<T>
where
    T: Send + 'static,
    Err: Send + 'static,
{
    type Output = Vec<Future<T, Err, C, S>>;
    fn into_futures(self) -> Self::Output {
        self.into_iter()
            .map(make_ready_future::<T, Err, C, S>)
            .collect()
    }
}
