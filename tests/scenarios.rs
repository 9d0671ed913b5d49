use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use threadfutures::{
    deferred, make_exceptional_future, make_ready_future, when_all, when_any, Failure,
    FutureError, InlineExecutor, PackagedTask, Promise, WaitStatus, Waitable,
};

fn spawn_task<T, E, const C: bool>(
    task: PackagedTask<impl FnOnce() -> Result<T, E> + Send + 'static, T, E, C, false>,
) where
    T: Send + 'static,
    E: Send + 'static,
{
    std::thread::spawn(move || task.run());
}

#[test]
fn scenario_1_basic_value() {
    let task: PackagedTask<_, i32, String, true, false> = PackagedTask::new(|| Ok(42));
    let future = task.get_future().unwrap();
    spawn_task(task);
    assert_eq!(future.get().unwrap(), 42);
}

#[test]
fn scenario_2_error_propagation_skips_continuation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();
    let task: PackagedTask<_, i32, String, true, false> =
        PackagedTask::new(|| Err("error".to_owned()));
    let future = task.get_future().unwrap();
    spawn_task(task);
    let chained = future.then(move |v| {
        calls2.fetch_add(1, Ordering::SeqCst);
        v * 2
    });
    match chained.get() {
        Err(Failure::Failed(msg)) => assert_eq!(msg, "error"),
        other => panic!("expected Failed(\"error\"), got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn scenario_3_conjunction() {
    let t1: PackagedTask<_, i32, String, true, false> = PackagedTask::new(|| Ok(6));
    let t2: PackagedTask<_, i32, String, true, false> = PackagedTask::new(|| Ok(7));
    let t3: PackagedTask<_, i32, String, true, false> = PackagedTask::new(|| Ok(8));
    let f1 = t1.get_future().unwrap();
    let f2 = t2.get_future().unwrap();
    let f3 = t3.get_future().unwrap();
    spawn_task(t1);
    spawn_task(t2);
    spawn_task(t3);

    let combined = when_all!(f1, f2, f3);
    let chained = combined.then(|(a, b, c)| a * b * c);
    assert_eq!(chained.get().unwrap(), 336);
}

#[test]
fn scenario_4_disjunction() {
    let t1: PackagedTask<_, i32, String, true, false> = PackagedTask::new(|| {
        std::thread::sleep(Duration::from_millis(5));
        Ok(10)
    });
    let t2: PackagedTask<_, i32, String, true, false> = PackagedTask::new(|| Ok(11));
    let f1 = t1.get_future().unwrap();
    let f2 = t2.get_future().unwrap();
    spawn_task(t1);
    spawn_task(t2);

    let combined = when_any!(f1, f2);
    let result = combined.get().unwrap();
    // Tuple elements can't be indexed by a runtime value, unlike the
    // `Vec` form `when_any_vec` produces (see the test below); match on
    // `index` instead to reach the winning task.
    let value = match result.index {
        0 => result.tasks.0.get().unwrap(),
        1 => result.tasks.1.get().unwrap(),
        other => panic!("unexpected index {other}"),
    };
    assert!(value == 10 || value == 11);
}

// A homogeneous variant of scenario 4, exercising `when_any_vec` and its
// `WhenAnyResult::tasks` indexing over a `Vec` instead of a tuple.
#[test]
fn scenario_4_disjunction_vec_form() {
    let t1: PackagedTask<_, i32, String, true, false> = PackagedTask::new(|| {
        std::thread::sleep(Duration::from_millis(5));
        Ok(10)
    });
    let t2: PackagedTask<_, i32, String, true, false> = PackagedTask::new(|| Ok(11));
    let futures = vec![t1.get_future().unwrap(), t2.get_future().unwrap()];
    spawn_task(t1);
    spawn_task(t2);

    let combined = threadfutures::when_any::when_any_vec(futures);
    let result = combined.get().unwrap();
    assert_eq!(result.index, 1);
    assert_eq!(result.tasks[result.index].get().unwrap(), 11);
}

#[test]
fn scenario_5_stop_token() {
    let iterations = Arc::new(AtomicUsize::new(0));
    let iterations2 = iterations.clone();
    let task: PackagedTask<_, (), String, false, true> = PackagedTask::new_stoppable(move |token| {
        while !token.stop_requested() {
            iterations2.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    });
    let future = task.get_future().unwrap();
    let token = future.stop_token().unwrap();
    std::thread::spawn(move || task.run());

    std::thread::sleep(Duration::from_millis(5));
    assert!(future.request_stop());
    assert!(token.stop_requested());
    future.wait().unwrap();
    assert!(iterations.load(Ordering::SeqCst) >= 1);
}

#[test]
fn scenario_6_deferred() {
    let runs = Arc::new(AtomicUsize::new(0));
    let runs2 = runs.clone();
    let future = deferred::<i32, String, _>(move || {
        runs2.fetch_add(1, Ordering::SeqCst);
        Ok(2 + 3)
    });
    assert_eq!(
        future.wait_for(Duration::from_secs(0)).unwrap(),
        WaitStatus::Deferred
    );
    assert_eq!(future.get().unwrap(), 5);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn law_make_ready_future_roundtrips() {
    let future = make_ready_future::<i32, String, false, false>(9);
    assert_eq!(future.get().unwrap(), 9);
}

#[test]
fn law_then_on_ready_future() {
    let future = make_ready_future::<i32, String, true, false>(4);
    let chained = future.then(|v| v + 1);
    assert_eq!(chained.get().unwrap(), 5);
}

#[test]
fn law_then_on_exceptional_future_skips_fn() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();
    let future = make_exceptional_future::<i32, String, true, false>("boom".to_owned());
    let chained = future.then(move |v| {
        calls2.fetch_add(1, Ordering::SeqCst);
        v
    });
    assert!(matches!(chained.get(), Err(Failure::Failed(msg)) if msg == "boom"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn invariant_second_publish_is_rejected() {
    let (promise, complete) = Promise::<i32, String>::new();
    let _future = promise.get_future().unwrap();
    complete.set_value(1).unwrap();
    assert!(matches!(
        complete.set_value(2),
        Err(FutureError::PromiseAlreadySatisfied)
    ));
}

#[test]
fn boundary_wait_for_zero_on_pending_is_timeout() {
    let (promise, _complete) = Promise::<i32, String>::new();
    let future = promise.get_future().unwrap();
    assert_eq!(
        future.wait_for(Duration::from_secs(0)).unwrap(),
        WaitStatus::Timeout
    );
}

#[test]
fn boundary_dropped_future_lets_producer_still_publish() {
    let (promise, complete) = Promise::<i32, String>::new();
    drop(promise.get_future().unwrap());
    assert!(complete.set_value(1).is_ok());
}

#[test]
fn boundary_broken_promise_on_early_drop() {
    let (promise, complete) = Promise::<i32, String>::new();
    let future = promise.get_future().unwrap();
    drop(complete);
    assert!(matches!(future.get(), Err(Failure::BrokenPromise)));
}

#[test]
fn inline_executor_runs_continuations_synchronously() {
    let (promise, complete) = Promise::<i32, String, true, false>::new();
    let future = promise.get_future().unwrap();
    complete.set_value(3).unwrap();
    // Readiness is already published before `then` is even called here,
    // so the continuation runs inline regardless of which executor gets
    // picked; this exercises that `InlineExecutor` is at least usable as
    // a plain `Executor` impl.
    InlineExecutor.schedule(Box::new(|| {}));
    let chained = future.then(|v| v + 1);
    assert_eq!(chained.get().unwrap(), 4);
}
