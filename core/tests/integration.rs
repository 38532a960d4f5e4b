use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use corotasks_core::contract::violation_count;
use corotasks_core::{AsyncError, AsyncResult, CoroFuture, Task};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, PartialEq)]
struct Car {
    name: &'static str,
}

#[derive(Debug, PartialEq)]
struct Sale {
    price: u32,
    message: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("car sell error: {reason}")]
struct CarSellError {
    reason: String,
}

fn helper() -> Task<i32> {
    Task::new(async { Ok(123) })
}

fn is_ferrari(car: Arc<Car>) -> Task<bool> {
    Task::new(async move { Ok(car.name == "Ferrari") })
}

fn sell(car: Arc<Car>) -> Task<Sale> {
    Task::new(async move {
        if !is_ferrari(car.clone()).await? {
            return Err(AsyncError::other(CarSellError {
                reason: format!("{} is not for sale", car.name),
            }));
        }
        Ok(Sale {
            price: 250_000,
            message: "Wow!".to_string(),
        })
    })
}

fn run<R: Send + 'static>(mut task: Task<R>) -> Option<AsyncResult<R>> {
    task.launch();
    task.take_result()
}

// ---------------------------------------------------------------------------
// Value and error round trips
// ---------------------------------------------------------------------------

#[test]
fn helper_value_reaches_caller() {
    init_logging();
    let result = run(Task::new(async { helper().await }));
    assert_eq!(result.and_then(Result::ok), Some(123));
}

#[test]
fn unit_round_trip() {
    let result = run(Task::new(async {
        Task::new(async { Ok(()) }).await?;
        Ok(())
    }));
    assert!(matches!(result, Some(Ok(()))));
}

#[test]
fn shared_handle_round_trip() {
    let car = Arc::new(Car { name: "Ferrari" });
    let expected = car.clone();
    let result = run(Task::new(async move {
        let returned = Task::new(async move { Ok(car) }).await?;
        Ok(returned)
    }));
    let returned = result.and_then(Result::ok);
    assert!(returned.is_some_and(|car| Arc::ptr_eq(&car, &expected)));
}

#[test]
fn labeled_struct_round_trip() {
    let result = run(sell(Arc::new(Car { name: "Ferrari" })));
    assert_eq!(
        result.and_then(Result::ok),
        Some(Sale {
            price: 250_000,
            message: "Wow!".to_string()
        })
    );
}

#[test]
fn child_error_keeps_payload() {
    let result = run(Task::new(async {
        match sell(Arc::new(Car { name: "Lada" })).await {
            Ok(_) => Ok(None),
            Err(error) => Ok(error.downcast_ref::<CarSellError>().map(|e| e.reason.clone())),
        }
    }));
    assert_eq!(
        result.and_then(Result::ok).flatten().as_deref(),
        Some("Lada is not for sale")
    );
}

#[test]
fn question_mark_propagates_through_levels() {
    let result = run(Task::new(async {
        let sale = sell(Arc::new(Car { name: "Lada" })).await?;
        Ok(sale.price)
    }));
    let error = result.and_then(Result::err);
    assert!(error.is_some_and(|e| e.downcast_ref::<CarSellError>().is_some()));
}

// ---------------------------------------------------------------------------
// Launch and resolution contracts
// ---------------------------------------------------------------------------

#[test]
fn double_launch_reports_and_runs_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let mut task = Task::new(async move {
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    });

    let before = violation_count();
    assert!(task.launch());
    assert!(!task.launch());
    assert_eq!(violation_count(), before + 1);
    assert_eq!(runs.load(Ordering::Relaxed), 1);
}

#[test]
fn first_producer_wins_the_race() {
    let outcome = CoroFuture::<&'static str>::new();
    let consumer = outcome.clone();
    let resumes = Arc::new(AtomicUsize::new(0));
    let counter = resumes.clone();

    let mut task = Task::new(async move {
        let value = consumer.await?;
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    });
    task.launch();

    let on_blend_out = outcome.clone();
    let on_interrupted = outcome.clone();
    let on_cancelled = outcome.clone();
    let on_timeout = outcome.clone();

    assert!(on_blend_out.set_result("blend out"));
    assert!(!on_interrupted.set_result("interrupted"));
    assert!(!on_cancelled.set_result("cancelled"));
    assert!(!on_timeout.set_exception(AsyncError::new("timeout")));

    assert_eq!(resumes.load(Ordering::Relaxed), 1);
    assert_eq!(task.take_result().and_then(Result::ok), Some("blend out"));
}

#[test]
fn resolution_completes_before_producer_returns() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let gate = CoroFuture::<()>::new();
    let producer = gate.clone();

    let mut task = Task::new(async move {
        gate.await?;
        helper().await?;
        flag.store(true, Ordering::Relaxed);
        Ok(())
    });
    task.launch();

    producer.set_result(());
    assert!(finished.load(Ordering::Relaxed));
}

// ---------------------------------------------------------------------------
// Destruction and deep chains
// ---------------------------------------------------------------------------

#[test]
fn destroyed_while_suspended_never_resumes() {
    let resumed = Arc::new(AtomicBool::new(false));
    let flag = resumed.clone();
    let gate = CoroFuture::<()>::new();
    let producer = gate.clone();

    let mut outer = Task::new(async move {
        let inner = Task::new(async move { gate.await });
        inner.await?;
        flag.store(true, Ordering::Relaxed);
        Ok(())
    });
    outer.launch();
    drop(outer);

    assert!(producer.set_result(()));
    assert!(!resumed.load(Ordering::Relaxed));
}

#[test]
fn ten_thousand_deep_chain_completes() {
    init_logging();
    const DEPTH: u32 = 10_000;

    let gate = CoroFuture::<u32>::new();
    let producer = gate.clone();

    let mut task = Task::new(async move { gate.await });
    for _ in 0..DEPTH {
        let inner = task;
        task = Task::new(async move { inner.await.map(|v| v + 1) });
    }

    task.launch();
    assert!(!task.is_completed());

    producer.set_result(0);
    assert!(task.is_completed());
    assert_eq!(task.take_result().and_then(Result::ok), Some(DEPTH));
}

#[test]
fn detached_task_finishes_without_owner() {
    let done = Arc::new(AtomicBool::new(false));
    let flag = done.clone();
    let gate = CoroFuture::<u32>::new();
    let producer = gate.clone();

    Task::new(async move {
        let value = gate.await?;
        flag.store(value == 1, Ordering::Relaxed);
        Ok(())
    })
    .detach();

    producer.set_result(1);
    assert!(done.load(Ordering::Relaxed));
}
