use criterion::{Criterion, black_box, criterion_group, criterion_main};

use corotasks_core::{CoroFuture, Task};

// ---------------------------------------------------------------------------
// Task launch and completion
// ---------------------------------------------------------------------------

fn bench_launch_ready_task(c: &mut Criterion) {
    c.bench_function("launch_ready_task", |b| {
        b.iter(|| {
            let mut task = Task::new(async { Ok(black_box(123)) });
            task.launch();
            black_box(task.take_result())
        });
    });
}

fn bench_await_child_task(c: &mut Criterion) {
    c.bench_function("await_child_task", |b| {
        b.iter(|| {
            let mut task = Task::new(async {
                let child = Task::new(async { Ok(black_box(7)) });
                child.await
            });
            task.launch();
            black_box(task.take_result())
        });
    });
}

fn bench_await_chain_100(c: &mut Criterion) {
    c.bench_function("await_chain_100", |b| {
        b.iter(|| {
            let gate = CoroFuture::<u32>::new();
            let producer = gate.clone();
            let mut task = Task::new(async move { gate.await });
            for _ in 0..100 {
                let inner = task;
                task = Task::new(async move { inner.await.map(|v| v + 1) });
            }
            task.launch();
            producer.set_result(0);
            black_box(task.take_result())
        });
    });
}

// ---------------------------------------------------------------------------
// Future resolution
// ---------------------------------------------------------------------------

fn bench_resolve_suspended_future(c: &mut Criterion) {
    c.bench_function("resolve_suspended_future", |b| {
        b.iter(|| {
            let future = CoroFuture::<u32>::new();
            let producer = future.clone();
            let mut task = Task::new(async move { future.await });
            task.launch();
            producer.set_result(black_box(5));
            black_box(task.take_result())
        });
    });
}

fn bench_should_resume_predicate(c: &mut Criterion) {
    let future = CoroFuture::<()>::new();
    future.set_resume_predicate(|| false);
    c.bench_function("should_resume_predicate", |b| {
        b.iter(|| black_box(future.should_resume()));
    });
}

criterion_group!(
    benches,
    bench_launch_ready_task,
    bench_await_child_task,
    bench_await_chain_100,
    bench_resolve_suspended_future,
    bench_should_resume_predicate,
);
criterion_main!(benches);
