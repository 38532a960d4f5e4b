//! Bridge between coroutine test bodies and a frame-polled test harness.
//!
//! A harness that runs latent commands calls [`AsyncTestRunner::update`]
//! once per frame until it returns `true`. The first call launches the test
//! body; the ticks in between let the registry and streaming services
//! resolve whatever the body awaits.

use std::sync::Arc;

use corotasks_core::{AsyncError, Task, Ticker, report_unhandled};
use parking_lot::Mutex;

type TestBody = Box<dyn FnOnce() -> Task<()> + Send>;

/// Result of one coroutine-driven test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub name: String,
    pub passed: bool,
    pub errors: Vec<String>,
}

/// Runs one coroutine test under a frame-polled harness.
///
/// Errors of kind [`AsyncError::TestFailure`] raised by the body are caught,
/// logged and recorded as failures in the [`TestReport`]. Any other error is
/// recorded as well and then reported as unhandled.
///
/// # Example
///
/// ```
/// use corotasks_core::{AsyncError, Task, Ticker};
/// use corotasks_runtime::AsyncTestRunner;
///
/// let runner = AsyncTestRunner::new("EmptyTask", || {
///     Task::new(async { Err(AsyncError::test_failure("Can't find asset")) })
/// });
///
/// let report = runner.run_with(&Ticker::new(), 1.0 / 60.0, 10);
/// assert!(!report.passed);
/// assert_eq!(report.errors, vec!["Can't find asset".to_string()]);
/// ```
pub struct AsyncTestRunner {
    name: String,
    body: Option<TestBody>,
    task: Option<Task<()>>,
    report: Arc<Mutex<Option<TestReport>>>,
}

impl AsyncTestRunner {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce() -> Task<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Some(Box::new(body)),
            task: None,
            report: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Launches the test on the first call. Returns whether it finished.
    pub fn update(&mut self) -> bool {
        if let Some(body) = self.body.take() {
            self.launch(body);
        }
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_some_and(Task::is_completed)
    }

    /// The report, once the test finished.
    pub fn report(&self) -> Option<TestReport> {
        self.report.lock().clone()
    }

    /// Alternates [`update`](Self::update) and `ticker` ticks until the test
    /// finishes or `max_ticks` ticks have passed.
    ///
    /// A test still running after `max_ticks` is reported as failed.
    pub fn run_with(mut self, ticker: &Ticker, delta_time: f32, max_ticks: usize) -> TestReport {
        for _ in 0..max_ticks {
            if self.update() {
                break;
            }
            ticker.tick(delta_time);
        }

        if let Some(report) = self.report() {
            return report;
        }
        let message = format!("timed out after {max_ticks} ticks");
        log::error!("{}: {message}", self.name);
        TestReport {
            name: self.name.clone(),
            passed: false,
            errors: vec![message],
        }
    }

    fn launch(&mut self, body: TestBody) {
        log::info!("{}: started", self.name);
        let name = self.name.clone();
        let report = self.report.clone();

        let mut task = Task::new(async move {
            let mut errors = Vec::new();
            match body().await {
                Ok(()) => {}
                Err(AsyncError::TestFailure(message)) => {
                    log::error!("Test failed with reason: {message}");
                    errors.push(message);
                }
                Err(error) => {
                    errors.push(error.to_string());
                    *report.lock() = Some(TestReport {
                        name: name.clone(),
                        passed: false,
                        errors,
                    });
                    report_unhandled(&name, &error);
                    return Ok(());
                }
            }

            let passed = errors.is_empty();
            log::info!("{name}: {}", if passed { "passed" } else { "failed" });
            *report.lock() = Some(TestReport { name, passed, errors });
            Ok(())
        });
        task.launch();
        self.task = Some(task);
    }
}
