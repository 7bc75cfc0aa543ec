//! Independent post-commit tasks.

use std::future::Future;
use std::pin::Pin;

use futures::future::join_all;
use serde::Serialize;
use tesoro_shared::AppError;
use tracing::{debug, warn};

type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

/// A task that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTask {
    /// Task name.
    pub task: &'static str,
    /// Error message.
    pub error: String,
}

/// Outcome of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    /// Tasks that completed.
    pub succeeded: Vec<&'static str>,
    /// Tasks that failed.
    pub failed: Vec<FailedTask>,
}

impl FanOutReport {
    /// Returns true when every task succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns true if the named task failed.
    #[must_use]
    pub fn has_failed(&self, task: &str) -> bool {
        self.failed.iter().any(|f| f.task == task)
    }
}

/// A list of named tasks run concurrently, each in its own error boundary.
#[derive(Default)]
pub struct FanOut<'a> {
    tasks: Vec<(&'static str, TaskFuture<'a>)>,
}

impl<'a> FanOut<'a> {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Adds a task.
    #[must_use]
    pub fn task<F>(mut self, name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<(), AppError>> + Send + 'a,
    {
        self.tasks.push((name, Box::pin(future)));
        self
    }

    /// Runs every task to completion. Never fails.
    pub async fn run(self) -> FanOutReport {
        let (names, futures): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let results = join_all(futures).await;

        let mut report = FanOutReport::default();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    debug!(task = name, "fan-out task succeeded");
                    report.succeeded.push(name);
                }
                Err(e) => {
                    warn!(task = name, error = %e, "fan-out task failed");
                    report.failed.push(FailedTask {
                        task: name,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_does_not_stop_other_tasks() {
        let report = FanOut::new()
            .task("a", async { Ok(()) })
            .task("b", async { Err(AppError::ExternalService("down".into())) })
            .task("c", async { Ok(()) })
            .run()
            .await;
        assert_eq!(report.succeeded, vec!["a", "c"]);
        assert!(report.has_failed("b"));
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_empty_fan_out_is_complete() {
        assert!(FanOut::new().run().await.is_complete());
    }
}
