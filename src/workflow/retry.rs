use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::models::{ActivityFailure, StepOutcome};

/// Fixed-delay, bounded-attempt retry for workflow steps.
///
/// A step that exhausts its attempts is fatal for the job; the last failure
/// is what gets reported. No backoff: the delay between attempts is
/// constant, so replays of the same job behave the same way.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no waiting. Useful for tests and dry runs.
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<F, Fut>(&self, step_name: &str, mut attempt_fn: F) -> StepOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StepOutcome>,
    {
        let mut last_failure = ActivityFailure::new(step_name, "no attempt was made");

        for attempt in 1..=self.max_attempts {
            match attempt_fn().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Step {} succeeded on attempt {}", step_name, attempt);
                    }
                    return Ok(value);
                }
                Err(failure) => {
                    warn!(
                        "Step {} failed (attempt {}/{}): {}",
                        step_name, attempt, self.max_attempts, failure.reason
                    );
                    last_failure = failure;
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        Err(last_failure)
    }
}
