use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationSignal;
use crate::errors::AutomationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted {
        attempts: u32,
        last_error: Option<String>,
    },
    /// Cancellation was observed at an attempt boundary
    Cancelled { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Convert into a `Result`, describing exhaustion with `label`.
    pub fn into_result(self, label: &str) -> Result<T, AutomationError> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Cancelled { .. } => Err(AutomationError::Cancelled),
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(AutomationError::ElementNotFound(match last_error {
                Some(e) => format!("{label} failed after {attempts} attempts: {e}"),
                None => format!("{label} failed after {attempts} attempts"),
            })),
        }
    }
}

/// Bounded retry with a cleanup hook and cooperative cancellation.
#[derive(Debug, Clone)]
pub struct RetryOrchestrator {
    policy: RetryPolicy,
    cancel: CancellationSignal,
}

impl RetryOrchestrator {
    pub fn new(policy: RetryPolicy, cancel: CancellationSignal) -> Self {
        Self { policy, cancel }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `operation` until it yields `Ok(Some(_))` or the attempt budget is
    /// spent.
    ///
    /// `Ok(None)` and `Err(_)` are both failed attempts; `cleanup` runs once
    /// after each of them. Cancellation is checked before every attempt and
    /// before every inter-attempt delay, and an `Err(Cancelled)` from the
    /// operation ends the loop at once. No delay follows the last attempt.
    pub async fn execute_with_retry<T, F, Fut, C, CFut>(
        &self,
        label: &str,
        mut operation: F,
        mut cleanup: C,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, AutomationError>>,
        C: FnMut() -> CFut,
        CFut: Future<Output = ()>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if self.cancel.is_set() {
                info!("{}: cancelled before attempt {}", label, attempt);
                return RetryOutcome::Cancelled {
                    attempts: attempt - 1,
                };
            }

            debug!("{}: attempt {}/{}", label, attempt, max_attempts);
            match operation(attempt).await {
                Ok(Some(value)) => {
                    if attempt > 1 {
                        info!("{}: succeeded on attempt {}", label, attempt);
                    }
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Ok(None) => {
                    warn!("{}: attempt {}/{} failed", label, attempt, max_attempts);
                }
                Err(AutomationError::Cancelled) => {
                    info!("{}: cancelled during attempt {}", label, attempt);
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
                Err(e) => {
                    warn!(
                        "{}: attempt {}/{} failed: {}",
                        label, attempt, max_attempts, e
                    );
                    last_error = Some(e.to_string());
                }
            }

            cleanup().await;

            if attempt < max_attempts {
                if self.cancel.is_set() {
                    info!("{}: cancelled after attempt {}", label, attempt);
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
                if !self.cancel.sleep(self.policy.delay).await {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
            }
        }

        warn!("{}: all {} attempts failed", label, max_attempts);
        RetryOutcome::Exhausted {
            attempts: max_attempts,
            last_error,
        }
    }

    /// [`execute_with_retry`](Self::execute_with_retry) without cleanup.
    pub async fn execute<T, F, Fut>(&self, label: &str, operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, AutomationError>>,
    {
        self.execute_with_retry(label, operation, || async {}).await
    }
}
