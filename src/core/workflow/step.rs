//! Step execution with timeouts, retries and cancellation
//!
//! A step is an async function from a serialized input to a serialized
//! output. Each attempt gets its own deserialized copy of the input and a
//! start-to-close timeout. Failed attempts are retried with exponential
//! backoff unless the error kind is non-retryable.

use crate::config::StepPolicyConfig;
use crate::domain::{ErrorKind, HarborError, Result};
use crate::log_retry_attempt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Default timeout of the run record steps
pub const BOOKKEEPING_TIMEOUT: Duration = Duration::from_secs(300);

/// Default timeout of the export step
pub const INSERT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Timeout and retry policy of one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepPolicy {
    pub start_to_close_timeout: Duration,
    pub maximum_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
    /// Never retried, in addition to the kinds that are never retried anyway
    pub non_retryable: Vec<ErrorKind>,
}

impl StepPolicy {
    pub fn from_config(config: &StepPolicyConfig, default_timeout: Duration) -> Self {
        Self {
            start_to_close_timeout: config
                .start_to_close_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(default_timeout),
            maximum_attempts: config.maximum_attempts.max(1),
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            backoff_coefficient: config.backoff_coefficient,
            maximum_interval: Duration::from_millis(config.maximum_interval_ms),
            non_retryable: config.non_retryable.clone(),
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_coefficient
            .powi(attempt.saturating_sub(1) as i32);
        let delay_ms = (self.initial_interval.as_millis() as f64 * factor)
            .min(self.maximum_interval.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    pub fn is_retryable(&self, error: &HarborError) -> bool {
        error.is_retryable() && !self.non_retryable.contains(&error.kind())
    }
}

pub(crate) fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.map(|rx| *rx.borrow()).unwrap_or(false)
}

/// Resolves once the cancellation signal fires; never without one
async fn cancelled(cancel: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = cancel {
        let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if fired {
            return;
        }
    }
    std::future::pending::<()>().await
}

pub(crate) fn cancelled_error(step: &str) -> HarborError {
    HarborError::Cancelled(format!("step '{step}' was cancelled"))
}

/// Run one step under `policy`.
///
/// Passing `None` for `cancel` makes the step uncancellable; it is then
/// bounded only by its timeout and attempts.
///
/// # Errors
///
/// Returns the error of the last attempt, [`HarborError::Timeout`] when that
/// attempt ran out of time, or [`HarborError::Cancelled`] when the signal
/// fired. Non-retryable errors are returned after the first attempt.
pub async fn execute_step<I, O, F, Fut>(
    name: &str,
    policy: &StepPolicy,
    cancel: Option<&watch::Receiver<bool>>,
    input: &I,
    step: F,
) -> Result<O>
where
    I: Serialize + DeserializeOwned,
    O: Serialize + DeserializeOwned,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    let payload = serde_json::to_value(input)?;
    let timeout_ms = policy.start_to_close_timeout.as_millis() as u64;
    let mut attempt = 0;

    loop {
        attempt += 1;
        if is_cancelled(cancel) {
            return Err(cancelled_error(name));
        }

        let attempt_input: I = serde_json::from_value(payload.clone())?;
        tracing::debug!(step = name, attempt, "Starting step attempt");

        let outcome = tokio::select! {
            biased;
            _ = cancelled(cancel.cloned()) => Err(cancelled_error(name)),
            result = tokio::time::timeout(policy.start_to_close_timeout, step(attempt_input)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(HarborError::Timeout {
                        step: name.to_string(),
                        timeout_ms,
                    }),
                }
            }
        };

        let error = match outcome {
            Ok(output) => {
                let value = serde_json::to_value(&output)?;
                return Ok(serde_json::from_value(value)?);
            }
            Err(e) => e,
        };

        if !policy.is_retryable(&error) {
            tracing::error!(
                step = name,
                attempt,
                error = %error,
                error_kind = %error.kind(),
                "Step failed with a non-retryable error"
            );
            return Err(error);
        }

        if attempt >= policy.maximum_attempts {
            tracing::error!(
                step = name,
                attempts = attempt,
                error = %error,
                "Step failed after exhausting all attempts"
            );
            return Err(error);
        }

        let delay = policy.backoff(attempt);
        log_retry_attempt!(name, attempt + 1, policy.maximum_attempts, error);
        tracing::debug!(step = name, delay_ms = delay.as_millis() as u64, "Backing off");

        tokio::select! {
            biased;
            _ = cancelled(cancel.cloned()) => return Err(cancelled_error(name)),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
