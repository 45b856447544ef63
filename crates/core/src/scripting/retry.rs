//! Retry orchestration for transient failures.
//!
//! [`with_retry`] wraps any zero-argument operation producing a
//! [`ScriptResult`] and re-invokes it on retryable failures, that is, on
//! [`ErrorKind::Timeout`](crate::error::ErrorKind::Timeout) only. Every
//! other kind indicates a defect or environmental condition that will not
//! self-resolve, so it is returned immediately. Inter-attempt delay is a
//! deterministic function of the attempt number, with no jitter.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use macauto_events::{channel, TelemetryBus, TelemetryEvent};

use crate::error::ScriptResult;

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Inter-attempt delay strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `2^n * 100 ms`: attempt 1 → 200 ms, attempt 2 → 400 ms, attempt 3 →
    /// 800 ms, ...
    Exponential,
    /// A constant 1000 ms regardless of attempt number.
    Linear,
}

impl Backoff {
    /// Delay to sleep after the given (1-based) failed attempt.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Exponential => {
                Duration::from_millis(2u64.saturating_pow(attempt).saturating_mul(100))
            }
            Self::Linear => Duration::from_millis(1000),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Exponential => "exponential",
            Self::Linear => "linear",
        }
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry configuration: constructed per call, never shared or mutated.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Total invocation budget (≥ 1).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay strategy.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

impl Default for RetryPolicy {
    /// Three attempts with exponential backoff.
    fn default() -> Self {
        Self::new(3, Backoff::Exponential)
    }
}

// ---------------------------------------------------------------------------
// with_retry
// ---------------------------------------------------------------------------

/// Invoke `operation` up to `policy.max_attempts()` times, sleeping
/// `policy.backoff().delay(n)` between attempts.
///
/// Only timeout-classified failures are retried. When attempts are
/// exhausted, the LAST observed failure is returned, not the first.
/// Lifecycle telemetry is published on `retry.*` channels; the bus never
/// affects control flow.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    telemetry: &TelemetryBus,
    mut operation: F,
) -> ScriptResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ScriptResult<T>>,
{
    telemetry.publish(
        TelemetryEvent::new(channel::RETRY_START).with_payload(serde_json::json!({
            "max_attempts": policy.max_attempts(),
            "backoff": policy.backoff().as_str(),
        })),
    );

    let mut attempt: u32 = 1;
    loop {
        telemetry.publish(
            TelemetryEvent::new(channel::RETRY_ATTEMPT).with_payload(serde_json::json!({
                "attempt": attempt,
                "max_attempts": policy.max_attempts(),
            })),
        );

        match operation().await {
            Ok(value) => {
                telemetry.publish(TelemetryEvent::new(channel::RETRY_STOP).with_payload(
                    serde_json::json!({
                        "attempts": attempt,
                    }),
                ));
                return Ok(value);
            }
            Err(failure) if failure.kind.is_retryable() && attempt < policy.max_attempts() => {
                let delay = policy.backoff().delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(failure) => {
                telemetry.publish(TelemetryEvent::new(channel::RETRY_ERROR).with_payload(
                    serde_json::json!({
                        "attempts": attempt,
                        "kind": failure.kind,
                        "message": failure.message,
                    }),
                ));
                return Err(failure);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
