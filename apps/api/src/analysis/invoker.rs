//! Resilient invoker: per-attempt timeout and classified retry with jittered backoff.
//!
//! Every external call made by the analysis core (model calls and index queries) goes
//! through `invoke`. Retry state lives on the stack of a single invocation, so one
//! `RetryPolicy` can be shared by any number of concurrent callers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, warn};

use crate::llm_client::{CallError, CallErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `base * 2^retry + random(0, base)`,
    /// capped at `max_delay`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exponential = base_ms.saturating_mul(2u64.saturating_pow(retry));
        let jitter = rand::thread_rng().gen_range(0..=base_ms);
        Duration::from_millis(exponential.saturating_add(jitter)).min(self.max_delay)
    }
}

/// Final failure of an invocation, after retries were exhausted or skipped.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind:?} after {attempts} attempt(s): {last_cause}")]
pub struct InvocationError {
    pub kind: CallErrorKind,
    pub attempts: u32,
    pub last_cause: String,
}

/// Runs `operation` under `policy`. Transient failures (rate limit, overload, timeout)
/// are retried; `Invalid` and `Unknown` fail on the spot.
///
/// Each attempt first waits for a `gate` permit; the attempt timeout starts once the
/// permit is held, so queueing behind sibling calls never counts against it.
pub async fn invoke<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    gate: &CallGate,
    mut operation: F,
) -> Result<T, InvocationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = async {
            let _permit = gate.acquire().await?;
            match tokio::time::timeout(policy.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(CallError::new(
                    CallErrorKind::Timeout,
                    format!(
                        "attempt exceeded {}ms",
                        policy.attempt_timeout.as_millis()
                    ),
                )),
            }
        }
        .await;

        let error = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{label}: succeeded on attempt {attempt}");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.kind.is_transient() || attempt >= max_attempts {
            return Err(InvocationError {
                kind: error.kind,
                attempts: attempt,
                last_cause: error.message,
            });
        }

        let delay = policy.backoff_delay(attempt - 1);
        warn!(
            "{label}: attempt {attempt}/{max_attempts} failed ({:?}: {}), retrying after {}ms",
            error.kind,
            error.message,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
}

/// Bounds how many external calls one analysis may have in flight at once.
///
/// This is the backpressure knob against the provider's rate limits. Its size is
/// independent of how many skills or sub-calls a request fans out into.
#[derive(Debug, Clone)]
pub struct CallGate {
    permits: Arc<Semaphore>,
}

impl CallGate {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Waits for a free slot. The permit is held for one attempt only; backoff sleeps
    /// happen outside the gate, so a retrying call never blocks its siblings.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, CallError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| CallError::new(CallErrorKind::Unknown, "call gate closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn gate() -> CallGate {
        CallGate::new(4)
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = invoke("test", &policy(3), &gate(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CallError>("done") }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overloaded_twice_then_success_matches_immediate_success() {
        let calls = AtomicU32::new(0);
        let retried = invoke("test", &policy(4), &gate(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(CallError::new(CallErrorKind::Overloaded, "busy"))
                } else {
                    Ok(vec!["q1".to_string(), "q2".to_string()])
                }
            }
        })
        .await
        .unwrap();

        let immediate = invoke("test", &policy(4), &gate(), || async {
            Ok::<_, CallError>(vec!["q1".to_string(), "q2".to_string()])
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retried, immediate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = invoke("test", &policy(5), &gate(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CallError::new(CallErrorKind::Invalid, "bad api key")) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind, CallErrorKind::Invalid);
        assert_eq!(err.attempts, 1);
        assert_eq!(err.last_cause, "bad api key");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = invoke("test", &policy(5), &gate(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CallError::new(CallErrorKind::Unknown, "???")) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind, CallErrorKind::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_attempts_and_last_cause() {
        let calls = AtomicU32::new(0);
        let err = invoke("test", &policy(3), &gate(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                Err::<(), _>(CallError::new(
                    CallErrorKind::RateLimited,
                    format!("429 on call {n}"),
                ))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.kind, CallErrorKind::RateLimited);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_cause, "429 on call 3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_and_is_retried() {
        let calls = AtomicU32::new(0);
        let result = invoke("test", &policy(3), &gate(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, CallError>(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_timeout_is_classified_timeout() {
        let err = invoke("test", &policy(2), &gate(), || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, CallError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, CallErrorKind::Timeout);
        assert_eq!(err.attempts, 2);
    }

    #[test]
    fn test_backoff_delay_bounds() {
        let p = policy(5);
        for retry in 0..3 {
            let floor = Duration::from_millis(100 * 2u64.pow(retry));
            let ceiling = floor + Duration::from_millis(100);
            let delay = p.backoff_delay(retry);
            assert!(delay >= floor && delay <= ceiling, "retry {retry}: {delay:?}");
        }
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let p = policy(5);
        assert_eq!(p.backoff_delay(30), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_call_gate_bounds_in_flight_calls() {
        let gate = CallGate::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let (in_flight, peak) = (&in_flight, &peak);
                invoke("test", &policy(1), &gate, || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, CallError>(())
                })
                .await
            }
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(Result::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_for_gate_does_not_count_against_attempt_timeout() {
        let gate = CallGate::new(1);
        let single_attempt = RetryPolicy {
            attempt_timeout: Duration::from_secs(30),
            ..policy(1)
        };
        let calls = AtomicU32::new(0);

        let slow_call = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(20)).await;
                Ok::<_, CallError>("answered")
            }
        };
        let (a, b, c) = tokio::join!(
            invoke("first", &single_attempt, &gate, slow_call),
            invoke("second", &single_attempt, &gate, slow_call),
            invoke("third", &single_attempt, &gate, slow_call),
        );

        assert_eq!(a.unwrap(), "answered");
        assert_eq!(b.unwrap(), "answered");
        assert_eq!(c.unwrap(), "answered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
