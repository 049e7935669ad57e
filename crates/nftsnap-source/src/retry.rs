//! Bounded retry with a fixed delay.
//!
//! The one retry primitive for every remote read: page fetches, point reads and
//! status probes all go through [`retry_fixed`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Sleep between a failed attempt and the next one.
    pub delay: Duration,
    /// Per-attempt timeout. `Duration::ZERO` disables it.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
            call_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// No delay between attempts and no per-call timeout.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            call_timeout: Duration::ZERO,
        }
    }
}

/// All attempts failed. Carries the last underlying error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub what: String,
    pub attempts: u32,
    pub last: SourceError,
}

impl fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempt(s): {}",
            self.what, self.attempts, self.last
        )
    }
}

impl std::error::Error for RetryExhausted {}

impl RetryExhausted {
    /// Stopped by a cancel request rather than by the attempt budget.
    pub fn is_cancelled(&self) -> bool {
        self.last == SourceError::Cancelled
    }
}

/// Run `op` up to `policy.max_attempts` times. `op` receives the 1-based
/// attempt number. Returns the first success or the last failure.
pub async fn retry_fixed<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    retry_fixed_or_cancel(policy, what, None, op).await
}

/// [`retry_fixed`] that also stops before the next attempt once `cancel`
/// is set. The failure then carries [`SourceError::Cancelled`]. An attempt
/// already in flight runs to completion (or to its timeout).
pub async fn retry_fixed_or_cancel<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    cancel: Option<&CancelToken>,
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(RetryExhausted {
                what: what.to_string(),
                attempts: attempt - 1,
                last: SourceError::Cancelled,
            });
        }
        let outcome = if policy.call_timeout.is_zero() {
            op(attempt).await
        } else {
            match tokio::time::timeout(policy.call_timeout, op(attempt)).await {
                Ok(r) => r,
                Err(_) => Err(SourceError::Timeout {
                    after: policy.call_timeout,
                }),
            }
        };

        match outcome {
            Ok(v) => {
                if attempt > 1 {
                    debug!(what, attempt, "succeeded after retry");
                }
                return Ok(v);
            }
            Err(e) if attempt < attempts => {
                warn!(what, attempt, max_attempts = attempts, error = %e, "attempt failed; retrying");
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryExhausted {
                    what: what.to_string(),
                    attempts: attempt,
                    last: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let out = retry_fixed(&RetryPolicy::immediate(3), "op", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(SourceError::Transport("reset".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(out, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_and_keeps_last_error() {
        let out: Result<(), _> = retry_fixed(&RetryPolicy::immediate(2), "page", |attempt| async move {
            Err(SourceError::HttpStatus {
                status: 500 + attempt as u16,
                body: String::new(),
            })
        })
        .await;
        let err = out.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(
            err.last,
            SourceError::HttpStatus {
                status: 502,
                body: String::new()
            }
        );
        assert!(err.to_string().starts_with("page failed after 2 attempt(s)"));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let _ = retry_fixed(&RetryPolicy::immediate(0), "op", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(SourceError::Decode("bad".to_string())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_stops_before_next_attempt() {
        let cancel = CancelToken::new();
        let calls = AtomicU32::new(0);
        let out: Result<(), _> =
            retry_fixed_or_cancel(&RetryPolicy::immediate(5), "chain id", Some(&cancel), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                async { Err(SourceError::Transport("refused".to_string())) }
            })
            .await;
        let err = out.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_cancelled_never_calls() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let out: Result<(), _> =
            retry_fixed_or_cancel(&RetryPolicy::immediate(3), "op", Some(&cancel), |_| async {
                Ok(())
            })
            .await;
        assert_eq!(out.unwrap_err().attempts, 0);
    }

    #[tokio::test]
    async fn timeout_counts_as_failed_attempt() {
        let policy = RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
            call_timeout: Duration::from_millis(10),
        };
        let out: Result<(), _> = retry_fixed(&policy, "slow", |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            out.unwrap_err().last,
            SourceError::Timeout {
                after: Duration::from_millis(10)
            }
        );
    }
}
