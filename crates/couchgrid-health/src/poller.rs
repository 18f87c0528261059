//! Bounded fixed-interval polling.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;

/// How many times to check and how long to wait between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on the time spent sleeping before giving up.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    /// 25 attempts, 700 ms apart.
    fn default() -> Self {
        Self::new(25, Duration::from_millis(700))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error(
        "timed out waiting for {target} after {attempts} attempts: {}",
        .last_error.as_deref().unwrap_or("condition not met")
    )]
    Timeout {
        target: String,
        attempts: u32,
        /// Message of the last failed check, if the last check errored.
        last_error: Option<String>,
    },
}

impl PollError {
    pub fn target(&self) -> &str {
        match self {
            PollError::Timeout { target, .. } => target,
        }
    }
}

/// Poll `check` until it reports `true`.
///
/// The first check runs immediately. A check that returns `Ok(false)` or
/// an error is followed by one `policy.interval` sleep on `clock`. After
/// `policy.max_attempts` checks (at least one) without success the call
/// fails with [`PollError::Timeout`]. Returns the number of checks made.
pub async fn await_condition<F, Fut, E>(
    target: &str,
    policy: &RetryPolicy,
    clock: &dyn Clock,
    mut check: F,
) -> Result<u32, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match check().await {
            Ok(true) => {
                debug!(%target, attempt, "condition satisfied");
                return Ok(attempt);
            }
            Ok(false) => {
                debug!(%target, attempt, max_attempts, "condition not yet satisfied");
                last_error = None;
            }
            Err(e) => {
                debug!(%target, attempt, max_attempts, error = %e, "check failed");
                last_error = Some(e.to_string());
            }
        }

        if attempt < max_attempts {
            clock.sleep(policy.interval).await;
        }
    }

    warn!(%target, attempts = max_attempts, ?last_error, "gave up waiting");
    Err(PollError::Timeout {
        target: target.to_string(),
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingClock;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(700))
    }

    #[tokio::test]
    async fn immediate_success_never_sleeps() {
        let clock = RecordingClock::new();
        let attempts = await_condition("node-0", &policy(25), &clock, || async {
            Ok::<_, String>(true)
        })
        .await
        .unwrap();

        assert_eq!(attempts, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn succeeds_on_third_check() {
        let clock = RecordingClock::new();
        let mut calls = 0;
        let attempts = await_condition("pods", &policy(25), &clock, || {
            calls += 1;
            let ready = calls >= 3;
            async move { Ok::<_, String>(ready) }
        })
        .await
        .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(700); 2]);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let clock = RecordingClock::new();
        let mut calls = 0;
        let attempts = await_condition("10.0.0.1:5984", &policy(5), &clock, || {
            calls += 1;
            let n = calls;
            async move {
                if n < 2 {
                    Err("connection refused".to_string())
                } else {
                    Ok(true)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn exhausting_attempts_times_out() {
        let clock = RecordingClock::new();
        let mut calls = 0;
        let err = await_condition("pods", &policy(25), &clock, || {
            calls += 1;
            async { Ok::<_, String>(false) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 25);
        assert_eq!(
            err,
            PollError::Timeout {
                target: "pods".to_string(),
                attempts: 25,
                last_error: None,
            }
        );
        // No sleep after the final check.
        assert_eq!(clock.sleeps().len(), 24);
        assert_eq!(clock.total(), policy(25).budget());
    }

    #[tokio::test]
    async fn timeout_keeps_last_error() {
        let clock = RecordingClock::new();
        let err = await_condition("10.0.0.9:5984", &policy(3), &clock, || async {
            Err::<bool, _>("connection refused")
        })
        .await
        .unwrap_err();

        match &err {
            PollError::Timeout {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(*attempts, 3);
                assert_eq!(last_error.as_deref(), Some("connection refused"));
            }
        }
        assert_eq!(err.target(), "10.0.0.9:5984");
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn zero_attempts_still_checks_once() {
        let clock = RecordingClock::new();
        let mut calls = 0;
        let result = await_condition("x", &policy(0), &clock, || {
            calls += 1;
            async { Ok::<_, String>(false) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn default_policy_matches_readiness_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 25);
        assert_eq!(policy.interval, Duration::from_millis(700));
    }
}
