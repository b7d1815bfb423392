use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Consecutive failures required to trip the breaker open.
const FAILURE_THRESHOLD: u32 = 3;
/// How long the breaker stays open before allowing a half-open probe.
const OPEN_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

/// Circuit breaker aggregating outcomes across every request flowing through one
/// [`crate::handler::AuthHandler`] instance.
///
/// Trips after [`FAILURE_THRESHOLD`] consecutive failure outcomes and stays open for
/// [`OPEN_DURATION`]; a half-open probe that succeeds closes it, one that fails re-opens it
/// for another cooldown window.
pub(crate) struct CircuitBreaker {
    inner: Mutex<Inner>,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
}

/// Outcome of a permission check: either the call may proceed, or the breaker is open and
/// the caller should fail fast without any network I/O.
pub(crate) enum Admission {
    Proceed,
    Rejected,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
            }),
        }
    }

    /// Checks whether a call may proceed, transitioning `Open -> HalfOpen` if the cooldown
    /// has elapsed.
    pub async fn admit(&self) -> Admission {
        let mut inner = self.inner.lock().await;
        match inner.state {
            State::Closed | State::HalfOpen => Admission::Proceed,
            State::Open { opened_at } => {
                if opened_at.elapsed() >= OPEN_DURATION {
                    tracing::debug!("circuit breaker transitioning to half-open after cooldown");
                    inner.state = State::HalfOpen;
                    Admission::Proceed
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != State::Closed {
            tracing::debug!("circuit breaker closing after successful probe");
        }
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;

        match inner.state {
            State::Closed => {
                if inner.consecutive_failures >= FAILURE_THRESHOLD {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opening after consecutive failures"
                    );
                    inner.state = State::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            State::HalfOpen => {
                tracing::warn!("circuit breaker reopening after failed half-open probe");
                inner.state = State::Open {
                    opened_at: Instant::now(),
                };
            }
            State::Open { .. } => {}
        }
    }

    #[cfg(test)]
    pub async fn is_open(&self) -> bool {
        matches!(self.inner.lock().await.state, State::Open { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert!(!breaker.is_open().await);
        assert!(matches!(breaker.admit().await, Admission::Proceed));
    }

    #[tokio::test]
    async fn trips_open_after_three_consecutive_failures() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_failure().await;

        assert!(breaker.is_open().await);
        assert!(matches!(breaker.admit().await, Admission::Rejected));
    }

    #[tokio::test]
    async fn success_resets_consecutive_failure_count() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        breaker.record_failure().await;

        assert!(!breaker.is_open().await, "count should have reset after success");
    }
}
